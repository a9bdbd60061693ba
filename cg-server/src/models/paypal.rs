//! PayPal transactions and their allocations to sales sources

use serde::{Deserialize, Serialize};

use super::de;

/// Accounting bucket derived from the PayPal transaction type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum ChargeCategory {
    Purchase,
    Refund,
    Income,
    Offset,
    Auth,
    Withdrawal,
}

impl ChargeCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChargeCategory::Purchase => "purchase",
            ChargeCategory::Refund => "refund",
            ChargeCategory::Income => "income",
            ChargeCategory::Offset => "offset",
            ChargeCategory::Auth => "auth",
            ChargeCategory::Withdrawal => "withdrawal",
        }
    }
}

/// Where an allocated amount is attributed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
pub enum SalesSource {
    Auction,
    #[serde(rename = "eBay")]
    #[sqlx(rename = "eBay")]
    Ebay,
    #[serde(rename = "Private-Collection")]
    #[sqlx(rename = "Private-Collection")]
    PrivateCollection,
}

impl SalesSource {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "Auction" => Some(SalesSource::Auction),
            "eBay" => Some(SalesSource::Ebay),
            "Private-Collection" => Some(SalesSource::PrivateCollection),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SalesSource::Auction => "Auction",
            SalesSource::Ebay => "eBay",
            SalesSource::PrivateCollection => "Private-Collection",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssignmentStatus {
    Unassigned,
    Partial,
    Assigned,
    Locked,
}

impl AssignmentStatus {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "unassigned" => Some(AssignmentStatus::Unassigned),
            "partial" => Some(AssignmentStatus::Partial),
            "assigned" => Some(AssignmentStatus::Assigned),
            "locked" => Some(AssignmentStatus::Locked),
            _ => None,
        }
    }
}

/// A `paypal_transactions` row
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Transaction {
    pub pp_transaction_id: i64,
    pub transaction_date: String,
    pub transaction_time: Option<String>,
    pub name: Option<String>,
    #[serde(rename = "type")]
    #[sqlx(rename = "type")]
    pub txn_type: String,
    pub status: Option<String>,
    pub currency: String,
    pub amount: f64,
    pub fees: f64,
    pub net_amount: Option<f64>,
    pub from_email: Option<String>,
    pub to_email: Option<String>,
    pub paypal_txn_id: Option<String>,
    pub item_title: Option<String>,
    pub order_number: Option<String>,
    pub charge_category: ChargeCategory,
    pub created_at: String,
}

/// Transaction list row with allocation rollups
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct TransactionListItem {
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub transaction: Transaction,
    pub allocated_amount: f64,
    pub allocation_count: i64,
    pub locked_count: i64,
    #[sqlx(skip)]
    pub assignment_status: Option<AssignmentStatus>,
}

/// A `paypal_allocations` row
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Allocation {
    pub allocation_id: i64,
    pub pp_transaction_id: i64,
    pub sales_source: SalesSource,
    pub livestream_id: Option<String>,
    pub amount_allocated: f64,
    pub notes: Option<String>,
    pub assigned_by: Option<i64>,
    pub assigned_at: String,
    pub is_locked: bool,
    pub locked_by: Option<i64>,
    pub locked_at: Option<String>,
}

/// Allocation joined with its livestream title
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct AllocationDetail {
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub allocation: Allocation,
    pub livestream_title: Option<String>,
}

/// Body of `POST /api/paypal/transactions`
#[derive(Debug, Default, Deserialize)]
pub struct NewTransaction {
    #[serde(default)]
    pub transaction_date: Option<String>,
    #[serde(default)]
    pub transaction_time: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, rename = "type")]
    pub txn_type: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default, deserialize_with = "de::lenient_f64")]
    pub amount: Option<f64>,
    #[serde(default, deserialize_with = "de::lenient_f64")]
    pub fees: Option<f64>,
    #[serde(default, deserialize_with = "de::lenient_f64")]
    pub net_amount: Option<f64>,
    #[serde(default)]
    pub from_email: Option<String>,
    #[serde(default)]
    pub to_email: Option<String>,
    #[serde(default)]
    pub paypal_txn_id: Option<String>,
    #[serde(default)]
    pub item_title: Option<String>,
}

/// Body of `POST /api/paypal/allocations`
#[derive(Debug, Default, Deserialize)]
pub struct NewAllocation {
    #[serde(default, deserialize_with = "de::lenient_i64")]
    pub pp_transaction_id: Option<i64>,
    #[serde(default)]
    pub sales_source: Option<String>,
    #[serde(default, deserialize_with = "de::string_or_number")]
    pub livestream_id: Option<String>,
    #[serde(default, alias = "amount", deserialize_with = "de::lenient_f64")]
    pub amount_allocated: Option<f64>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Body of `PUT /api/paypal/allocations/{id}`
#[derive(Debug, Default, Deserialize)]
pub struct AllocationUpdate {
    #[serde(default)]
    pub sales_source: Option<String>,
    #[serde(default, deserialize_with = "de::nullable_string")]
    pub livestream_id: Option<Option<String>>,
    #[serde(default, alias = "amount", deserialize_with = "de::lenient_f64")]
    pub amount_allocated: Option<f64>,
    #[serde(default, deserialize_with = "de::nullable_string")]
    pub notes: Option<Option<String>>,
}

/// Query string of `GET /api/paypal/transactions`
#[derive(Debug, Default, Deserialize)]
pub struct TransactionQuery {
    #[serde(default, deserialize_with = "de::lenient_i64")]
    pub page: Option<i64>,
    #[serde(default, deserialize_with = "de::lenient_i64")]
    pub per_page: Option<i64>,
    #[serde(default)]
    pub sort: Option<String>,
    #[serde(default)]
    pub order: Option<String>,
    #[serde(default)]
    pub date_from: Option<String>,
    #[serde(default)]
    pub date_to: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, rename = "type")]
    pub txn_type: Option<String>,
    #[serde(default)]
    pub charge_category: Option<String>,
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default)]
    pub assignment_status: Option<String>,
}

/// Inclusive `transaction_date` range used by summary, lock and unlock
#[derive(Debug, Default, Deserialize)]
pub struct DateRange {
    #[serde(default)]
    pub date_from: Option<String>,
    #[serde(default)]
    pub date_to: Option<String>,
}

impl DateRange {
    /// Both bounds, when neither is blank
    pub fn both(&self) -> Option<(&str, &str)> {
        let from = self.date_from.as_deref().map(str::trim).filter(|s| !s.is_empty())?;
        let to = self.date_to.as_deref().map(str::trim).filter(|s| !s.is_empty())?;
        Some((from, to))
    }
}

#[derive(Debug, Clone, Default, Serialize, sqlx::FromRow)]
pub struct TransactionSummary {
    pub total_transactions: i64,
    pub purchase_count: i64,
    pub refund_count: i64,
    pub income_count: i64,
    pub total_debits: f64,
    pub total_credits: f64,
    pub net_amount: f64,
    pub assignable_count: i64,
    pub unassigned_count: i64,
    pub partial_count: i64,
    pub assigned_count: i64,
    pub locked_count: i64,
    pub unassigned_total: f64,
    pub assigned_total: f64,
    pub locked_total: f64,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct SourceSummary {
    pub sales_source: String,
    pub allocation_count: i64,
    pub total_allocated: f64,
    pub locked_count: i64,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct MonthSummary {
    pub month: String,
    pub transaction_count: i64,
    pub total_amount: f64,
    pub assigned_count: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sales_source_names() {
        for name in ["Auction", "eBay", "Private-Collection"] {
            assert_eq!(SalesSource::parse(name).map(|s| s.as_str()), Some(name));
        }
        assert_eq!(SalesSource::parse("ebay"), None);
        assert_eq!(
            serde_json::to_string(&SalesSource::PrivateCollection).unwrap(),
            "\"Private-Collection\""
        );
    }

    #[test]
    fn test_date_range_requires_both() {
        let range = DateRange {
            date_from: Some("2026-01-01".to_string()),
            date_to: Some("  ".to_string()),
        };
        assert!(range.both().is_none());

        let range = DateRange {
            date_from: Some("2026-01-01".to_string()),
            date_to: Some("2026-01-31".to_string()),
        };
        assert_eq!(range.both(), Some(("2026-01-01", "2026-01-31")));
    }

    #[test]
    fn test_allocation_amount_alias() {
        let body: NewAllocation =
            serde_json::from_str(r#"{"pp_transaction_id": "4", "amount": "-12.50", "sales_source": "Auction"}"#)
                .unwrap();
        assert_eq!(body.pp_transaction_id, Some(4));
        assert_eq!(body.amount_allocated, Some(-12.5));
    }
}
