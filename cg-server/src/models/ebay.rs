//! eBay orders parsed from confirmation emails

use serde::{Deserialize, Serialize};

use super::de;

pub const ORDER_STATUSES: &[&str] = &[
    "Pending",
    "Confirmed",
    "Shipped",
    "Delivered",
    "Returned",
    "Cancelled",
];

pub const TRANSACTION_TYPES: &[&str] = &["PURCHASE", "SALE"];

/// Source assumed for orders imported before the column existed
pub const DEFAULT_SOURCE: &str = "ebay_confirmed";

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct EbayOrder {
    pub ebay_order_id: i64,
    pub order_number: String,
    pub order_date: Option<String>,
    pub seller_buyer_name: Option<String>,
    pub transaction_type: String,
    pub status: String,
    pub source: Option<String>,
    pub subtotal: f64,
    pub shipping_cost: f64,
    pub sales_tax: f64,
    pub total_amount: f64,
    pub reported_item_count: Option<i64>,
    pub delivery_date: Option<String>,
    pub email_subject: Option<String>,
    pub notes: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct EbayOrderListItem {
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub order: EbayOrder,
    pub item_count: i64,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct EbayOrderItem {
    pub ebay_item_id: i64,
    pub ebay_order_id: i64,
    pub item_title: Option<String>,
    pub item_price: f64,
    pub quantity: i64,
    pub ebay_item_number: Option<String>,
}

/// Body of `PUT /api/ebay/orders/{id}`
#[derive(Debug, Default, Deserialize)]
pub struct OrderUpdate {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub transaction_type: Option<String>,
    #[serde(default, deserialize_with = "de::nullable_string")]
    pub notes: Option<Option<String>>,
}

/// Query string of `GET /api/ebay/orders`
#[derive(Debug, Default, Deserialize)]
pub struct OrderQuery {
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
    pub transaction_type: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub search: Option<String>,
}

/// Totals across every order
#[derive(Debug, Clone, Default, Serialize, sqlx::FromRow)]
pub struct OrderTotals {
    pub total_orders: i64,
    pub total_spent: f64,
    pub total_subtotal: f64,
    pub total_shipping: f64,
    pub total_tax: f64,
    pub avg_order_total: f64,
    /// Reported item counts where known, stored items otherwise
    pub total_items: i64,
    pub total_items_in_db: i64,
    pub unique_sellers: i64,
    pub delivered_count: i64,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct SourceTotal {
    pub source: String,
    pub count: i64,
    pub total: f64,
}
