//! PayPal classification and allocation rules
//!
//! A transaction's amount may be split across several allocations, each
//! attributed to a sales source. Allocations carry the transaction's sign,
//! may never exceed what is left to allocate, and are snapped to the exact
//! remainder when they come within a penny of it so no dust is left over.

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

use crate::models::paypal::{AssignmentStatus, ChargeCategory};

/// Rounding tolerance for allocation arithmetic
pub const PENNY: f64 = 0.01;

static ORDER_NUMBER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Order Number\s*:\s*([\d-]+)").expect("valid regex"));

/// Which endpoint is validating, as the messages differ slightly
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocationAction {
    Create,
    Update,
}

#[derive(Debug, Error, PartialEq)]
pub enum AllocationError {
    #[error("Transaction ID and amount are required")]
    MissingFields,

    #[error("Invalid sales source")]
    InvalidSource,

    #[error("Allocation sign must match transaction (negative for purchases, positive for income)")]
    SignMismatch,

    #[error("Allocation sign must match transaction")]
    SignMismatchOnUpdate,

    #[error("Over-allocation: only ${remaining} remaining, cannot allocate ${requested}")]
    OverAllocation { remaining: String, requested: String },

    #[error("Over-allocation: only ${remaining} available, cannot allocate ${requested}")]
    OverAllocationOnUpdate { remaining: String, requested: String },
}

/// Charge category for a PayPal transaction type
///
/// `Mobile Payment` goes either way depending on the sign; unknown types
/// count as offsets.
pub fn classify_type(txn_type: &str, amount: f64) -> ChargeCategory {
    match txn_type.trim() {
        "PreApproved Payment Bill User Payment" | "Express Checkout Payment" | "Website Payment"
        | "Postage Payment" => ChargeCategory::Purchase,
        "Payment Refund" => ChargeCategory::Refund,
        "Mass Pay Payment" => ChargeCategory::Income,
        "General Card Deposit" | "Bank Deposit to PP Account" => ChargeCategory::Offset,
        "General Authorization" => ChargeCategory::Auth,
        "General Card Withdrawal" | "User Initiated Withdrawal" => ChargeCategory::Withdrawal,
        "Mobile Payment" if amount < 0.0 => ChargeCategory::Purchase,
        "Mobile Payment" => ChargeCategory::Income,
        _ => ChargeCategory::Offset,
    }
}

/// Marketplace order number embedded in an item title
pub fn extract_order_number(item_title: &str) -> Option<String> {
    ORDER_NUMBER_RE
        .captures(item_title)
        .map(|caps| caps[1].to_string())
}

/// Assignment status from a transaction's allocation rollup
pub fn assignment_status(amount: f64, allocated: f64, allocation_count: i64, locked_count: i64) -> AssignmentStatus {
    if allocation_count == 0 {
        AssignmentStatus::Unassigned
    } else if locked_count == allocation_count {
        AssignmentStatus::Locked
    } else if allocated.abs() >= amount.abs() - PENNY {
        AssignmentStatus::Assigned
    } else {
        AssignmentStatus::Partial
    }
}

/// Two decimals with thousands separators, e.g. `1,234.50`
pub fn format_money(value: f64) -> String {
    let fixed = format!("{:.2}", value.abs());
    let (whole, cents) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, digit) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    let sign = if value < 0.0 && fixed != "0.00" { "-" } else { "" };
    format!("{}{}.{}", sign, grouped, cents)
}

/// Validate a requested allocation against what is left on the transaction
///
/// # Arguments
/// * `txn_amount` - Signed transaction amount
/// * `others_total` - Sum of the transaction's other allocations
/// * `requested` - Signed amount to allocate
///
/// # Returns
/// The amount to store: `requested`, or the exact remainder when within a
/// penny of it
pub fn check_amount(
    txn_amount: f64,
    others_total: f64,
    requested: f64,
    action: AllocationAction,
) -> Result<f64, AllocationError> {
    let remaining = txn_amount - others_total;

    if (txn_amount < 0.0 && requested > 0.0) || (txn_amount > 0.0 && requested < 0.0) {
        return Err(match action {
            AllocationAction::Create => AllocationError::SignMismatch,
            AllocationAction::Update => AllocationError::SignMismatchOnUpdate,
        });
    }

    if requested.abs() > remaining.abs() + PENNY {
        let remaining = format_money(remaining.abs());
        let requested = format_money(requested.abs());
        return Err(match action {
            AllocationAction::Create => AllocationError::OverAllocation { remaining, requested },
            AllocationAction::Update => AllocationError::OverAllocationOnUpdate { remaining, requested },
        });
    }

    if (requested.abs() - remaining.abs()).abs() <= PENNY {
        return Ok(remaining);
    }
    Ok(requested)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_type() {
        assert_eq!(classify_type("Express Checkout Payment", -10.0), ChargeCategory::Purchase);
        assert_eq!(classify_type("Postage Payment", -4.0), ChargeCategory::Purchase);
        assert_eq!(classify_type("Payment Refund", 10.0), ChargeCategory::Refund);
        assert_eq!(classify_type("Mass Pay Payment", 50.0), ChargeCategory::Income);
        assert_eq!(classify_type("Bank Deposit to PP Account", 100.0), ChargeCategory::Offset);
        assert_eq!(classify_type("General Authorization", -1.0), ChargeCategory::Auth);
        assert_eq!(classify_type("User Initiated Withdrawal", -20.0), ChargeCategory::Withdrawal);
        assert_eq!(classify_type("Something New", 1.0), ChargeCategory::Offset);
    }

    #[test]
    fn test_mobile_payment_depends_on_sign() {
        assert_eq!(classify_type("Mobile Payment", -5.0), ChargeCategory::Purchase);
        assert_eq!(classify_type("Mobile Payment", 5.0), ChargeCategory::Income);
    }

    #[test]
    fn test_extract_order_number() {
        assert_eq!(
            extract_order_number("Shipping label Order Number : 12-34567-89012").as_deref(),
            Some("12-34567-89012")
        );
        assert_eq!(extract_order_number("Order Number:998877").as_deref(), Some("998877"));
        assert_eq!(extract_order_number("Card lot #4"), None);
    }

    #[test]
    fn test_assignment_status() {
        assert_eq!(assignment_status(-50.0, 0.0, 0, 0), AssignmentStatus::Unassigned);
        assert_eq!(assignment_status(-50.0, -20.0, 1, 0), AssignmentStatus::Partial);
        assert_eq!(assignment_status(-50.0, -49.995, 2, 0), AssignmentStatus::Assigned);
        assert_eq!(assignment_status(-50.0, -20.0, 2, 2), AssignmentStatus::Locked);
        assert_eq!(assignment_status(-50.0, -50.0, 2, 1), AssignmentStatus::Assigned);
    }

    #[test]
    fn test_format_money() {
        assert_eq!(format_money(0.0), "0.00");
        assert_eq!(format_money(12.5), "12.50");
        assert_eq!(format_money(1234.567), "1,234.57");
        assert_eq!(format_money(1_000_000.0), "1,000,000.00");
    }

    #[test]
    fn test_sign_must_match() {
        assert_eq!(
            check_amount(-50.0, 0.0, 10.0, AllocationAction::Create),
            Err(AllocationError::SignMismatch)
        );
        assert_eq!(
            check_amount(50.0, 0.0, -10.0, AllocationAction::Update),
            Err(AllocationError::SignMismatchOnUpdate)
        );
    }

    #[test]
    fn test_over_allocation_message() {
        let err = check_amount(-50.0, -30.0, -25.0, AllocationAction::Create).unwrap_err();
        assert_eq!(err.to_string(), "Over-allocation: only $20.00 remaining, cannot allocate $25.00");

        let err = check_amount(-50.0, -30.0, -25.0, AllocationAction::Update).unwrap_err();
        assert_eq!(err.to_string(), "Over-allocation: only $20.00 available, cannot allocate $25.00");
    }

    #[test]
    fn test_snaps_to_remaining_within_a_penny() {
        let amount = check_amount(-50.0, -30.0, -20.005, AllocationAction::Create).unwrap();
        assert!((amount - -20.0).abs() < 1e-9);

        let amount = check_amount(-50.0, -30.0, -10.0, AllocationAction::Create).unwrap();
        assert!((amount - -10.0).abs() < 1e-9);
    }
}
