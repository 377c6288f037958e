//! Derived money values. Always recomputed from stored state, never taken
//! from caller input.

use rust_decimal::Decimal;

use crate::models::{ClaimItem, SettlementStatus};

/// Largest money value the system stores; every column is `NUMERIC(18, 4)`.
pub const MONEY_LIMIT: Decimal = Decimal::from_parts(1_316_134_912, 2_328, 0, false, 0);

/// Adds two money values, `None` past [`MONEY_LIMIT`].
pub fn checked_money_add(left: Decimal, right: Decimal) -> Option<Decimal> {
    left.checked_add(right).filter(|sum| *sum <= MONEY_LIMIT)
}

/// `None` when the sum leaves the storable range.
pub fn claim_total(items: &[ClaimItem]) -> Option<Decimal> {
    items
        .iter()
        .try_fold(Decimal::ZERO, |total, item| checked_money_add(total, item.amount))
}

/// `None` when the product leaves the storable range.
pub fn issue_total_cost(issued_qty: i64, unit_price: Decimal) -> Option<Decimal> {
    Decimal::from(issued_qty)
        .checked_mul(unit_price)
        .filter(|total| *total <= MONEY_LIMIT)
}

pub fn amount_pending(total_cost: Decimal, amount_paid: Decimal) -> Decimal {
    (total_cost - amount_paid).max(Decimal::ZERO)
}

pub fn settlement_status(total_cost: Decimal, amount_paid: Decimal) -> SettlementStatus {
    if amount_paid <= Decimal::ZERO {
        SettlementStatus::Due
    } else if total_cost > Decimal::ZERO && amount_paid >= total_cost {
        SettlementStatus::Paid
    } else {
        SettlementStatus::Partial
    }
}
