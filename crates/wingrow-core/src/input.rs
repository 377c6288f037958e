//! Boundary coercion for caller-supplied fields.
//!
//! Numeric fields arrive as JSON numbers or numeric strings.

use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::{Decimal, prelude::ToPrimitive};
use serde_json::Value;

use crate::{
    error::{DomainError, DomainResult},
    totals::MONEY_LIMIT,
};

pub fn decimal_from_value(value: &Value) -> Option<Decimal> {
    match value {
        Value::Number(number) => parse_decimal(&number.to_string()),
        Value::String(text) => parse_decimal(text.trim()),
        _ => None,
    }
}

fn parse_decimal(text: &str) -> Option<Decimal> {
    if text.is_empty() {
        return None;
    }
    Decimal::from_str(text)
        .or_else(|_| Decimal::from_scientific(text))
        .ok()
}

pub fn positive_amount(value: &Value, field: &str) -> DomainResult<Decimal> {
    match decimal_from_value(value) {
        Some(amount) if amount > Decimal::ZERO => within_money_limit(amount, field),
        _ => Err(DomainError::validation(format!(
            "{field} must be a positive number"
        ))),
    }
}

pub fn non_negative_amount(value: &Value, field: &str) -> DomainResult<Decimal> {
    match decimal_from_value(value) {
        Some(amount) if amount >= Decimal::ZERO => within_money_limit(amount, field),
        _ => Err(DomainError::validation(format!(
            "{field} must be a non-negative number"
        ))),
    }
}

fn within_money_limit(amount: Decimal, field: &str) -> DomainResult<Decimal> {
    if amount > MONEY_LIMIT {
        return Err(DomainError::validation(format!(
            "{field} must not exceed {MONEY_LIMIT}"
        )));
    }
    Ok(amount)
}

pub fn positive_integer(value: &Value, field: &str) -> DomainResult<i64> {
    decimal_from_value(value)
        .filter(|number| number.fract().is_zero() && *number > Decimal::ZERO)
        .and_then(|number| number.to_i64())
        .ok_or_else(|| DomainError::validation(format!("{field} must be a positive integer")))
}

/// Non-integer numbers are truncated toward zero rather than rejected.
pub fn truncated_stock(value: &Value) -> DomainResult<i64> {
    decimal_from_value(value)
        .map(|number| number.trunc())
        .filter(|number| *number >= Decimal::ZERO)
        .and_then(|number| number.to_i64())
        .ok_or_else(|| DomainError::validation("stock must be a non-negative integer"))
}

/// Unparseable or negative prices become zero; prices past the money limit
/// are refused.
pub fn coerced_price(value: &Value) -> DomainResult<Decimal> {
    let price = decimal_from_value(value)
        .unwrap_or(Decimal::ZERO)
        .max(Decimal::ZERO);
    within_money_limit(price, "unitPrice")
}

pub fn parse_item_date(raw: &str) -> DomainResult<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(DomainError::validation("date is required"));
    }
    if let Ok(timestamp) = DateTime::parse_from_rfc3339(raw) {
        return Ok(timestamp.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|midnight| midnight.and_utc())
        .ok_or_else(|| DomainError::validation(format!("invalid date '{raw}'")))
}
