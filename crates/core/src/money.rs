//! Fixed-point money helpers.
//!
//! Every monetary amount is a [`rust_decimal::Decimal`] carried at two decimal
//! places. Binary floating point never touches a price.

use rust_decimal::{Decimal, RoundingStrategy};

use crate::error::{DomainError, DomainResult};

/// Monetary amount (two decimal places).
pub type Money = Decimal;

/// Number of decimal places kept on stored amounts.
pub const MONEY_SCALE: u32 = 2;

/// Decimal places kept on percentages.
pub const PERCENT_SCALE: u32 = 4;

/// Integer digits a stored amount may carry (`NUMERIC(14,2)`).
pub const MONEY_INTEGER_DIGITS: u32 = 12;

/// Exclusive upper bound on the magnitude of a stored amount.
pub fn money_limit() -> Decimal {
    Decimal::from(10_i64.pow(MONEY_INTEGER_DIGITS))
}

/// Round to the money scale, half away from zero.
pub fn round_money(value: Decimal) -> Money {
    value.round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

/// Reject negative amounts, naming the offending field.
pub fn ensure_non_negative(field: &str, value: Decimal) -> DomainResult<()> {
    if value.is_sign_negative() && !value.is_zero() {
        return Err(DomainError::validation(format!("{field} cannot be negative")));
    }
    Ok(())
}

/// Reject values carrying more than `scale` decimal places.
pub fn ensure_scale(field: &str, value: Decimal, scale: u32) -> DomainResult<()> {
    if value.normalize().scale() > scale {
        return Err(DomainError::validation(format!(
            "{field} must have at most {scale} decimal places"
        )));
    }
    Ok(())
}

/// Reject amounts carrying more precision than the money scale.
pub fn ensure_money_scale(field: &str, value: Decimal) -> DomainResult<()> {
    ensure_scale(field, value, MONEY_SCALE)
}

/// Reject amounts too large to store.
pub fn ensure_money_range(field: &str, value: Decimal) -> DomainResult<()> {
    if value.abs() >= money_limit() {
        return Err(DomainError::validation(format!(
            "{field} exceeds the largest storable amount"
        )));
    }
    Ok(())
}
