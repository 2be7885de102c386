//! Monetary calculator: line subtotals and document totals.
//!
//! Pure functions over fixed-point decimals. No rounding happens on sums; the
//! only rounding is the percent-to-value discount derivation.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use salesflow_core::money::{
    PERCENT_SCALE, ensure_money_range, ensure_money_scale, ensure_non_negative, ensure_scale,
    round_money,
};
use salesflow_core::{DomainError, DomainResult, Money, ProductId, ValueObject};

/// Line as submitted by the caller (before pricing).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineInput {
    pub product_id: ProductId,
    pub quantity: i64,
    pub unit_price: Money,
    /// Absolute discount on the whole line.
    #[serde(default)]
    pub discount: Money,
}

impl LineInput {
    pub fn new(product_id: ProductId, quantity: i64, unit_price: Money) -> Self {
        Self {
            product_id,
            quantity,
            unit_price,
            discount: Decimal::ZERO,
        }
    }

    pub fn with_discount(mut self, discount: Money) -> Self {
        self.discount = discount;
        self
    }
}

/// Priced line. Shared by quotes and orders; an order item is a verbatim copy
/// of the quote item it came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    /// 1-based display order, also the replay order for stock movements.
    pub position: u32,
    pub product_id: ProductId,
    pub quantity: i64,
    pub unit_price: Money,
    pub discount: Money,
    pub subtotal: Money,
}

impl ValueObject for LineItem {}

/// Document-level adjustments.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Adjustments {
    #[serde(default)]
    pub discount_value: Money,
    /// Percent in `[0, 100]`; only used when `discount_value` is zero.
    #[serde(default)]
    pub discount_percent: Decimal,
    #[serde(default)]
    pub surcharge: Money,
    #[serde(default)]
    pub freight: Money,
}

impl ValueObject for Adjustments {}

/// Computed document totals.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Totals {
    pub subtotal: Money,
    /// Discount actually applied (explicit value or derived from percent).
    pub discount_value: Money,
    pub total: Money,
}

impl ValueObject for Totals {}

/// `quantity × unit_price − discount` for a single line.
pub fn line_subtotal(quantity: i64, unit_price: Money, discount: Money) -> DomainResult<Money> {
    let gross = Decimal::from(quantity)
        .checked_mul(unit_price)
        .ok_or_else(|| DomainError::validation("line amount overflow"))?;
    if discount > gross {
        return Err(DomainError::validation(
            "line discount cannot exceed the line amount",
        ));
    }
    let subtotal = gross - discount;
    ensure_money_range("line subtotal", subtotal)?;
    Ok(subtotal)
}

/// Validate and price caller lines, assigning positions `1..=n` in input order.
pub fn price_lines(inputs: &[LineInput]) -> DomainResult<Vec<LineItem>> {
    if inputs.is_empty() {
        return Err(DomainError::validation("at least one item is required"));
    }

    inputs
        .iter()
        .enumerate()
        .map(|(idx, input)| {
            if input.quantity <= 0 {
                return Err(DomainError::validation(format!(
                    "item {}: quantity must be positive",
                    idx + 1
                )));
            }
            ensure_non_negative("unit_price", input.unit_price)?;
            ensure_non_negative("discount", input.discount)?;
            ensure_money_scale("unit_price", input.unit_price)?;
            ensure_money_scale("discount", input.discount)?;
            ensure_money_range("unit_price", input.unit_price)?;
            ensure_money_range("discount", input.discount)?;

            let subtotal = line_subtotal(input.quantity, input.unit_price, input.discount)?;
            Ok(LineItem {
                position: idx as u32 + 1,
                product_id: input.product_id,
                quantity: input.quantity,
                unit_price: input.unit_price,
                discount: input.discount,
                subtotal,
            })
        })
        .collect()
}

/// `subtotal = Σ line subtotals`; `total = subtotal − discount + freight + surcharge`.
pub fn compute_totals(items: &[LineItem], adjustments: &Adjustments) -> DomainResult<Totals> {
    ensure_non_negative("discount_value", adjustments.discount_value)?;
    ensure_non_negative("discount_percent", adjustments.discount_percent)?;
    ensure_non_negative("surcharge", adjustments.surcharge)?;
    ensure_non_negative("freight", adjustments.freight)?;
    ensure_money_scale("discount_value", adjustments.discount_value)?;
    ensure_money_scale("surcharge", adjustments.surcharge)?;
    ensure_money_scale("freight", adjustments.freight)?;
    ensure_scale("discount_percent", adjustments.discount_percent, PERCENT_SCALE)?;
    ensure_money_range("discount_value", adjustments.discount_value)?;
    ensure_money_range("surcharge", adjustments.surcharge)?;
    ensure_money_range("freight", adjustments.freight)?;
    if adjustments.discount_percent > Decimal::ONE_HUNDRED {
        return Err(DomainError::validation("discount_percent cannot exceed 100"));
    }

    let subtotal = items
        .iter()
        .try_fold(Decimal::ZERO, |acc, item| acc.checked_add(item.subtotal))
        .ok_or_else(|| DomainError::validation("subtotal overflow"))?;
    ensure_money_range("subtotal", subtotal)?;

    let discount_value = if !adjustments.discount_value.is_zero() {
        adjustments.discount_value
    } else if !adjustments.discount_percent.is_zero() {
        round_money(subtotal * adjustments.discount_percent / Decimal::ONE_HUNDRED)
    } else {
        Decimal::ZERO
    };

    let total = subtotal - discount_value + adjustments.freight + adjustments.surcharge;
    if total.is_sign_negative() && !total.is_zero() {
        return Err(DomainError::validation("total cannot be negative"));
    }
    ensure_money_range("total", total)?;

    Ok(Totals {
        subtotal,
        discount_value,
        total,
    })
}

/// Price lines and compute totals in one go.
pub fn price(inputs: &[LineInput], adjustments: &Adjustments) -> DomainResult<(Vec<LineItem>, Totals)> {
    let items = price_lines(inputs)?;
    let totals = compute_totals(&items, adjustments)?;
    Ok((items, totals))
}
