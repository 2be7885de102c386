//! Stock movements: the append-only ledger rows and the pure arithmetic that
//! produces them.

use core::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use salesflow_core::{DomainError, DomainResult, Entity, MovementId, OrderId, ProductId, UserId};

use crate::product::Product;

/// Direction of a stock movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MovementDirection {
    /// Stock enters (returns, cancellations, receipts).
    In,
    /// Stock leaves (order approval).
    Out,
    /// Manual correction to an explicit target value.
    Adjustment,
}

impl MovementDirection {
    pub fn as_str(self) -> &'static str {
        match self {
            MovementDirection::In => "in",
            MovementDirection::Out => "out",
            MovementDirection::Adjustment => "adjustment",
        }
    }
}

impl core::fmt::Display for MovementDirection {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MovementDirection {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "in" => Ok(MovementDirection::In),
            "out" => Ok(MovementDirection::Out),
            "adjustment" => Ok(MovementDirection::Adjustment),
            other => Err(DomainError::validation(format!(
                "unknown movement direction '{other}'"
            ))),
        }
    }
}

/// A planned change to one product's stock, not yet persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StockChange {
    pub direction: MovementDirection,
    /// Units moved. For adjustments this is the signed delta.
    pub quantity: i64,
    pub stock_before: i64,
    pub stock_after: i64,
}

/// Compute the effect of a movement on `product`.
///
/// `quantity` is a positive delta for `In`/`Out` and the target stock level for
/// `Adjustment`.
pub fn plan_change(
    product: &Product,
    direction: MovementDirection,
    quantity: i64,
) -> DomainResult<StockChange> {
    let before = product.stock;

    let (delta, after) = match direction {
        MovementDirection::In => {
            ensure_positive(quantity)?;
            let after = before
                .checked_add(quantity)
                .ok_or_else(|| DomainError::validation("stock overflow"))?;
            (quantity, after)
        }
        MovementDirection::Out => {
            ensure_positive(quantity)?;
            if quantity > before {
                return Err(DomainError::InsufficientStock {
                    product_id: product.id,
                    available: before,
                    requested: quantity,
                });
            }
            (quantity, before - quantity)
        }
        MovementDirection::Adjustment => {
            if quantity < 0 {
                return Err(DomainError::validation("adjustment target cannot be negative"));
            }
            if quantity == before {
                return Err(DomainError::validation(
                    "adjustment target equals current stock",
                ));
            }
            (quantity - before, quantity)
        }
    };

    Ok(StockChange {
        direction,
        quantity: delta,
        stock_before: before,
        stock_after: after,
    })
}

fn ensure_positive(quantity: i64) -> DomainResult<()> {
    if quantity <= 0 {
        return Err(DomainError::validation("movement quantity must be positive"));
    }
    Ok(())
}

/// Ledger row. Never updated or deleted once written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockMovement {
    pub id: MovementId,
    pub product_id: ProductId,
    pub direction: MovementDirection,
    pub quantity: i64,
    pub stock_before: i64,
    pub stock_after: i64,
    pub order_id: Option<OrderId>,
    pub user_id: UserId,
    pub reason: String,
    pub created_at: DateTime<Utc>,
}

impl StockMovement {
    pub fn record(
        product_id: ProductId,
        change: StockChange,
        order_id: Option<OrderId>,
        user_id: UserId,
        reason: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: MovementId::new(),
            product_id,
            direction: change.direction,
            quantity: change.quantity,
            stock_before: change.stock_before,
            stock_after: change.stock_after,
            order_id,
            user_id,
            reason: reason.into(),
            created_at,
        }
    }
}

impl Entity for StockMovement {
    type Id = MovementId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn product_with_stock(stock: i64) -> Product {
        Product::new(ProductId::new(), "Widget", stock, 0, Utc::now()).unwrap()
    }

    #[test]
    fn out_movement_decrements_and_snapshots() {
        let product = product_with_stock(100);
        let change = plan_change(&product, MovementDirection::Out, 15).unwrap();

        assert_eq!(change.quantity, 15);
        assert_eq!(change.stock_before, 100);
        assert_eq!(change.stock_after, 85);
    }

    #[test]
    fn out_movement_beyond_stock_is_insufficient() {
        let product = product_with_stock(3);
        let err = plan_change(&product, MovementDirection::Out, 5).unwrap_err();

        assert_eq!(
            err,
            DomainError::InsufficientStock {
                product_id: product.id,
                available: 3,
                requested: 5,
            }
        );
    }

    #[test]
    fn out_movement_may_empty_the_product() {
        let product = product_with_stock(5);
        let change = plan_change(&product, MovementDirection::Out, 5).unwrap();
        assert_eq!(change.stock_after, 0);
    }

    #[test]
    fn zero_or_negative_quantities_are_rejected() {
        let product = product_with_stock(5);
        for direction in [MovementDirection::In, MovementDirection::Out] {
            assert!(matches!(
                plan_change(&product, direction, 0),
                Err(DomainError::Validation(_))
            ));
            assert!(matches!(
                plan_change(&product, direction, -2),
                Err(DomainError::Validation(_))
            ));
        }
    }

    #[test]
    fn adjustment_sets_target_and_records_signed_delta() {
        let product = product_with_stock(40);

        let down = plan_change(&product, MovementDirection::Adjustment, 32).unwrap();
        assert_eq!(down.quantity, -8);
        assert_eq!(down.stock_after, 32);

        let up = plan_change(&product, MovementDirection::Adjustment, 50).unwrap();
        assert_eq!(up.quantity, 10);
        assert_eq!(up.stock_after, 50);
    }

    #[test]
    fn adjustment_to_same_level_is_rejected() {
        let product = product_with_stock(40);
        assert!(plan_change(&product, MovementDirection::Adjustment, 40).is_err());
        assert!(plan_change(&product, MovementDirection::Adjustment, -1).is_err());
    }

    #[test]
    fn direction_parses_from_its_wire_name() {
        for direction in [
            MovementDirection::In,
            MovementDirection::Out,
            MovementDirection::Adjustment,
        ] {
            assert_eq!(direction.as_str().parse::<MovementDirection>().unwrap(), direction);
        }
        assert!("sideways".parse::<MovementDirection>().is_err());
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig {
                cases: 500,
                ..ProptestConfig::default()
            })]

            /// Property: an out movement followed by an in movement of the same
            /// quantity restores the original stock.
            #[test]
            fn out_then_in_conserves_stock(stock in 0i64..10_000, qty in 1i64..10_000) {
                let mut product = product_with_stock(stock);
                match plan_change(&product, MovementDirection::Out, qty) {
                    Ok(out) => {
                        product.stock = out.stock_after;
                        let back = plan_change(&product, MovementDirection::In, qty).unwrap();
                        prop_assert_eq!(back.stock_before, out.stock_after);
                        prop_assert_eq!(back.stock_after, stock);
                    }
                    Err(err) => {
                        prop_assert!(qty > stock);
                        prop_assert_eq!(err.shortfall(), Some(qty - stock));
                    }
                }
            }

            /// Property: a planned change never produces negative stock.
            #[test]
            fn planned_stock_is_never_negative(
                stock in 0i64..10_000,
                qty in -100i64..20_000,
                dir in prop_oneof![
                    Just(MovementDirection::In),
                    Just(MovementDirection::Out),
                    Just(MovementDirection::Adjustment),
                ]
            ) {
                let product = product_with_stock(stock);
                if let Ok(change) = plan_change(&product, dir, qty) {
                    prop_assert!(change.stock_after >= 0);
                    prop_assert_eq!(change.stock_before, stock);
                }
            }
        }
    }
}
