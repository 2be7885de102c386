use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use salesflow_core::{DomainError, DomainResult, Entity, ProductId};

/// A stock-tracked product.
///
/// `stock` is only ever written through the inventory ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub stock: i64,
    pub min_stock: i64,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    pub fn new(
        id: ProductId,
        name: impl Into<String>,
        stock: i64,
        min_stock: i64,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(DomainError::validation("product name cannot be empty"));
        }
        if stock < 0 {
            return Err(DomainError::validation("stock cannot be negative"));
        }
        if min_stock < 0 {
            return Err(DomainError::validation("minimum stock cannot be negative"));
        }
        Ok(Self {
            id,
            name,
            stock,
            min_stock,
            updated_at: now,
        })
    }

    pub fn is_below_minimum(&self) -> bool {
        self.stock < self.min_stock
    }
}

impl Entity for Product {
    type Id = ProductId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}
