//! Domain error model.

use thiserror::Error;

use crate::id::ProductId;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Keep this focused on deterministic business failures that are safe to show
/// to a user. Storage and transport failures belong to the infrastructure
/// layer, which wraps them opaquely.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Missing or malformed input.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The referenced entity does not exist.
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },

    /// Edit or delete attempted on a converted quote or a locked order.
    #[error("immutable: {0}")]
    Immutable(String),

    /// The quote already produced an order.
    #[error("quote {quote} was already converted")]
    AlreadyConverted { quote: String },

    /// The quote's status does not allow conversion.
    #[error("quote {quote} cannot be converted from status {status}")]
    NotConvertible { quote: String, status: String },

    /// Illegal order status edge.
    #[error("invalid transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    /// A stock decrement would take the product below zero.
    #[error(
        "insufficient stock for product {product_id}: available {available}, requested {requested}"
    )]
    InsufficientStock {
        product_id: ProductId,
        available: i64,
        requested: i64,
    },

    /// A uniqueness rule was violated (e.g. duplicate document number).
    #[error("conflict: {0}")]
    Conflict(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn immutable(msg: impl Into<String>) -> Self {
        Self::Immutable(msg.into())
    }

    pub fn invalid_transition(from: impl ToString, to: impl ToString) -> Self {
        Self::InvalidTransition {
            from: from.to_string(),
            to: to.to_string(),
        }
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    /// How many units are missing for an `InsufficientStock` error.
    pub fn shortfall(&self) -> Option<i64> {
        match self {
            DomainError::InsufficientStock {
                available,
                requested,
                ..
            } => Some(requested - available),
            _ => None,
        }
    }
}
