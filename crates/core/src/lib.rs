//! `salesflow-core` — domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns):
//! identifiers, the acting-user identity, the business error taxonomy and
//! fixed-point money helpers.

pub mod actor;
pub mod entity;
pub mod error;
pub mod id;
pub mod money;
pub mod value_object;

pub use actor::ActingUser;
pub use entity::Entity;
pub use error::{DomainError, DomainResult};
pub use id::{ClientId, MovementId, OrderId, ProductId, QuoteId, UserId};
pub use money::Money;
pub use value_object::ValueObject;
