//! Inventory domain module.
//!
//! Products and the append-only stock-movement ledger, implemented purely as
//! deterministic domain logic (no IO, no storage). Persisting a planned change
//! atomically is the infrastructure layer's job.

pub mod movement;
pub mod product;

pub use movement::{MovementDirection, StockChange, StockMovement, plan_change};
pub use product::Product;
