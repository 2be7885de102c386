//! Sales domain module: quotes, orders and the monetary calculator.
//!
//! This crate contains business rules for the quote-to-order lifecycle,
//! implemented purely as deterministic domain logic (no IO, no storage).
//! Numbering, persistence and stock side effects are orchestrated by
//! `salesflow-infra`.

pub mod document;
pub mod order;
pub mod pricing;
pub mod quote;

pub use document::{DocumentNumber, DocumentType};
pub use order::{NewOrder, Order, OrderStatus, StockEffect, TransitionPlan};
pub use pricing::{Adjustments, LineInput, LineItem, Totals};
pub use quote::{NewQuote, Quote, QuotePatch, QuoteStatus};
