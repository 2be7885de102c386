//! Transactional storage boundary for the sales engine.
//!
//! Services never talk to a database directly. They open a [`StoreTx`] through
//! [`SalesStore::begin`], read rows with the `lock_*` methods (which take a
//! row-level lock held until the transaction ends), write through the
//! mutation methods, and finish with [`StoreTx::commit`].
//!
//! ## Transaction semantics
//!
//! - Dropping a transaction without committing rolls it back. Every early
//!   return through `?` in a service therefore discards all writes made so far.
//! - `lock_*` reads block until any other transaction holding the same row
//!   finishes, or until the configured lock timeout elapses
//!   ([`StoreError::LockTimeout`]).
//! - The plain read methods on [`SalesStore`] see committed state only.

pub mod in_memory;
pub mod postgres;

use std::sync::Arc;

use thiserror::Error;

use salesflow_core::{OrderId, ProductId, QuoteId};
use salesflow_inventory::{Product, StockMovement};
use salesflow_sales::{DocumentType, Order, Quote};

pub use in_memory::InMemorySalesStore;
pub use postgres::PostgresSalesStore;

/// Storage-level failure.
///
/// The message is for logs only; services never return it to callers.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// A unique constraint rejected the write (e.g. a duplicate document number).
    #[error("unique violation: {0}")]
    UniqueViolation(String),

    /// A lock could not be acquired in time, or the database aborted the
    /// transaction to break a deadlock or serialization conflict.
    #[error("lock timeout: {0}")]
    LockTimeout(String),

    /// Anything else: connectivity, corrupt rows, unexpected SQL errors.
    #[error("store backend error: {0}")]
    Backend(String),
}

/// One open unit of work.
#[async_trait::async_trait]
pub trait StoreTx: Send {
    /// Atomically increment and return the counter for `(document_type, year)`.
    /// The first call for a pair returns 1.
    async fn next_document_sequence(
        &mut self,
        document_type: DocumentType,
        year: i32,
    ) -> Result<u32, StoreError>;

    async fn lock_product(&mut self, id: ProductId) -> Result<Option<Product>, StoreError>;

    /// Write a new stock level. Only the inventory ledger calls this.
    async fn update_product_stock(&mut self, product: &Product) -> Result<(), StoreError>;

    async fn append_movement(&mut self, movement: &StockMovement) -> Result<(), StoreError>;

    async fn lock_quote(&mut self, id: QuoteId) -> Result<Option<Quote>, StoreError>;

    async fn insert_quote(&mut self, quote: &Quote) -> Result<(), StoreError>;

    /// Replace the stored quote, items included.
    async fn update_quote(&mut self, quote: &Quote) -> Result<(), StoreError>;

    async fn delete_quote(&mut self, id: QuoteId) -> Result<(), StoreError>;

    async fn lock_order(&mut self, id: OrderId) -> Result<Option<Order>, StoreError>;

    async fn insert_order(&mut self, order: &Order) -> Result<(), StoreError>;

    /// Persist status, audit stamps and notes. Items never change after insert.
    async fn update_order(&mut self, order: &Order) -> Result<(), StoreError>;

    async fn delete_order(&mut self, id: OrderId) -> Result<(), StoreError>;

    async fn commit(self: Box<Self>) -> Result<(), StoreError>;
}

/// Handle to the backing store. Cheap to share behind an `Arc`.
#[async_trait::async_trait]
pub trait SalesStore: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn StoreTx>, StoreError>;

    async fn find_product(&self, id: ProductId) -> Result<Option<Product>, StoreError>;

    async fn find_quote(&self, id: QuoteId) -> Result<Option<Quote>, StoreError>;

    async fn find_order(&self, id: OrderId) -> Result<Option<Order>, StoreError>;

    /// Movements for a product, oldest first.
    async fn list_movements(&self, product_id: ProductId)
    -> Result<Vec<StockMovement>, StoreError>;
}

#[async_trait::async_trait]
impl<S> SalesStore for Arc<S>
where
    S: SalesStore + ?Sized,
{
    async fn begin(&self) -> Result<Box<dyn StoreTx>, StoreError> {
        (**self).begin().await
    }

    async fn find_product(&self, id: ProductId) -> Result<Option<Product>, StoreError> {
        (**self).find_product(id).await
    }

    async fn find_quote(&self, id: QuoteId) -> Result<Option<Quote>, StoreError> {
        (**self).find_quote(id).await
    }

    async fn find_order(&self, id: OrderId) -> Result<Option<Order>, StoreError> {
        (**self).find_order(id).await
    }

    async fn list_movements(
        &self,
        product_id: ProductId,
    ) -> Result<Vec<StockMovement>, StoreError> {
        (**self).list_movements(product_id).await
    }
}
