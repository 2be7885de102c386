use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, OwnedMutexGuard};

use salesflow_core::{OrderId, ProductId, QuoteId};
use salesflow_inventory::{Product, StockMovement};
use salesflow_sales::{DocumentNumber, DocumentType, Order, Quote};

use super::{SalesStore, StoreError, StoreTx};

const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Default, Clone)]
struct State {
    products: HashMap<ProductId, Product>,
    quotes: HashMap<QuoteId, Quote>,
    orders: HashMap<OrderId, Order>,
    movements: Vec<StockMovement>,
    counters: HashMap<(DocumentType, i32), u32>,
}

impl State {
    fn number_taken(&self, number: DocumentNumber) -> bool {
        match number.document_type {
            DocumentType::Quote => self.quotes.values().any(|q| q.number == number),
            DocumentType::Order => self.orders.values().any(|o| o.number == number),
        }
    }
}

/// In-memory sales store.
///
/// Intended for tests/dev. Transactions are fully serialized: `begin` takes a
/// single store-wide lock (bounded by the lock timeout) and works on a copy of
/// the state that replaces the shared state only on commit.
#[derive(Debug, Clone)]
pub struct InMemorySalesStore {
    state: Arc<Mutex<State>>,
    lock_timeout: Duration,
}

impl Default for InMemorySalesStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemorySalesStore {
    pub fn new() -> Self {
        Self::with_lock_timeout(DEFAULT_LOCK_TIMEOUT)
    }

    pub fn with_lock_timeout(lock_timeout: Duration) -> Self {
        Self {
            state: Arc::new(Mutex::new(State::default())),
            lock_timeout,
        }
    }

    /// Seed or replace a product row.
    pub async fn insert_product(&self, product: Product) {
        let mut state = self.state.lock().await;
        state.products.insert(product.id, product);
    }

    /// Total number of ledger rows across all products.
    pub async fn movement_count(&self) -> usize {
        self.state.lock().await.movements.len()
    }

    pub async fn order_count(&self) -> usize {
        self.state.lock().await.orders.len()
    }
}

#[async_trait::async_trait]
impl SalesStore for InMemorySalesStore {
    async fn begin(&self) -> Result<Box<dyn StoreTx>, StoreError> {
        let guard = tokio::time::timeout(self.lock_timeout, self.state.clone().lock_owned())
            .await
            .map_err(|_| {
                StoreError::LockTimeout(format!(
                    "store lock not acquired within {:?}",
                    self.lock_timeout
                ))
            })?;
        let working = guard.clone();
        Ok(Box::new(InMemoryTx { guard, working }))
    }

    async fn find_product(&self, id: ProductId) -> Result<Option<Product>, StoreError> {
        Ok(self.state.lock().await.products.get(&id).cloned())
    }

    async fn find_quote(&self, id: QuoteId) -> Result<Option<Quote>, StoreError> {
        Ok(self.state.lock().await.quotes.get(&id).cloned())
    }

    async fn find_order(&self, id: OrderId) -> Result<Option<Order>, StoreError> {
        Ok(self.state.lock().await.orders.get(&id).cloned())
    }

    async fn list_movements(
        &self,
        product_id: ProductId,
    ) -> Result<Vec<StockMovement>, StoreError> {
        let state = self.state.lock().await;
        Ok(state
            .movements
            .iter()
            .filter(|m| m.product_id == product_id)
            .cloned()
            .collect())
    }
}

struct InMemoryTx {
    guard: OwnedMutexGuard<State>,
    working: State,
}

#[async_trait::async_trait]
impl StoreTx for InMemoryTx {
    async fn next_document_sequence(
        &mut self,
        document_type: DocumentType,
        year: i32,
    ) -> Result<u32, StoreError> {
        let counter = self.working.counters.entry((document_type, year)).or_insert(0);
        *counter = counter
            .checked_add(1)
            .ok_or_else(|| StoreError::Backend("document counter exhausted".to_string()))?;
        Ok(*counter)
    }

    async fn lock_product(&mut self, id: ProductId) -> Result<Option<Product>, StoreError> {
        Ok(self.working.products.get(&id).cloned())
    }

    async fn update_product_stock(&mut self, product: &Product) -> Result<(), StoreError> {
        let row = self
            .working
            .products
            .get_mut(&product.id)
            .ok_or_else(|| StoreError::Backend(format!("product {} vanished", product.id)))?;
        row.stock = product.stock;
        row.updated_at = product.updated_at;
        Ok(())
    }

    async fn append_movement(&mut self, movement: &StockMovement) -> Result<(), StoreError> {
        if self.working.movements.iter().any(|m| m.id == movement.id) {
            return Err(StoreError::UniqueViolation("movement id already recorded".into()));
        }
        self.working.movements.push(movement.clone());
        Ok(())
    }

    async fn lock_quote(&mut self, id: QuoteId) -> Result<Option<Quote>, StoreError> {
        Ok(self.working.quotes.get(&id).cloned())
    }

    async fn insert_quote(&mut self, quote: &Quote) -> Result<(), StoreError> {
        if self.working.quotes.contains_key(&quote.id) || self.working.number_taken(quote.number) {
            return Err(StoreError::UniqueViolation(format!(
                "quote number {} already issued",
                quote.number
            )));
        }
        self.working.quotes.insert(quote.id, quote.clone());
        Ok(())
    }

    async fn update_quote(&mut self, quote: &Quote) -> Result<(), StoreError> {
        match self.working.quotes.get_mut(&quote.id) {
            Some(row) => {
                *row = quote.clone();
                Ok(())
            }
            None => Err(StoreError::Backend(format!("quote {} vanished", quote.id))),
        }
    }

    async fn delete_quote(&mut self, id: QuoteId) -> Result<(), StoreError> {
        self.working.quotes.remove(&id);
        Ok(())
    }

    async fn lock_order(&mut self, id: OrderId) -> Result<Option<Order>, StoreError> {
        Ok(self.working.orders.get(&id).cloned())
    }

    async fn insert_order(&mut self, order: &Order) -> Result<(), StoreError> {
        if self.working.orders.contains_key(&order.id) || self.working.number_taken(order.number) {
            return Err(StoreError::UniqueViolation(format!(
                "order number {} already issued",
                order.number
            )));
        }
        if let Some(quote_id) = order.quote_id {
            if self.working.orders.values().any(|o| o.quote_id == Some(quote_id)) {
                return Err(StoreError::UniqueViolation(format!(
                    "quote {quote_id} already has an order"
                )));
            }
        }
        self.working.orders.insert(order.id, order.clone());
        Ok(())
    }

    async fn update_order(&mut self, order: &Order) -> Result<(), StoreError> {
        match self.working.orders.get_mut(&order.id) {
            Some(row) => {
                *row = order.clone();
                Ok(())
            }
            None => Err(StoreError::Backend(format!("order {} vanished", order.id))),
        }
    }

    async fn delete_order(&mut self, id: OrderId) -> Result<(), StoreError> {
        self.working.orders.remove(&id);
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let InMemoryTx { mut guard, working } = *self;
        *guard = working;
        Ok(())
    }
}
