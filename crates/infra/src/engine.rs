//! `SalesEngine`: the single entry point wiring every component to one store.

use std::sync::Arc;

use salesflow_core::{ActingUser, OrderId, ProductId, QuoteId};
use salesflow_inventory::{MovementDirection, Product, StockMovement};
use salesflow_sales::{DocumentNumber, DocumentType, NewOrder, NewQuote, Order, OrderStatus, Quote, QuotePatch};

use crate::config::EngineConfig;
use crate::conversion::ConversionService;
use crate::error::ServiceResult;
use crate::ledger::InventoryLedger;
use crate::notify::Notifier;
use crate::orders::OrderStateMachine;
use crate::quotes::QuoteService;
use crate::retry::RetryPolicy;
use crate::sequencer::DocumentSequencer;
use crate::store::{PostgresSalesStore, SalesStore};

#[derive(Debug)]
pub struct SalesEngine<S> {
    store: Arc<S>,
    sequencer: DocumentSequencer<S>,
    ledger: InventoryLedger<S>,
    quotes: QuoteService<S>,
    orders: OrderStateMachine<S>,
    conversion: ConversionService<S>,
}

impl<S> SalesEngine<S>
where
    S: SalesStore,
{
    pub fn new(store: Arc<S>, notifier: Notifier) -> Self {
        Self::with_retry_policy(store, notifier, RetryPolicy::default())
    }

    pub fn with_retry_policy(store: Arc<S>, notifier: Notifier, retry: RetryPolicy) -> Self {
        Self {
            sequencer: DocumentSequencer::new(store.clone()),
            ledger: InventoryLedger::new(store.clone(), notifier.clone()).with_retry(retry),
            quotes: QuoteService::new(store.clone(), notifier.clone()).with_retry(retry),
            orders: OrderStateMachine::new(store.clone(), notifier.clone()).with_retry(retry),
            conversion: ConversionService::new(store.clone(), notifier).with_retry(retry),
            store,
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn ledger(&self) -> &InventoryLedger<S> {
        &self.ledger
    }

    pub fn sequencer(&self) -> &DocumentSequencer<S> {
        &self.sequencer
    }

    pub async fn create_quote(&self, input: NewQuote, actor: &ActingUser) -> ServiceResult<Quote> {
        self.quotes.create(input, actor).await
    }

    pub async fn update_quote(
        &self,
        quote_id: QuoteId,
        patch: QuotePatch,
        actor: &ActingUser,
    ) -> ServiceResult<Quote> {
        self.quotes.update(quote_id, patch, actor).await
    }

    pub async fn delete_quote(&self, quote_id: QuoteId, actor: &ActingUser) -> ServiceResult<()> {
        self.quotes.delete(quote_id, actor).await
    }

    pub async fn get_quote(&self, quote_id: QuoteId) -> ServiceResult<Quote> {
        self.quotes.get(quote_id).await
    }

    pub async fn convert_quote(&self, quote_id: QuoteId, actor: &ActingUser) -> ServiceResult<Order> {
        self.conversion.convert(quote_id, actor).await
    }

    pub async fn create_order(&self, input: NewOrder, actor: &ActingUser) -> ServiceResult<Order> {
        self.orders.create(input, actor).await
    }

    pub async fn transition_order(
        &self,
        order_id: OrderId,
        target: OrderStatus,
        actor: &ActingUser,
        cancel_reason: Option<String>,
    ) -> ServiceResult<Order> {
        self.orders
            .transition(order_id, target, actor, cancel_reason)
            .await
            .map(|outcome| outcome.order)
    }

    pub async fn delete_order(&self, order_id: OrderId, actor: &ActingUser) -> ServiceResult<()> {
        self.orders.delete(order_id, actor).await
    }

    pub async fn get_order(&self, order_id: OrderId) -> ServiceResult<Order> {
        self.orders.get(order_id).await
    }

    pub async fn adjust_stock(
        &self,
        product_id: ProductId,
        direction: MovementDirection,
        quantity: i64,
        reason: &str,
        actor: &ActingUser,
    ) -> ServiceResult<StockMovement> {
        self.ledger
            .adjust_stock(product_id, direction, quantity, reason, actor)
            .await
    }

    pub async fn list_movements(&self, product_id: ProductId) -> ServiceResult<Vec<StockMovement>> {
        self.ledger.list_movements(product_id).await
    }

    pub async fn get_product(&self, product_id: ProductId) -> ServiceResult<Product> {
        self.ledger.product(product_id).await
    }

    pub async fn next_document_number(
        &self,
        document_type: DocumentType,
        year: i32,
    ) -> ServiceResult<DocumentNumber> {
        self.sequencer.next(document_type, year).await
    }
}

impl SalesEngine<PostgresSalesStore> {
    /// Connect to Postgres, apply the schema and build an engine.
    pub async fn connect(config: &EngineConfig, notifier: Notifier) -> anyhow::Result<Self> {
        let store = PostgresSalesStore::connect(&config.database).await?;
        Ok(Self::with_retry_policy(
            Arc::new(store),
            notifier,
            config.retry.policy(),
        ))
    }
}
