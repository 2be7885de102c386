//! Inventory ledger: the only code path that changes product stock.
//!
//! Every change goes through [`write_movement`], which writes the new stock
//! level and appends the matching [`StockMovement`] in the caller's
//! transaction. For each product the ledger therefore satisfies
//! `stock_after(n) == stock_before(n + 1)` and the last `stock_after` equals
//! the current stock.
//!
//! ## Locking
//!
//! [`apply_batch`] locks every product it touches before it writes anything,
//! in ascending id order, so two batches over overlapping products always
//! queue instead of deadlocking. Movements are then written in request order.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info, instrument, warn};

use salesflow_core::{ActingUser, DomainError, OrderId, ProductId};
use salesflow_events::{ChangeKind, ChangeNotice};
use salesflow_inventory::{MovementDirection, Product, StockMovement, plan_change};

use crate::error::ServiceResult;
use crate::notify::Notifier;
use crate::retry::RetryPolicy;
use crate::store::{SalesStore, StoreTx};

/// One requested stock change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MovementRequest {
    pub product_id: ProductId,
    pub direction: MovementDirection,
    /// Positive delta for `In`/`Out`, target level for `Adjustment`.
    pub quantity: i64,
    pub reason: String,
    pub order_id: Option<OrderId>,
}

impl MovementRequest {
    pub fn new(
        product_id: ProductId,
        direction: MovementDirection,
        quantity: i64,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            product_id,
            direction,
            quantity,
            reason: reason.into(),
            order_id: None,
        }
    }

    pub fn for_order(mut self, order_id: OrderId) -> Self {
        self.order_id = Some(order_id);
        self
    }
}

/// Lock all products in `requests` (ascending id), then apply each request in
/// order. Fails on the first request that cannot be applied; the caller's
/// transaction must then be discarded.
pub async fn apply_batch(
    tx: &mut dyn StoreTx,
    requests: &[MovementRequest],
    actor: &ActingUser,
    now: DateTime<Utc>,
) -> ServiceResult<Vec<StockMovement>> {
    let mut ids: Vec<ProductId> = requests.iter().map(|r| r.product_id).collect();
    ids.sort();
    ids.dedup();

    let mut locked: HashMap<ProductId, Product> = HashMap::with_capacity(ids.len());
    for id in ids {
        let product = lock_existing(tx, id).await?;
        locked.insert(id, product);
    }

    let mut movements = Vec::with_capacity(requests.len());
    for request in requests {
        let product = locked
            .get_mut(&request.product_id)
            .ok_or_else(|| DomainError::not_found("product", request.product_id))?;
        movements.push(write_movement(tx, product, request, actor, now).await?);
    }
    Ok(movements)
}

async fn lock_existing(tx: &mut dyn StoreTx, id: ProductId) -> ServiceResult<Product> {
    tx.lock_product(id)
        .await?
        .ok_or_else(|| DomainError::not_found("product", id).into())
}

/// Apply one request to an already locked product and keep `product` in sync
/// with what was written.
async fn write_movement(
    tx: &mut dyn StoreTx,
    product: &mut Product,
    request: &MovementRequest,
    actor: &ActingUser,
    now: DateTime<Utc>,
) -> ServiceResult<StockMovement> {
    let change = plan_change(product, request.direction, request.quantity)?;

    let mut updated = product.clone();
    updated.stock = change.stock_after;
    updated.updated_at = now;
    tx.update_product_stock(&updated).await?;

    let movement = StockMovement::record(
        product.id,
        change,
        request.order_id,
        actor.id,
        request.reason.clone(),
        now,
    );
    tx.append_movement(&movement).await?;

    *product = updated;
    if product.is_below_minimum() {
        warn!(
            product_id = %product.id,
            stock = product.stock,
            min_stock = product.min_stock,
            "stock below minimum"
        );
    }
    Ok(movement)
}

/// Manual stock operations and ledger queries.
#[derive(Debug, Clone)]
pub struct InventoryLedger<S> {
    store: Arc<S>,
    notifier: Notifier,
    retry: RetryPolicy,
}

impl<S> InventoryLedger<S>
where
    S: SalesStore,
{
    pub fn new(store: Arc<S>, notifier: Notifier) -> Self {
        Self {
            store,
            notifier,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Apply a single movement in its own transaction.
    #[instrument(
        skip(self, request, actor),
        fields(
            product_id = %request.product_id,
            direction = %request.direction,
            quantity = request.quantity,
            user_id = %actor.id
        ),
        err
    )]
    pub async fn apply_movement(
        &self,
        request: MovementRequest,
        actor: &ActingUser,
    ) -> ServiceResult<StockMovement> {
        let movement = self
            .retry
            .run("apply_movement", || self.apply_once(&request, actor))
            .await?;

        info!(
            movement_id = %movement.id,
            stock_before = movement.stock_before,
            stock_after = movement.stock_after,
            "stock movement recorded"
        );
        self.notifier.publish_all([ChangeNotice::product(
            movement.product_id,
            ChangeKind::Updated,
            movement.created_at,
        )]);
        Ok(movement)
    }

    async fn apply_once(
        &self,
        request: &MovementRequest,
        actor: &ActingUser,
    ) -> ServiceResult<StockMovement> {
        let now = Utc::now();
        let mut tx = self.store.begin().await?;
        let mut product = lock_existing(tx.as_mut(), request.product_id).await?;
        let movement = write_movement(tx.as_mut(), &mut product, request, actor, now).await?;
        tx.commit().await?;
        Ok(movement)
    }

    /// Manual correction, receipt or write-off. A reason is mandatory.
    pub async fn adjust_stock(
        &self,
        product_id: ProductId,
        direction: MovementDirection,
        quantity: i64,
        reason: &str,
        actor: &ActingUser,
    ) -> ServiceResult<StockMovement> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(DomainError::validation("a reason is required for manual stock changes").into());
        }
        self.apply_movement(
            MovementRequest::new(product_id, direction, quantity, reason),
            actor,
        )
        .await
    }

    /// Chronological ledger of one product.
    pub async fn list_movements(&self, product_id: ProductId) -> ServiceResult<Vec<StockMovement>> {
        if self.store.find_product(product_id).await?.is_none() {
            return Err(DomainError::not_found("product", product_id).into());
        }
        Ok(self.store.list_movements(product_id).await?)
    }

    pub async fn product(&self, product_id: ProductId) -> ServiceResult<Product> {
        self.store
            .find_product(product_id)
            .await?
            .ok_or_else(|| DomainError::not_found("product", product_id).into())
    }
}
