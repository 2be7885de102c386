//! Order state machine.
//!
//! A transition is validated against the adjacency table on
//! [`OrderStatus`](salesflow_sales::OrderStatus), then its stock effect and
//! status write are committed in one transaction:
//!
//! | Transition | Stock effect |
//! |------------|--------------|
//! | `pending_approval → approved` | `out` movement per item |
//! | `approved`/`in_production → cancelled` | `in` movement per item |
//! | `pending_approval → cancelled` | none |
//! | forward fulfilment steps | none, timestamp only |
//!
//! If any item cannot be moved, nothing is written.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Datelike, Utc};
use tracing::{info, instrument};

use salesflow_core::{ActingUser, DomainError, OrderId, ProductId};
use salesflow_events::{ChangeKind, ChangeNotice};
use salesflow_inventory::StockMovement;
use salesflow_sales::{DocumentNumber, DocumentType, NewOrder, Order, OrderStatus};

use crate::error::ServiceResult;
use crate::ledger::{self, MovementRequest};
use crate::notify::Notifier;
use crate::retry::RetryPolicy;
use crate::sequencer;
use crate::store::{SalesStore, StoreTx};

/// Result of a committed transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionOutcome {
    pub order: Order,
    pub movements: Vec<StockMovement>,
}

pub(crate) async fn lock_existing(tx: &mut dyn StoreTx, id: OrderId) -> ServiceResult<Order> {
    tx.lock_order(id)
        .await?
        .ok_or_else(|| DomainError::not_found("order", id).into())
}

/// Assign the next `PED` number and insert `order` built by `build`.
pub(crate) async fn insert_numbered<F>(
    tx: &mut dyn StoreTx,
    now: DateTime<Utc>,
    build: F,
) -> ServiceResult<Order>
where
    F: FnOnce(DocumentNumber) -> Result<Order, DomainError>,
{
    let number = sequencer::next_in(tx, DocumentType::Order, now.year()).await?;
    let order = build(number)?;
    tx.insert_order(&order).await?;
    Ok(order)
}

#[derive(Debug, Clone)]
pub struct OrderStateMachine<S> {
    store: Arc<S>,
    notifier: Notifier,
    retry: RetryPolicy,
}

impl<S> OrderStateMachine<S>
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

    /// Enter an order directly, without a quote. It starts in `pending_approval`.
    #[instrument(skip(self, input, actor), fields(client_id = %input.client_id, user_id = %actor.id), err)]
    pub async fn create(&self, input: NewOrder, actor: &ActingUser) -> ServiceResult<Order> {
        let order = self
            .retry
            .run("create_order", || self.create_once(input.clone(), actor))
            .await?;

        info!(order_id = %order.id, number = %order.number, total = %order.totals.total, "order created");
        self.notifier
            .publish_all([ChangeNotice::order(order.id, ChangeKind::Created, order.created_at)]);
        Ok(order)
    }

    async fn create_once(&self, input: NewOrder, actor: &ActingUser) -> ServiceResult<Order> {
        let now = Utc::now();
        let mut tx = self.store.begin().await?;
        let order = insert_numbered(tx.as_mut(), now, |number| {
            Order::create(OrderId::new(), number, input, actor.id, now)
        })
        .await?;
        tx.commit().await?;
        Ok(order)
    }

    /// Move an order to `target`, applying its stock effect atomically.
    #[instrument(
        skip(self, actor, cancel_reason),
        fields(order_id = %id, target = %target, user_id = %actor.id),
        err
    )]
    pub async fn transition(
        &self,
        id: OrderId,
        target: OrderStatus,
        actor: &ActingUser,
        cancel_reason: Option<String>,
    ) -> ServiceResult<TransitionOutcome> {
        let cancel_reason = cancel_reason
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty());
        if cancel_reason.is_some() && target != OrderStatus::Cancelled {
            return Err(DomainError::validation("a cancel reason only applies to cancellation").into());
        }

        let outcome = self
            .retry
            .run("transition_order", || {
                self.transition_once(id, target, actor, cancel_reason.clone())
            })
            .await?;

        info!(
            number = %outcome.order.number,
            status = %outcome.order.status,
            movements = outcome.movements.len(),
            "order transitioned"
        );
        self.notifier.publish_all(transition_notices(&outcome));
        Ok(outcome)
    }

    async fn transition_once(
        &self,
        id: OrderId,
        target: OrderStatus,
        actor: &ActingUser,
        cancel_reason: Option<String>,
    ) -> ServiceResult<TransitionOutcome> {
        let now = Utc::now();
        let mut tx = self.store.begin().await?;
        let mut order = lock_existing(tx.as_mut(), id).await?;
        let plan = order.plan_transition(target)?;

        let movements = match plan.effect.direction() {
            Some(direction) => {
                let reason = order.movement_reason(&plan);
                let requests: Vec<MovementRequest> = order
                    .stock_lines()
                    .into_iter()
                    .map(|(product_id, quantity)| {
                        MovementRequest::new(product_id, direction, quantity, reason.clone())
                            .for_order(order.id)
                    })
                    .collect();
                ledger::apply_batch(tx.as_mut(), &requests, actor, now).await?
            }
            None => Vec::new(),
        };

        order.apply_transition(&plan, actor.id, cancel_reason, now)?;
        tx.update_order(&order).await?;
        tx.commit().await?;
        Ok(TransitionOutcome { order, movements })
    }

    /// Delete a pending order that was entered directly.
    #[instrument(skip(self, actor), fields(order_id = %id, user_id = %actor.id), err)]
    pub async fn delete(&self, id: OrderId, actor: &ActingUser) -> ServiceResult<()> {
        self.retry
            .run("delete_order", move || async move {
                let mut tx = self.store.begin().await?;
                let order = lock_existing(tx.as_mut(), id).await?;
                order.ensure_deletable()?;
                tx.delete_order(id).await?;
                tx.commit().await?;
                Ok(())
            })
            .await?;

        info!("order deleted");
        self.notifier
            .publish_all([ChangeNotice::order(id, ChangeKind::Deleted, Utc::now())]);
        Ok(())
    }

    pub async fn get(&self, id: OrderId) -> ServiceResult<Order> {
        self.store
            .find_order(id)
            .await?
            .ok_or_else(|| DomainError::not_found("order", id).into())
    }
}

fn transition_notices(outcome: &TransitionOutcome) -> Vec<ChangeNotice> {
    let at = outcome.order.updated_at;
    let products: BTreeSet<ProductId> = outcome.movements.iter().map(|m| m.product_id).collect();

    std::iter::once(ChangeNotice::order(outcome.order.id, ChangeKind::Updated, at))
        .chain(
            products
                .into_iter()
                .map(|id| ChangeNotice::product(id, ChangeKind::Updated, at)),
        )
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ServiceError;
    use crate::test_support::{actor, add_product, order_input, seeded_store};
    use salesflow_inventory::MovementDirection;

    #[tokio::test]
    async fn approve_reserves_and_cancel_releases() {
        let (store, product) = seeded_store(100).await;
        let orders = OrderStateMachine::new(store.clone(), Notifier::disabled());
        let order = orders.create(order_input(&[(product, 15)]), &actor()).await.unwrap();

        let approved = orders
            .transition(order.id, OrderStatus::Approved, &actor(), None)
            .await
            .unwrap();
        assert_eq!(approved.movements.len(), 1);
        assert_eq!(approved.movements[0].direction, MovementDirection::Out);
        assert_eq!(approved.order.approved_by, Some(actor().id));
        assert_eq!(store.find_product(product).await.unwrap().unwrap().stock, 85);

        let cancelled = orders
            .transition(
                order.id,
                OrderStatus::Cancelled,
                &actor(),
                Some("client withdrew".into()),
            )
            .await
            .unwrap();
        assert_eq!(cancelled.movements[0].direction, MovementDirection::In);
        assert_eq!(cancelled.order.cancel_reason.as_deref(), Some("client withdrew"));
        assert_eq!(store.find_product(product).await.unwrap().unwrap().stock, 100);
    }

    #[tokio::test]
    async fn cancelling_a_pending_order_moves_no_stock() {
        let (store, product) = seeded_store(10).await;
        let orders = OrderStateMachine::new(store.clone(), Notifier::disabled());
        let order = orders.create(order_input(&[(product, 5)]), &actor()).await.unwrap();

        let outcome = orders
            .transition(order.id, OrderStatus::Cancelled, &actor(), None)
            .await
            .unwrap();

        assert!(outcome.movements.is_empty());
        assert!(outcome.order.cancelled_at.is_some());
        assert_eq!(store.movement_count().await, 0);
    }

    #[tokio::test]
    async fn forward_steps_only_stamp_timestamps() {
        let (store, product) = seeded_store(10).await;
        let orders = OrderStateMachine::new(store.clone(), Notifier::disabled());
        let order = orders.create(order_input(&[(product, 2)]), &actor()).await.unwrap();

        let mut last = None;
        for status in [
            OrderStatus::Approved,
            OrderStatus::InProduction,
            OrderStatus::Picking,
            OrderStatus::Invoiced,
            OrderStatus::InTransit,
            OrderStatus::Delivered,
        ] {
            last = Some(
                orders
                    .transition(order.id, status, &actor(), None)
                    .await
                    .unwrap(),
            );
        }

        let delivered = last.unwrap().order;
        assert_eq!(delivered.status, OrderStatus::Delivered);
        assert!(delivered.invoiced_at.is_some() && delivered.delivered_at.is_some());
        assert_eq!(store.movement_count().await, 1);
    }

    #[tokio::test]
    async fn illegal_transition_changes_nothing() {
        let (store, product) = seeded_store(10).await;
        let orders = OrderStateMachine::new(store.clone(), Notifier::disabled());
        let order = orders.create(order_input(&[(product, 2)]), &actor()).await.unwrap();

        let err = orders
            .transition(order.id, OrderStatus::Delivered, &actor(), None)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ServiceError::Domain(DomainError::InvalidTransition { .. })
        ));
        assert_eq!(orders.get(order.id).await.unwrap(), order);
    }

    #[tokio::test]
    async fn approval_is_all_or_nothing() {
        let (store, a) = seeded_store(10).await;
        let b = add_product(&store, 3).await;
        let orders = OrderStateMachine::new(store.clone(), Notifier::disabled());
        let order = orders
            .create(order_input(&[(a, 5), (b, 5)]), &actor())
            .await
            .unwrap();

        let err = orders
            .transition(order.id, OrderStatus::Approved, &actor(), None)
            .await
            .unwrap_err();

        match err {
            ServiceError::Domain(DomainError::InsufficientStock {
                product_id,
                available,
                requested,
            }) => {
                assert_eq!(product_id, b);
                assert_eq!((available, requested), (3, 5));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(store.find_product(a).await.unwrap().unwrap().stock, 10);
        assert_eq!(orders.get(order.id).await.unwrap().status, OrderStatus::PendingApproval);
        assert_eq!(store.movement_count().await, 0);
    }

    #[tokio::test]
    async fn cancel_reason_requires_cancellation() {
        let (store, product) = seeded_store(10).await;
        let orders = OrderStateMachine::new(store, Notifier::disabled());
        let order = orders.create(order_input(&[(product, 1)]), &actor()).await.unwrap();

        let err = orders
            .transition(order.id, OrderStatus::Approved, &actor(), Some("why".into()))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Domain(DomainError::Validation(_))));
    }

    #[tokio::test]
    async fn only_pending_direct_orders_can_be_deleted() {
        let (store, product) = seeded_store(10).await;
        let orders = OrderStateMachine::new(store, Notifier::disabled());

        let pending = orders.create(order_input(&[(product, 1)]), &actor()).await.unwrap();
        orders.delete(pending.id, &actor()).await.unwrap();

        let approved = orders.create(order_input(&[(product, 1)]), &actor()).await.unwrap();
        orders
            .transition(approved.id, OrderStatus::Approved, &actor(), None)
            .await
            .unwrap();
        let err = orders.delete(approved.id, &actor()).await.unwrap_err();
        assert!(matches!(err, ServiceError::Domain(DomainError::Immutable(_))));
    }
}
