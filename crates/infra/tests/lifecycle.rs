mod common;

use std::sync::Arc;

use rust_decimal_macros::dec;

use salesflow_core::DomainError;
use salesflow_events::{ChangeKind, ChangeNotice, EntityKind, EventBus, InMemoryEventBus};
use salesflow_infra::{InMemorySalesStore, Notifier, SalesEngine, ServiceError};
use salesflow_inventory::MovementDirection;
use salesflow_sales::{OrderStatus, QuoteStatus};

use common::{actor, assert_ledger_consistent, engine, order_for, product, quote_for};

#[tokio::test]
async fn quote_to_order_to_cancel_scenario() {
    let store = Arc::new(InMemorySalesStore::new());
    let p = product(&store, 100).await;
    let engine = engine(&store);
    let user = actor();

    let quote = engine
        .create_quote(quote_for(&[(p, 15, dec!(150.00))]), &user)
        .await
        .unwrap();
    let order = engine.convert_quote(quote.id, &user).await.unwrap();
    assert_eq!(order.totals.total, dec!(2250.00));
    assert_eq!(order.number.document_type.prefix(), "PED");
    assert_eq!(order.status, OrderStatus::PendingApproval);

    engine
        .transition_order(order.id, OrderStatus::Approved, &user, None)
        .await
        .unwrap();
    assert_eq!(engine.get_product(p).await.unwrap().stock, 85);

    let cancelled = engine
        .transition_order(order.id, OrderStatus::Cancelled, &user, Some("budget cut".into()))
        .await
        .unwrap();
    assert_eq!(cancelled.cancelled_by, Some(user.id));
    assert_eq!(engine.get_product(p).await.unwrap().stock, 100);

    let movements = engine.list_movements(p).await.unwrap();
    assert_eq!(movements.len(), 2);

    let out = &movements[0];
    assert_eq!(out.direction, MovementDirection::Out);
    assert_eq!((out.quantity, out.stock_before, out.stock_after), (15, 100, 85));
    assert_eq!(out.order_id, Some(order.id));
    assert_eq!(out.reason, format!("order {} approved", order.number));

    let back = &movements[1];
    assert_eq!(back.direction, MovementDirection::In);
    assert_eq!((back.quantity, back.stock_before, back.stock_after), (15, 85, 100));
    assert_eq!(back.reason, format!("order {} cancelled", order.number));

    assert_ledger_consistent(&movements, 100);
}

#[tokio::test]
async fn conversion_is_idempotent() {
    let store = Arc::new(InMemorySalesStore::new());
    let p = product(&store, 10).await;
    let engine = engine(&store);

    let quote = engine
        .create_quote(quote_for(&[(p, 1, dec!(9.90))]), &actor())
        .await
        .unwrap();
    engine.convert_quote(quote.id, &actor()).await.unwrap();
    let movements_before = store.movement_count().await;

    let err = engine.convert_quote(quote.id, &actor()).await.unwrap_err();

    assert!(matches!(
        err,
        ServiceError::Domain(DomainError::AlreadyConverted { .. })
    ));
    assert_eq!(store.order_count().await, 1);
    assert_eq!(store.movement_count().await, movements_before);
    assert_eq!(engine.get_quote(quote.id).await.unwrap().status, QuoteStatus::Converted);
}

#[tokio::test]
async fn approve_then_cancel_conserves_stock_across_products() {
    let store = Arc::new(InMemorySalesStore::new());
    let a = product(&store, 40).await;
    let b = product(&store, 7).await;
    let engine = engine(&store);

    let order = engine
        .create_order(order_for(&[(a, 12), (b, 7), (a, 3)]), &actor())
        .await
        .unwrap();
    engine
        .transition_order(order.id, OrderStatus::Approved, &actor(), None)
        .await
        .unwrap();
    assert_eq!(engine.get_product(a).await.unwrap().stock, 25);
    assert_eq!(engine.get_product(b).await.unwrap().stock, 0);

    engine
        .transition_order(order.id, OrderStatus::InProduction, &actor(), None)
        .await
        .unwrap();
    engine
        .transition_order(order.id, OrderStatus::Cancelled, &actor(), None)
        .await
        .unwrap();

    for (id, stock) in [(a, 40), (b, 7)] {
        assert_eq!(engine.get_product(id).await.unwrap().stock, stock);
        assert_ledger_consistent(&engine.list_movements(id).await.unwrap(), stock);
    }
}

#[tokio::test]
async fn approval_shortfall_names_the_product_and_changes_nothing() {
    let store = Arc::new(InMemorySalesStore::new());
    let a = product(&store, 10).await;
    let b = product(&store, 3).await;
    let engine = engine(&store);
    let order = engine
        .create_order(order_for(&[(a, 5), (b, 5)]), &actor())
        .await
        .unwrap();

    let err = engine
        .transition_order(order.id, OrderStatus::Approved, &actor(), None)
        .await
        .unwrap_err();

    assert_eq!(
        err,
        ServiceError::Domain(DomainError::InsufficientStock {
            product_id: b,
            available: 3,
            requested: 5,
        })
    );
    assert_eq!(engine.get_product(a).await.unwrap().stock, 10);
    assert!(engine.list_movements(a).await.unwrap().is_empty());
    assert_eq!(
        engine.get_order(order.id).await.unwrap().status,
        OrderStatus::PendingApproval
    );
}

#[tokio::test]
async fn pending_order_cannot_jump_to_delivered() {
    let store = Arc::new(InMemorySalesStore::new());
    let p = product(&store, 10).await;
    let engine = engine(&store);
    let order = engine.create_order(order_for(&[(p, 1)]), &actor()).await.unwrap();

    let err = engine
        .transition_order(order.id, OrderStatus::Delivered, &actor(), None)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        ServiceError::Domain(DomainError::InvalidTransition { .. })
    ));
    assert_eq!(engine.get_order(order.id).await.unwrap(), order);
}

#[tokio::test]
async fn ledger_stays_consistent_under_mixed_operations() {
    let store = Arc::new(InMemorySalesStore::new());
    let p = product(&store, 50).await;
    let engine = engine(&store);
    let user = actor();

    engine.adjust_stock(p, MovementDirection::In, 20, "receipt", &user).await.unwrap();
    let o1 = engine.create_order(order_for(&[(p, 30)]), &user).await.unwrap();
    let o2 = engine.create_order(order_for(&[(p, 25)]), &user).await.unwrap();
    engine.transition_order(o1.id, OrderStatus::Approved, &user, None).await.unwrap();
    engine.adjust_stock(p, MovementDirection::Adjustment, 38, "count", &user).await.unwrap();
    engine.transition_order(o2.id, OrderStatus::Approved, &user, None).await.unwrap();
    engine.transition_order(o1.id, OrderStatus::Cancelled, &user, None).await.unwrap();
    let _ = engine.adjust_stock(p, MovementDirection::Out, 1_000, "oops", &user).await;

    let stock = engine.get_product(p).await.unwrap().stock;
    assert_eq!(stock, 38 - 25 + 30);
    assert_ledger_consistent(&engine.list_movements(p).await.unwrap(), stock);
}

#[tokio::test]
async fn converted_quote_rejects_edits_and_deletion() {
    let store = Arc::new(InMemorySalesStore::new());
    let p = product(&store, 10).await;
    let engine = engine(&store);
    let quote = engine
        .create_quote(quote_for(&[(p, 2, dec!(3.00))]), &actor())
        .await
        .unwrap();
    let order = engine.convert_quote(quote.id, &actor()).await.unwrap();

    let patch = salesflow_sales::QuotePatch {
        notes: Some(None),
        ..Default::default()
    };
    assert!(matches!(
        engine.update_quote(quote.id, patch, &actor()).await,
        Err(ServiceError::Domain(DomainError::Immutable(_)))
    ));
    assert!(matches!(
        engine.delete_quote(quote.id, &actor()).await,
        Err(ServiceError::Domain(DomainError::Immutable(_)))
    ));
    // Orders born from a quote are never deletable either.
    assert!(matches!(
        engine.delete_order(order.id, &actor()).await,
        Err(ServiceError::Domain(DomainError::Immutable(_)))
    ));
}

#[tokio::test]
async fn committed_changes_publish_notices_and_failures_do_not() {
    let store = Arc::new(InMemorySalesStore::new());
    let p = product(&store, 10).await;
    let bus = Arc::new(InMemoryEventBus::<ChangeNotice>::new());
    let subscription = bus.subscribe();
    let engine = SalesEngine::new(store.clone(), Notifier::new(bus.clone()));

    let order = engine.create_order(order_for(&[(p, 4)]), &actor()).await.unwrap();
    engine
        .transition_order(order.id, OrderStatus::Approved, &actor(), None)
        .await
        .unwrap();

    let notices = subscription.drain();
    let kinds: Vec<(EntityKind, ChangeKind)> =
        notices.iter().map(|n| (n.entity, n.change)).collect();
    assert_eq!(
        kinds,
        vec![
            (EntityKind::Order, ChangeKind::Created),
            (EntityKind::Order, ChangeKind::Updated),
            (EntityKind::Product, ChangeKind::Updated),
        ]
    );
    assert_eq!(notices[2].cache_key(), format!("product:{p}"));

    let _ = engine
        .transition_order(order.id, OrderStatus::Delivered, &actor(), None)
        .await;
    assert!(subscription.drain().is_empty());
}
