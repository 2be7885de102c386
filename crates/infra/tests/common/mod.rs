#![allow(dead_code)]

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use salesflow_core::{ActingUser, ClientId, ProductId, UserId};
use salesflow_infra::{InMemorySalesStore, Notifier, SalesEngine};
use salesflow_inventory::{Product, StockMovement};
use salesflow_sales::{Adjustments, LineInput, NewOrder, NewQuote};

pub fn actor() -> ActingUser {
    ActingUser::new(UserId::new(), "Robin Ops").with_email("robin@example.com")
}

pub async fn product(store: &InMemorySalesStore, stock: i64) -> ProductId {
    let product = Product::new(ProductId::new(), "Pallet jack", stock, 5, Utc::now()).unwrap();
    let id = product.id;
    store.insert_product(product).await;
    id
}

pub fn engine(store: &Arc<InMemorySalesStore>) -> SalesEngine<InMemorySalesStore> {
    SalesEngine::new(store.clone(), Notifier::disabled())
}

pub fn quote_for(lines: &[(ProductId, i64, Decimal)]) -> NewQuote {
    NewQuote {
        client_id: ClientId::new(),
        items: lines
            .iter()
            .map(|(p, q, price)| LineInput::new(*p, *q, *price))
            .collect(),
        adjustments: Adjustments::default(),
        valid_until: None,
        notes: Some("integration".into()),
    }
}

pub fn order_for(lines: &[(ProductId, i64)]) -> NewOrder {
    NewOrder {
        client_id: ClientId::new(),
        items: lines
            .iter()
            .map(|(p, q)| LineInput::new(*p, *q, dec!(10.00)))
            .collect(),
        adjustments: Adjustments::default(),
        notes: None,
    }
}

/// Chain and endpoint checks over one product's ledger.
pub fn assert_ledger_consistent(movements: &[StockMovement], current_stock: i64) {
    for pair in movements.windows(2) {
        assert_eq!(pair[0].stock_after, pair[1].stock_before, "ledger chain broken");
    }
    if let Some(last) = movements.last() {
        assert_eq!(last.stock_after, current_stock, "ledger tail differs from stock");
    }
    for m in movements {
        assert!(m.stock_after >= 0);
    }
}
