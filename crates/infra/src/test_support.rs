//! Fixtures shared by the service tests.

use std::sync::Arc;

use chrono::Utc;
use rust_decimal_macros::dec;
use uuid::Uuid;

use salesflow_core::{ActingUser, ClientId, ProductId, UserId};
use salesflow_inventory::Product;
use salesflow_sales::{Adjustments, LineInput, NewOrder, NewQuote};

use crate::store::InMemorySalesStore;

pub(crate) fn actor() -> ActingUser {
    ActingUser::new(UserId::from_uuid(Uuid::from_u128(0x5a1e5)), "Dana Sales")
}

pub(crate) async fn add_product(store: &InMemorySalesStore, stock: i64) -> ProductId {
    let product = Product::new(ProductId::new(), "Steel bracket", stock, 0, Utc::now()).unwrap();
    let id = product.id;
    store.insert_product(product).await;
    id
}

pub(crate) async fn seeded_store(stock: i64) -> (Arc<InMemorySalesStore>, ProductId) {
    let store = Arc::new(InMemorySalesStore::new());
    let product = add_product(&store, stock).await;
    (store, product)
}

pub(crate) fn quote_input(product: ProductId, quantity: i64) -> NewQuote {
    NewQuote {
        client_id: ClientId::new(),
        items: vec![LineInput::new(product, quantity, dec!(150.00))],
        adjustments: Adjustments::default(),
        valid_until: None,
        notes: None,
    }
}

pub(crate) fn order_input(lines: &[(ProductId, i64)]) -> NewOrder {
    NewOrder {
        client_id: ClientId::new(),
        items: lines
            .iter()
            .map(|(product, quantity)| LineInput::new(*product, *quantity, dec!(150.00)))
            .collect(),
        adjustments: Adjustments::default(),
        notes: None,
    }
}
