//! Quote → order conversion.
//!
//! The quote row stays locked from the convertibility check until commit, so
//! two concurrent conversions of the same quote serialize: the second one sees
//! `converted = true` and fails with `AlreadyConverted`.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, instrument};

use salesflow_core::{ActingUser, OrderId, QuoteId};
use salesflow_events::{ChangeKind, ChangeNotice};
use salesflow_sales::Order;

use crate::error::ServiceResult;
use crate::notify::Notifier;
use crate::retry::RetryPolicy;
use crate::store::SalesStore;
use crate::{orders, quotes};

#[derive(Debug, Clone)]
pub struct ConversionService<S> {
    store: Arc<S>,
    notifier: Notifier,
    retry: RetryPolicy,
}

impl<S> ConversionService<S>
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

    /// Turn a quote into a `pending_approval` order carrying its items and
    /// amounts verbatim.
    #[instrument(skip(self, actor), fields(quote_id = %quote_id, user_id = %actor.id), err)]
    pub async fn convert(&self, quote_id: QuoteId, actor: &ActingUser) -> ServiceResult<Order> {
        let order = self
            .retry
            .run("convert_quote", || self.convert_once(quote_id, actor))
            .await?;

        info!(order_id = %order.id, number = %order.number, total = %order.totals.total, "quote converted");
        self.notifier.publish_all([
            ChangeNotice::quote(quote_id, ChangeKind::Updated, order.created_at),
            ChangeNotice::order(order.id, ChangeKind::Created, order.created_at),
        ]);
        Ok(order)
    }

    async fn convert_once(&self, quote_id: QuoteId, actor: &ActingUser) -> ServiceResult<Order> {
        let now = Utc::now();
        let mut tx = self.store.begin().await?;

        let mut quote = quotes::lock_existing(tx.as_mut(), quote_id).await?;
        quote.ensure_convertible()?;

        let order = orders::insert_numbered(tx.as_mut(), now, |number| {
            Order::from_quote(OrderId::new(), number, &quote, actor.id, now)
        })
        .await?;

        quote.mark_converted(order.id, now)?;
        tx.update_quote(&quote).await?;
        tx.commit().await?;
        Ok(order)
    }
}
