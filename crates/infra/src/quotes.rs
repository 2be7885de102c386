//! Quote lifecycle: create, edit while unconverted, delete.

use std::sync::Arc;

use chrono::{Datelike, Utc};
use tracing::{info, instrument};

use salesflow_core::{ActingUser, DomainError, QuoteId};
use salesflow_events::{ChangeKind, ChangeNotice};
use salesflow_sales::{DocumentType, NewQuote, Quote, QuotePatch};

use crate::error::ServiceResult;
use crate::notify::Notifier;
use crate::retry::RetryPolicy;
use crate::sequencer;
use crate::store::{SalesStore, StoreTx};

/// Load and lock a quote, failing with `NotFound`.
pub(crate) async fn lock_existing(tx: &mut dyn StoreTx, id: QuoteId) -> ServiceResult<Quote> {
    tx.lock_quote(id)
        .await?
        .ok_or_else(|| DomainError::not_found("quote", id).into())
}

#[derive(Debug, Clone)]
pub struct QuoteService<S> {
    store: Arc<S>,
    notifier: Notifier,
    retry: RetryPolicy,
}

impl<S> QuoteService<S>
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

    /// Price and persist a new quote with the next `ORC` number.
    #[instrument(skip(self, input, actor), fields(client_id = %input.client_id, user_id = %actor.id), err)]
    pub async fn create(&self, input: NewQuote, actor: &ActingUser) -> ServiceResult<Quote> {
        let quote = self
            .retry
            .run("create_quote", || self.create_once(input.clone(), actor))
            .await?;

        info!(quote_id = %quote.id, number = %quote.number, total = %quote.totals.total, "quote created");
        self.notifier
            .publish_all([ChangeNotice::quote(quote.id, ChangeKind::Created, quote.created_at)]);
        Ok(quote)
    }

    async fn create_once(&self, input: NewQuote, actor: &ActingUser) -> ServiceResult<Quote> {
        let now = Utc::now();
        let mut tx = self.store.begin().await?;
        let number = sequencer::next_in(tx.as_mut(), DocumentType::Quote, now.year()).await?;
        let quote = Quote::create(QuoteId::new(), number, input, actor.id, now)?;
        tx.insert_quote(&quote).await?;
        tx.commit().await?;
        Ok(quote)
    }

    /// Apply a patch to an unconverted quote. Converted quotes fail with
    /// `Immutable`.
    #[instrument(skip(self, patch, actor), fields(quote_id = %id, user_id = %actor.id), err)]
    pub async fn update(&self, id: QuoteId, patch: QuotePatch, actor: &ActingUser) -> ServiceResult<Quote> {
        if patch.is_empty() {
            return Err(DomainError::validation("nothing to update").into());
        }

        let quote = self
            .retry
            .run("update_quote", || self.update_once(id, patch.clone()))
            .await?;

        info!(number = %quote.number, status = %quote.status, "quote updated");
        self.notifier
            .publish_all([ChangeNotice::quote(quote.id, ChangeKind::Updated, quote.updated_at)]);
        Ok(quote)
    }

    async fn update_once(&self, id: QuoteId, patch: QuotePatch) -> ServiceResult<Quote> {
        let mut tx = self.store.begin().await?;
        let mut quote = lock_existing(tx.as_mut(), id).await?;
        quote.apply_patch(patch, Utc::now())?;
        tx.update_quote(&quote).await?;
        tx.commit().await?;
        Ok(quote)
    }

    /// Delete an unconverted quote.
    #[instrument(skip(self, actor), fields(quote_id = %id, user_id = %actor.id), err)]
    pub async fn delete(&self, id: QuoteId, actor: &ActingUser) -> ServiceResult<()> {
        self.retry
            .run("delete_quote", move || async move {
                let mut tx = self.store.begin().await?;
                let quote = lock_existing(tx.as_mut(), id).await?;
                quote.ensure_mutable()?;
                tx.delete_quote(id).await?;
                tx.commit().await?;
                Ok(())
            })
            .await?;

        info!("quote deleted");
        self.notifier
            .publish_all([ChangeNotice::quote(id, ChangeKind::Deleted, Utc::now())]);
        Ok(())
    }

    pub async fn get(&self, id: QuoteId) -> ServiceResult<Quote> {
        self.store
            .find_quote(id)
            .await?
            .ok_or_else(|| DomainError::not_found("quote", id).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ServiceError;
    use crate::test_support::{actor, quote_input, seeded_store};
    use rust_decimal_macros::dec;
    use salesflow_core::OrderId;
    use salesflow_sales::{LineInput, QuoteStatus};

    #[tokio::test]
    async fn create_numbers_and_prices_the_quote() {
        let (store, product) = seeded_store(100).await;
        let quotes = QuoteService::new(store, Notifier::disabled());

        let first = quotes.create(quote_input(product, 15), &actor()).await.unwrap();
        let second = quotes.create(quote_input(product, 1), &actor()).await.unwrap();

        assert_eq!(first.totals.total, dec!(2250.00));
        assert_eq!(first.status, QuoteStatus::InReview);
        assert_eq!(first.number.sequence + 1, second.number.sequence);
        assert_eq!(quotes.get(first.id).await.unwrap(), first);
    }

    #[tokio::test]
    async fn invalid_items_create_nothing() {
        let (store, product) = seeded_store(100).await;
        let quotes = QuoteService::new(store.clone(), Notifier::disabled());

        let mut input = quote_input(product, 1);
        input.items.push(LineInput::new(product, -1, dec!(1.00)));
        let err = quotes.create(input, &actor()).await.unwrap_err();
        assert!(matches!(err, ServiceError::Domain(DomainError::Validation(_))));

        // The failed attempt burned nothing: the next quote still gets number 1.
        let quote = quotes.create(quote_input(product, 1), &actor()).await.unwrap();
        assert_eq!(quote.number.sequence, 1);
    }

    #[tokio::test]
    async fn update_reprices() {
        let (store, product) = seeded_store(100).await;
        let quotes = QuoteService::new(store, Notifier::disabled());
        let quote = quotes.create(quote_input(product, 15), &actor()).await.unwrap();

        let updated = quotes
            .update(
                quote.id,
                QuotePatch {
                    items: Some(vec![LineInput::new(product, 10, dec!(150.00))]),
                    status: Some(QuoteStatus::Sent),
                    ..QuotePatch::default()
                },
                &actor(),
            )
            .await
            .unwrap();

        assert_eq!(updated.totals.total, dec!(1500.00));
        assert_eq!(quotes.get(quote.id).await.unwrap(), updated);
    }

    #[tokio::test]
    async fn converted_quote_cannot_be_updated_or_deleted() {
        let (store, product) = seeded_store(100).await;
        let quotes = QuoteService::new(store.clone(), Notifier::disabled());
        let quote = quotes.create(quote_input(product, 1), &actor()).await.unwrap();

        let mut tx = store.begin().await.unwrap();
        let mut locked = lock_existing(tx.as_mut(), quote.id).await.unwrap();
        locked.mark_converted(OrderId::new(), Utc::now()).unwrap();
        tx.update_quote(&locked).await.unwrap();
        tx.commit().await.unwrap();

        let patch = QuotePatch {
            notes: Some(Some("edit".into())),
            ..QuotePatch::default()
        };
        let err = quotes.update(quote.id, patch, &actor()).await.unwrap_err();
        assert!(matches!(err, ServiceError::Domain(DomainError::Immutable(_))));

        let err = quotes.delete(quote.id, &actor()).await.unwrap_err();
        assert!(matches!(err, ServiceError::Domain(DomainError::Immutable(_))));
    }

    #[tokio::test]
    async fn delete_removes_unconverted_quote() {
        let (store, product) = seeded_store(100).await;
        let quotes = QuoteService::new(store, Notifier::disabled());
        let quote = quotes.create(quote_input(product, 1), &actor()).await.unwrap();

        quotes.delete(quote.id, &actor()).await.unwrap();
        assert!(matches!(
            quotes.get(quote.id).await,
            Err(ServiceError::Domain(DomainError::NotFound { .. }))
        ));
    }

    #[tokio::test]
    async fn empty_patch_is_rejected() {
        let (store, _) = seeded_store(1).await;
        let quotes = QuoteService::new(store, Notifier::disabled());
        let err = quotes
            .update(QuoteId::new(), QuotePatch::default(), &actor())
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Domain(DomainError::Validation(_))));
    }
}
