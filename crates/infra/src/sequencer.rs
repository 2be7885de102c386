//! Document numbering.
//!
//! Numbers come from a counter row per `(document_type, year)` incremented
//! atomically inside the creating transaction. The increment rolls back with
//! the transaction, so a failed creation hands its number to the next caller.
//! Duplicates are never issued.

use std::sync::Arc;

use tracing::{debug, instrument};

use salesflow_core::DomainError;
use salesflow_sales::{DocumentNumber, DocumentType};

use crate::error::ServiceResult;
use crate::store::{SalesStore, StoreTx};

/// Issue the next number for `(document_type, year)` inside `tx`.
pub async fn next_in(
    tx: &mut dyn StoreTx,
    document_type: DocumentType,
    year: i32,
) -> ServiceResult<DocumentNumber> {
    if !(1..=9999).contains(&year) {
        return Err(DomainError::validation(format!("year {year} is out of range")).into());
    }
    let sequence = tx.next_document_sequence(document_type, year).await?;
    let number = DocumentNumber::new(document_type, year, sequence);
    debug!(%number, "document number issued");
    Ok(number)
}

/// Standalone sequencer owning its transactions.
#[derive(Debug, Clone)]
pub struct DocumentSequencer<S> {
    store: Arc<S>,
}

impl<S> DocumentSequencer<S>
where
    S: SalesStore,
{
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Issue and commit the next number.
    #[instrument(skip(self), fields(document_type = document_type.prefix()), err)]
    pub async fn next(&self, document_type: DocumentType, year: i32) -> ServiceResult<DocumentNumber> {
        let mut tx = self.store.begin().await?;
        let number = next_in(tx.as_mut(), document_type, year).await?;
        tx.commit().await?;
        Ok(number)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ServiceError;
    use crate::store::InMemorySalesStore;

    #[tokio::test]
    async fn numbers_are_sequential_per_type_and_year() {
        let sequencer = DocumentSequencer::new(Arc::new(InMemorySalesStore::new()));

        let first = sequencer.next(DocumentType::Order, 2025).await.unwrap();
        let second = sequencer.next(DocumentType::Order, 2025).await.unwrap();
        let quote = sequencer.next(DocumentType::Quote, 2025).await.unwrap();

        assert_eq!(first.to_string(), "PED-2025-000001");
        assert_eq!(second.to_string(), "PED-2025-000002");
        assert_eq!(quote.to_string(), "ORC-2025-000001");
    }

    #[tokio::test]
    async fn year_must_be_four_digits() {
        let sequencer = DocumentSequencer::new(Arc::new(InMemorySalesStore::new()));
        let err = sequencer.next(DocumentType::Quote, 12_025).await.unwrap_err();
        assert!(matches!(err, ServiceError::Domain(DomainError::Validation(_))));
    }

    #[tokio::test]
    async fn early_years_issue_parseable_numbers() {
        let sequencer = DocumentSequencer::new(Arc::new(InMemorySalesStore::new()));

        for year in [1, 999, 9999] {
            let number = sequencer.next(DocumentType::Order, year).await.unwrap();
            let parsed: DocumentNumber = number.to_string().parse().unwrap();
            assert_eq!(parsed, number);
        }
        let number = sequencer.next(DocumentType::Order, 999).await.unwrap();
        assert_eq!(number.to_string(), "PED-0999-000002");
    }
}
