//! Infrastructure layer: storage, transactions, and the services that run the
//! quote → order → stock lifecycle on top of them.

pub mod config;
pub mod conversion;
pub mod engine;
pub mod error;
pub mod ledger;
pub mod notify;
pub mod orders;
pub mod quotes;
pub mod retry;
pub mod sequencer;
pub mod store;

#[cfg(test)]
pub(crate) mod test_support;

pub use config::EngineConfig;
pub use conversion::ConversionService;
pub use engine::SalesEngine;
pub use error::{ServiceError, ServiceResult};
pub use ledger::{InventoryLedger, MovementRequest};
pub use notify::{ChangeSink, Notifier};
pub use orders::{OrderStateMachine, TransitionOutcome};
pub use quotes::QuoteService;
pub use retry::RetryPolicy;
pub use sequencer::DocumentSequencer;
pub use store::{InMemorySalesStore, PostgresSalesStore, SalesStore, StoreError, StoreTx};
