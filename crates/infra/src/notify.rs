//! Post-commit change notification.
//!
//! Services hand the notices of a committed transaction to a [`Notifier`],
//! which forwards them to the configured bus. Publishing is fire-and-forget: a
//! failure is logged at `warn` and the operation still succeeds.

use std::sync::Arc;

use tracing::{debug, warn};

use salesflow_events::{ChangeNotice, Event, EventBus};

/// Object-safe sink for change notices.
pub trait ChangeSink: Send + Sync {
    fn deliver(&self, notice: ChangeNotice);
}

impl<B> ChangeSink for B
where
    B: EventBus<ChangeNotice>,
{
    fn deliver(&self, notice: ChangeNotice) {
        let event_type = notice.event_type();
        let version = notice.version();
        let key = notice.cache_key();
        let pattern = notice.list_pattern();
        match self.publish(notice) {
            Ok(()) => debug!(
                event_type,
                version,
                cache_key = %key,
                list_pattern = %pattern,
                "change notice published"
            ),
            Err(err) => warn!(
                event_type,
                cache_key = %key,
                list_pattern = %pattern,
                error = ?err,
                "failed to publish change notice"
            ),
        }
    }
}

/// Shared handle to the change sink. `Notifier::disabled()` drops everything.
#[derive(Clone, Default)]
pub struct Notifier {
    sink: Option<Arc<dyn ChangeSink>>,
}

impl Notifier {
    pub fn new<S>(sink: S) -> Self
    where
        S: ChangeSink + 'static,
    {
        Self {
            sink: Some(Arc::new(sink)),
        }
    }

    pub fn disabled() -> Self {
        Self::default()
    }

    /// Publish notices for a committed transaction, in order.
    pub fn publish_all(&self, notices: impl IntoIterator<Item = ChangeNotice>) {
        let Some(sink) = &self.sink else {
            return;
        };
        for notice in notices {
            sink.deliver(notice);
        }
    }
}

impl core::fmt::Debug for Notifier {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Notifier")
            .field("enabled", &self.sink.is_some())
            .finish()
    }
}
