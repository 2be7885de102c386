use chrono::{DateTime, Utc};

/// A domain-agnostic event.
///
/// Events are facts about something that already committed. They are never
/// published for a transaction that rolled back.
pub trait Event: Clone + core::fmt::Debug + Send + Sync + 'static {
    /// Stable event name/type identifier (e.g. "sales.order.changed").
    fn event_type(&self) -> &'static str;

    /// Schema version for this event type.
    fn version(&self) -> u32;

    /// When the change committed.
    fn occurred_at(&self) -> DateTime<Utc>;
}
