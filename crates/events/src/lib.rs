//! Post-commit change notices and the pub/sub plumbing that carries them.
//!
//! The sales core never talks to the cache directly. After a transaction
//! commits it publishes a [`ChangeNotice`]; whoever owns the cache subscribes
//! and invalidates.

pub mod bus;
pub mod event;
pub mod in_memory_bus;
pub mod notice;

pub use bus::{EventBus, Subscription};
pub use event::Event;
pub use in_memory_bus::{InMemoryBusError, InMemoryEventBus};
pub use notice::{ChangeKind, ChangeNotice, EntityKind};
