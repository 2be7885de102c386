//! Entity trait: identity + continuity across state changes.

/// Entity marker + minimal interface.
///
/// Quotes, orders and products are entities: two snapshots with the same id
/// describe the same business object at different points in time.
pub trait Entity {
    /// Strongly-typed entity identifier.
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    /// Returns the entity identifier.
    fn id(&self) -> &Self::Id;
}
