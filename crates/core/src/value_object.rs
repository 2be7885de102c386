//! Value object trait: equality by value, not identity.

/// Marker trait for value objects.
///
/// Value objects are immutable and compared by their attribute values. Line
/// items, monetary adjustments and computed totals are value objects: an order
/// item copied from a quote item is equal to it field by field.
///
/// ```ignore
/// #[derive(Debug, Clone, PartialEq, Eq)]
/// struct Adjustments { freight: Decimal, surcharge: Decimal }
///
/// impl ValueObject for Adjustments {}
/// ```
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
