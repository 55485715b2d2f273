//! Value object trait: equality by value, not identity.

/// Marker trait for value objects.
///
/// Value objects have no identity and are compared by their attribute values
/// (e.g. a movement kind, a cancellation record). They should be immutable: to
/// "change" one, build a new value.
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
