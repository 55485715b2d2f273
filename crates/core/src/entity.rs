//! Entity trait: identity + continuity across state changes.

/// Entity marker + minimal interface.
///
/// Ledger rows (movements) are entities: they keep their identity even when the
/// cancellation fields are filled in later.
pub trait Entity {
    /// Strongly-typed entity identifier.
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    /// Returns the entity identifier.
    fn id(&self) -> &Self::Id;
}
