//! Versioned aggregate roots and optimistic concurrency.

/// Aggregate root marker + minimal interface.
///
/// A root owns state that is mutated through a read-modify-write cycle (for
/// Depot: a part's quantity counter). The version is the concurrency token
/// that such cycles compare against when they commit.
pub trait AggregateRoot {
    /// Strongly-typed aggregate identifier.
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    /// Returns the aggregate identifier.
    fn id(&self) -> &Self::Id;

    /// Monotonically increasing version of the aggregate's state.
    ///
    /// Incremented by the store on every committed write.
    fn version(&self) -> u64;
}

/// Version a part write was planned against.
///
/// The store applies the write only if the aggregate is still at this version.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct ExpectedVersion(pub u64);

impl ExpectedVersion {
    pub fn matches(self, actual: u64) -> bool {
        self.0 == actual
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl core::fmt::Display for ExpectedVersion {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "v{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_only_the_planned_version() {
        assert!(ExpectedVersion(3).matches(3));
        assert!(!ExpectedVersion(3).matches(4));
        assert_eq!(ExpectedVersion(7).to_string(), "v7");
    }
}
