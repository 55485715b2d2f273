//! Errors raised by core primitives and pure domain constructors.

use thiserror::Error;

pub type DomainResult<T> = Result<T, DomainError>;

/// Failure of a domain constructor or primitive.
///
/// Store and transport failures never appear here; the ledger layer wraps these
/// into its own taxonomy.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("validation failed: {0}")]
    Validation(String),

    /// Identifier text did not parse as the expected id type.
    #[error("invalid identifier: {0}")]
    InvalidId(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_carry_their_category() {
        assert_eq!(DomainError::validation("empty name").to_string(), "validation failed: empty name");
        assert_eq!(DomainError::invalid_id("x").to_string(), "invalid identifier: x");
    }
}
