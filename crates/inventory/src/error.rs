//! Ledger failure taxonomy.

use thiserror::Error;

use depot_core::DomainError;

use crate::batch::BatchItemFailure;
use crate::guard::InsufficientStock;

pub type LedgerResult<T> = Result<T, LedgerError>;

/// Which tenant-scoped entity a lookup failed to resolve.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum NotFoundKind {
    Part,
    Equipment,
    Repair,
    Transaction,
}

impl NotFoundKind {
    pub fn as_str(self) -> &'static str {
        match self {
            NotFoundKind::Part => "part",
            NotFoundKind::Equipment => "equipment",
            NotFoundKind::Repair => "repair",
            NotFoundKind::Transaction => "transaction",
        }
    }
}

impl core::fmt::Display for NotFoundKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error surfaced by every ledger operation.
///
/// Business-rule rejections (`Validation`, `NotFound`, `InsufficientStock`,
/// `AlreadyCancelled`, `BatchRejected`) are deterministic. `Conflict` means the
/// optimistic concurrency retries were exhausted and the caller may retry the
/// whole operation; `Store` is an infrastructure failure.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("{0} not found")]
    NotFound(NotFoundKind),

    #[error("insufficient stock: requested {requested}, available {available}")]
    InsufficientStock { available: u64, requested: u64 },

    #[error("transaction already cancelled")]
    AlreadyCancelled,

    #[error("batch rejected: {} item(s) failed validation", .0.len())]
    BatchRejected(Vec<BatchItemFailure>),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("store failure: {0}")]
    Store(String),
}

impl LedgerError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Stable machine-readable code (used in API error bodies).
    pub fn code(&self) -> &'static str {
        match self {
            LedgerError::Validation(_) => "validation_error",
            LedgerError::NotFound(_) => "not_found",
            LedgerError::InsufficientStock { .. } => "insufficient_stock",
            LedgerError::AlreadyCancelled => "already_cancelled",
            LedgerError::BatchRejected(_) => "batch_validation_error",
            LedgerError::Conflict(_) => "conflict",
            LedgerError::Store(_) => "store_error",
        }
    }
}

impl From<InsufficientStock> for LedgerError {
    fn from(value: InsufficientStock) -> Self {
        LedgerError::InsufficientStock {
            available: value.available,
            requested: value.requested,
        }
    }
}

impl From<DomainError> for LedgerError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::Validation(msg) | DomainError::InvalidId(msg) => LedgerError::Validation(msg),
        }
    }
}
