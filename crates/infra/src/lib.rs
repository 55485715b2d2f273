//! Infrastructure layer: ledger persistence and the ledger application service.

pub mod ledger_service;
pub mod ledger_store;

pub use ledger_service::{CancellationReceipt, DEFAULT_MAX_ATTEMPTS, LedgerService, Reconciliation};
pub use ledger_store::{
    InMemoryLedgerStore, LedgerStore, Pagination, PartCatalog, PostgresLedgerStore, StatusFilter, StoreError,
    TransactionFilter, TransactionPage,
};
