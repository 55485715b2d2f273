//! Ledger persistence boundary.
//!
//! Defines the store abstraction the ledger service commits through, with an
//! in-memory implementation (tests/dev) and a Postgres implementation.

pub mod in_memory;
pub mod postgres;
pub mod query;
pub mod r#trait;

pub use in_memory::InMemoryLedgerStore;
pub use postgres::PostgresLedgerStore;
pub use query::{Pagination, StatusFilter, TransactionFilter, TransactionPage};
pub use r#trait::{LedgerStore, PartCatalog, StoreError};
