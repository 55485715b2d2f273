//! Inventory ledger domain module.
//!
//! This crate contains the business rules of the stock-movement ledger,
//! implemented purely as deterministic domain logic (no IO, no HTTP, no storage):
//!
//! - [`guard`]: the quantity invariant guard shared by every write path
//! - [`movement`]: movement requests and the immutable transaction record
//! - [`batch`]: sequential in-memory projection for batch validation
//! - [`reversal`]: cancellation of a previously recorded movement
//!
//! Each planner returns a commit description ([`LedgerCommit`] /
//! [`CancellationCommit`]) that infrastructure applies as one atomic unit.

pub mod batch;
pub mod commit;
pub mod error;
pub mod guard;
pub mod ids;
pub mod movement;
pub mod part;
pub mod reversal;

pub use batch::{check_batch_size, plan_batch, BatchItemFailure, ItemFailure, Projection, MAX_BATCH_SIZE};
pub use commit::{CancellationCommit, LedgerCommit, PartWrite, ReferenceSnapshot, References};
pub use error::{LedgerError, LedgerResult, NotFoundKind};
pub use guard::{admit, InsufficientStock};
pub use ids::{EquipmentId, PartId, RepairId, TransactionId};
pub use movement::{
    plan_movement, Cancellation, MovementKind, MovementRequest, Transaction, TransactionStatus, MAX_QUANTITY,
};
pub use part::Part;
pub use reversal::{plan_reversal, ReversalOutcome};
