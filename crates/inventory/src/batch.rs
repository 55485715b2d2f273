//! Batch validation against a sequential in-memory projection.
//!
//! Every distinct part of a batch is read once from the [`ReferenceSnapshot`];
//! items are then walked in request order and each one is checked by the guard
//! against the *projected* counter left by the items before it. A failing item
//! leaves the projection untouched and is recorded; any failure rejects the
//! whole batch.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use thiserror::Error;

use depot_core::{ExpectedVersion, TenantId, UserId};

use crate::commit::{LedgerCommit, PartWrite, ReferenceSnapshot};
use crate::error::{LedgerError, LedgerResult, NotFoundKind};
use crate::guard::{admit, InsufficientStock};
use crate::ids::PartId;
use crate::movement::{MovementRequest, Transaction};
use crate::part::Part;

/// Maximum number of movements accepted in one batch.
pub const MAX_BATCH_SIZE: usize = 100;

/// Why a single movement (of a batch, or on its own) was not admitted.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ItemFailure {
    #[error("{0}")]
    Validation(String),

    #[error("{0} not found")]
    NotFound(NotFoundKind),

    #[error("insufficient stock: requested {requested}, available {available}")]
    InsufficientStock { available: u64, requested: u64 },
}

impl ItemFailure {
    pub fn code(&self) -> &'static str {
        match self {
            ItemFailure::Validation(_) => "validation_error",
            ItemFailure::NotFound(_) => "not_found",
            ItemFailure::InsufficientStock { .. } => "insufficient_stock",
        }
    }
}

impl From<InsufficientStock> for ItemFailure {
    fn from(value: InsufficientStock) -> Self {
        ItemFailure::InsufficientStock {
            available: value.available,
            requested: value.requested,
        }
    }
}

impl From<ItemFailure> for LedgerError {
    fn from(value: ItemFailure) -> Self {
        match value {
            ItemFailure::Validation(msg) => LedgerError::Validation(msg),
            ItemFailure::NotFound(kind) => LedgerError::NotFound(kind),
            ItemFailure::InsufficientStock {
                available,
                requested,
            } => LedgerError::InsufficientStock {
                available,
                requested,
            },
        }
    }
}

/// A failing batch member and its zero-based position in the request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchItemFailure {
    pub index: usize,
    pub failure: ItemFailure,
}

#[derive(Debug, Clone, Copy)]
struct ProjectedPart {
    quantity: u64,
    base_version: u64,
}

/// Running `{part → quantity}` view over the parts a batch touches.
#[derive(Debug, Default)]
pub struct Projection {
    entries: HashMap<PartId, ProjectedPart>,
    order: Vec<PartId>,
}

impl Projection {
    /// Current projected quantity for `part` (its persisted quantity until an
    /// earlier item of the batch moved it).
    pub fn quantity(&self, part: &Part) -> u64 {
        self.entries
            .get(&part.id)
            .map(|e| e.quantity)
            .unwrap_or(part.quantity)
    }

    /// Validate one item against the projection and, if admitted, move the
    /// projected counter.
    pub fn apply<'a>(
        &mut self,
        tenant_id: TenantId,
        refs: &'a ReferenceSnapshot,
        item: &MovementRequest,
    ) -> Result<&'a Part, ItemFailure> {
        item.validate()?;
        let part = item.resolve(tenant_id, refs)?;

        let current = self.quantity(part);
        admit(current, item.kind, item.quantity)?;
        let next = item
            .kind
            .apply(current, item.quantity)
            .ok_or(ItemFailure::Validation("resulting quantity is out of range".into()))?;

        match self.entries.get_mut(&part.id) {
            Some(entry) => entry.quantity = next,
            None => {
                self.entries.insert(
                    part.id,
                    ProjectedPart {
                        quantity: next,
                        base_version: part.version,
                    },
                );
                self.order.push(part.id);
            }
        }
        Ok(part)
    }

    /// Final counter writes, one per touched part, in first-touched order.
    pub fn into_writes(self) -> Vec<PartWrite> {
        self.order
            .iter()
            .filter_map(|id| {
                self.entries.get(id).map(|e| PartWrite {
                    part_id: *id,
                    expected_version: ExpectedVersion(e.base_version),
                    new_quantity: e.quantity,
                })
            })
            .collect()
    }
}

/// Reject empty or oversized batches before any lookup happens.
pub fn check_batch_size(len: usize) -> LedgerResult<()> {
    if len == 0 {
        return Err(LedgerError::validation("batch must contain at least one movement"));
    }
    if len > MAX_BATCH_SIZE {
        return Err(LedgerError::validation(format!(
            "batch contains {len} movements; at most {MAX_BATCH_SIZE} are allowed"
        )));
    }
    Ok(())
}

/// Plan a batch of movements as one atomic unit.
///
/// Returns [`LedgerError::BatchRejected`] listing every failing item if any
/// item fails; in that case nothing is to be written.
pub fn plan_batch(
    tenant_id: TenantId,
    refs: &ReferenceSnapshot,
    items: &[MovementRequest],
    actor: UserId,
    at: DateTime<Utc>,
) -> LedgerResult<LedgerCommit> {
    check_batch_size(items.len())?;

    let mut projection = Projection::default();
    let mut failures = Vec::new();
    let mut transactions = Vec::with_capacity(items.len());

    for (index, item) in items.iter().enumerate() {
        match projection.apply(tenant_id, refs, item) {
            Ok(part) => transactions.push(Transaction::record(tenant_id, part, item, actor, at)),
            Err(failure) => failures.push(BatchItemFailure { index, failure }),
        }
    }

    if !failures.is_empty() {
        return Err(LedgerError::BatchRejected(failures));
    }

    Ok(LedgerCommit {
        part_writes: projection.into_writes(),
        transactions,
    })
}
