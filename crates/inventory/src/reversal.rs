//! Reversal (cancellation) of a recorded movement.
//!
//! Cancelling marks the original transaction in place and moves the part counter
//! as if the movement had never happened. The corrected counter is clamped at
//! zero; when the clamp bites the outcome carries the deficit as `drift`, which
//! means the counter no longer matches the ledger and must be surfaced.

use chrono::{DateTime, Utc};

use depot_core::{ExpectedVersion, TenantId, UserId};

use crate::commit::{CancellationCommit, PartWrite};
use crate::error::{LedgerError, LedgerResult, NotFoundKind};
use crate::movement::{Cancellation, Transaction, MAX_QUANTITY};
use crate::part::Part;

/// Counter effect of a reversal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReversalOutcome {
    pub previous_quantity: u64,
    pub reverted_quantity: u64,
    /// Amount the reverted counter would have gone below zero, if any.
    pub drift: Option<u64>,
}

impl ReversalOutcome {
    pub fn clamped(&self) -> bool {
        self.drift.is_some()
    }
}

/// Plan the cancellation of `transaction` given the part's current state.
pub fn plan_reversal(
    tenant_id: TenantId,
    transaction: &Transaction,
    part: &Part,
    reason: &str,
    actor: UserId,
    at: DateTime<Utc>,
) -> LedgerResult<(CancellationCommit, ReversalOutcome)> {
    if transaction.tenant_id != tenant_id {
        return Err(LedgerError::NotFound(NotFoundKind::Transaction));
    }
    if transaction.is_cancelled() {
        return Err(LedgerError::AlreadyCancelled);
    }
    let reason = reason.trim();
    if reason.is_empty() {
        return Err(LedgerError::validation("cancellation reason cannot be empty"));
    }
    if part.id != transaction.part_id || part.tenant_id != tenant_id {
        return Err(LedgerError::NotFound(NotFoundKind::Part));
    }

    let reverted = part.quantity as i128 - transaction.kind.signed(transaction.quantity);
    let (reverted_quantity, drift) = if reverted < 0 {
        (0, Some(reverted.unsigned_abs() as u64))
    } else if reverted > MAX_QUANTITY as i128 {
        return Err(LedgerError::validation("reverted quantity is out of range"));
    } else {
        (reverted as u64, None)
    };

    let commit = CancellationCommit {
        transaction_id: transaction.id,
        part_write: PartWrite {
            part_id: part.id,
            expected_version: ExpectedVersion(part.version),
            new_quantity: reverted_quantity,
        },
        cancellation: Cancellation {
            cancelled_at: at,
            cancelled_by: actor,
            reason: reason.to_string(),
        },
    };
    let outcome = ReversalOutcome {
        previous_quantity: part.quantity,
        reverted_quantity,
        drift,
    };
    Ok((commit, outcome))
}
