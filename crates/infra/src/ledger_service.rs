//! Ledger command pipeline.
//!
//! Composes the pure planners from `depot_inventory` with a [`LedgerStore`]:
//!
//! ```text
//! request
//!   ↓
//! 1. Shape checks (batch size, reason) before any lookup
//!   ↓
//! 2. Load tenant-scoped references (parts with versions, equipment, repairs)
//!   ↓
//! 3. Plan (guard, sequential projection, reversal clamp)
//!   ↓
//! 4. Commit atomically; part writes are compare-and-swap on version
//!   ↓
//! 5. On Conflict, reload and re-plan (bounded attempts)
//! ```
//!
//! A re-plan sees the winner's write, so a movement that was admissible on
//! stale state may come back as a business rejection on the next attempt.

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, error, instrument, warn};

use depot_core::{TenantId, UserId};
use depot_inventory::{
    LedgerCommit, LedgerError, LedgerResult, MovementRequest, NotFoundKind, Part, PartId, ReferenceSnapshot,
    References, Transaction, TransactionId, check_batch_size, plan_batch, plan_movement, plan_reversal,
};

use crate::ledger_store::{LedgerStore, Pagination, StoreError, TransactionFilter, TransactionPage};

pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Result of a committed cancellation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CancellationReceipt {
    pub transaction: Transaction,
    /// Part counter after the reversal.
    pub part_quantity: u64,
    /// Deficit absorbed by clamping the counter at zero.
    pub drift: Option<u64>,
}

/// Counter versus ledger comparison for one part.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reconciliation {
    pub part_id: PartId,
    pub part_name: String,
    pub counter: u64,
    /// Signed sum of non-cancelled movements.
    pub ledger_sum: i128,
    /// `counter - ledger_sum`. Non-zero after clamped reversals or quantity
    /// set outside the ledger (including the opening quantity).
    pub drift: i128,
}

impl Reconciliation {
    pub fn consistent(&self) -> bool {
        self.drift == 0
    }
}

/// Ledger application service.
#[derive(Debug, Clone)]
pub struct LedgerService<S> {
    store: S,
    max_attempts: u32,
}

impl<S> LedgerService<S>
where
    S: LedgerStore,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    /// Bound on plan/commit attempts per operation (at least one).
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Record one arrival or expense.
    #[instrument(
        skip(self, request),
        fields(tenant_id = %tenant_id, part_id = %request.part_id, kind = %request.kind, quantity = request.quantity)
    )]
    pub async fn record_movement(
        &self,
        tenant_id: TenantId,
        request: MovementRequest,
        actor: UserId,
    ) -> LedgerResult<Transaction> {
        request.validate()?;
        let items = std::slice::from_ref(&request);

        let mut committed = self
            .commit_with_retry(tenant_id, items, |refs| {
                plan_movement(tenant_id, refs, &request, actor, Utc::now())
            })
            .await?;
        committed
            .pop()
            .ok_or_else(|| LedgerError::Store("commit returned no transaction".to_string()))
    }

    /// Record an ordered batch as one all-or-nothing unit.
    #[instrument(skip(self, items), fields(tenant_id = %tenant_id, items = items.len()))]
    pub async fn record_batch(
        &self,
        tenant_id: TenantId,
        items: Vec<MovementRequest>,
        actor: UserId,
    ) -> LedgerResult<Vec<Transaction>> {
        check_batch_size(items.len()).inspect_err(|e| debug!(error = %e, "batch rejected before lookup"))?;

        self.commit_with_retry(tenant_id, &items, |refs| {
            plan_batch(tenant_id, refs, &items, actor, Utc::now())
        })
        .await
    }

    /// Cancel a recorded movement, reverting its counter effect.
    #[instrument(skip(self, reason), fields(tenant_id = %tenant_id, transaction_id = %transaction_id))]
    pub async fn cancel_movement(
        &self,
        tenant_id: TenantId,
        transaction_id: TransactionId,
        reason: &str,
        actor: UserId,
    ) -> LedgerResult<CancellationReceipt> {
        if reason.trim().is_empty() {
            return Err(LedgerError::validation("cancellation reason cannot be empty"));
        }

        let mut attempt = 0;
        loop {
            attempt += 1;

            let transaction = self
                .store
                .load_transaction(tenant_id, transaction_id)
                .await
                .map_err(|e| self.store_failure(e))?
                .ok_or(LedgerError::NotFound(NotFoundKind::Transaction))?;
            if transaction.is_cancelled() {
                return Err(LedgerError::AlreadyCancelled);
            }
            let part = self
                .store
                .load_parts(tenant_id, &[transaction.part_id])
                .await
                .map_err(|e| self.store_failure(e))?
                .into_iter()
                .next()
                .ok_or(LedgerError::NotFound(NotFoundKind::Part))?;

            let (commit, outcome) = plan_reversal(tenant_id, &transaction, &part, reason, actor, Utc::now())?;

            match self.store.commit_cancellation(tenant_id, &commit).await {
                Ok(()) => {
                    if let Some(drift) = outcome.drift {
                        warn!(
                            part_id = %part.id,
                            previous_quantity = outcome.previous_quantity,
                            drift,
                            "reversal clamped part quantity at zero; counter no longer matches ledger"
                        );
                    }
                    let mut transaction = transaction;
                    transaction.cancellation = Some(commit.cancellation);
                    return Ok(CancellationReceipt {
                        transaction,
                        part_quantity: outcome.reverted_quantity,
                        drift: outcome.drift,
                    });
                }
                Err(StoreError::Conflict(msg)) if attempt < self.max_attempts => {
                    debug!(attempt, %msg, "cancellation lost a version race; retrying");
                }
                Err(err) => return Err(self.store_failure(err)),
            }
        }
    }

    pub async fn get_transaction(
        &self,
        tenant_id: TenantId,
        transaction_id: TransactionId,
    ) -> LedgerResult<Transaction> {
        self.store
            .load_transaction(tenant_id, transaction_id)
            .await
            .map_err(|e| self.store_failure(e))?
            .ok_or(LedgerError::NotFound(NotFoundKind::Transaction))
    }

    pub async fn list_transactions(
        &self,
        tenant_id: TenantId,
        filter: &TransactionFilter,
        pagination: Pagination,
    ) -> LedgerResult<TransactionPage> {
        self.store
            .query_transactions(tenant_id, filter, pagination)
            .await
            .map_err(|e| self.store_failure(e))
    }

    /// Compare a part's counter with the sum of its active movements.
    #[instrument(skip(self), fields(tenant_id = %tenant_id, part_id = %part_id))]
    pub async fn reconcile(&self, tenant_id: TenantId, part_id: PartId) -> LedgerResult<Reconciliation> {
        let part = self.get_part(tenant_id, part_id).await?;
        let ledger_sum = self
            .store
            .ledger_sum(tenant_id, part_id)
            .await
            .map_err(|e| self.store_failure(e))?;

        Ok(Reconciliation {
            part_id,
            part_name: part.name,
            counter: part.quantity,
            ledger_sum,
            drift: part.quantity as i128 - ledger_sum,
        })
    }

    pub async fn register_part(&self, part: Part) -> LedgerResult<Part> {
        self.store
            .insert_part(&part)
            .await
            .map_err(|e| self.store_failure(e))?;
        Ok(part)
    }

    pub async fn get_part(&self, tenant_id: TenantId, part_id: PartId) -> LedgerResult<Part> {
        self.store
            .load_parts(tenant_id, &[part_id])
            .await
            .map_err(|e| self.store_failure(e))?
            .into_iter()
            .next()
            .ok_or(LedgerError::NotFound(NotFoundKind::Part))
    }

    pub async fn list_parts(&self, tenant_id: TenantId) -> LedgerResult<Vec<Part>> {
        self.store
            .list_parts(tenant_id)
            .await
            .map_err(|e| self.store_failure(e))
    }

    pub async fn register_equipment(
        &self,
        tenant_id: TenantId,
        id: depot_inventory::EquipmentId,
    ) -> LedgerResult<()> {
        self.store
            .insert_equipment(tenant_id, id)
            .await
            .map_err(|e| self.store_failure(e))
    }

    pub async fn register_repair(&self, tenant_id: TenantId, id: depot_inventory::RepairId) -> LedgerResult<()> {
        self.store
            .insert_repair(tenant_id, id)
            .await
            .map_err(|e| self.store_failure(e))
    }

    async fn load_references(&self, tenant_id: TenantId, items: &[MovementRequest]) -> Result<ReferenceSnapshot, StoreError> {
        let refs = References::of(items);
        let parts = self.store.load_parts(tenant_id, &refs.parts).await?;
        let equipment = self.store.existing_equipment(tenant_id, &refs.equipment).await?;
        let repairs = self.store.existing_repairs(tenant_id, &refs.repairs).await?;
        Ok(ReferenceSnapshot::new(parts, equipment, repairs))
    }

    async fn commit_with_retry<F>(
        &self,
        tenant_id: TenantId,
        items: &[MovementRequest],
        plan: F,
    ) -> LedgerResult<Vec<Transaction>>
    where
        F: Fn(&ReferenceSnapshot) -> LedgerResult<LedgerCommit>,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;

            let refs = self
                .load_references(tenant_id, items)
                .await
                .map_err(|e| self.store_failure(e))?;
            let commit = plan(&refs).inspect_err(|e| debug!(code = e.code(), error = %e, "movement rejected"))?;

            match self.store.commit_movements(tenant_id, &commit).await {
                Ok(()) => {
                    debug!(attempt, transactions = commit.transactions.len(), "movements committed");
                    return Ok(commit.transactions);
                }
                Err(StoreError::Conflict(msg)) if attempt < self.max_attempts => {
                    debug!(attempt, %msg, "commit lost a version race; retrying");
                }
                Err(err) => return Err(self.store_failure(err)),
            }
        }
    }

    fn store_failure(&self, err: StoreError) -> LedgerError {
        match &err {
            StoreError::Backend(msg) => error!(%msg, "ledger store failure"),
            StoreError::Conflict(msg) => warn!(%msg, attempts = self.max_attempts, "ledger retries exhausted"),
            _ => {}
        }
        err.into()
    }
}
