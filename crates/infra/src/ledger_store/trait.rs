use std::sync::Arc;

use thiserror::Error;

use depot_core::TenantId;
use depot_inventory::{
    CancellationCommit, EquipmentId, LedgerCommit, LedgerError, NotFoundKind, Part, PartId, RepairId,
    Transaction, TransactionId,
};

use super::query::{Pagination, TransactionFilter, TransactionPage};

/// Ledger store operation error.
///
/// These are **infrastructure outcomes** (stale versions, lost races, backend
/// failures) as opposed to the business rejections the planners produce.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// A part was no longer at the expected version; nothing was written.
    #[error("optimistic concurrency check failed: {0}")]
    Conflict(String),

    /// The transaction was cancelled by a concurrent request; nothing was written.
    #[error("transaction already cancelled")]
    AlreadyCancelled,

    #[error("{0} not found")]
    NotFound(NotFoundKind),

    #[error("duplicate record: {0}")]
    Duplicate(String),

    #[error("store backend failure: {0}")]
    Backend(String),
}

impl From<StoreError> for LedgerError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::Conflict(msg) | StoreError::Duplicate(msg) => LedgerError::Conflict(msg),
            StoreError::AlreadyCancelled => LedgerError::AlreadyCancelled,
            StoreError::NotFound(kind) => LedgerError::NotFound(kind),
            StoreError::Backend(msg) => LedgerError::Store(msg),
        }
    }
}

/// Row-level access to the collaborators the ledger reads (parts, equipment,
/// repairs), plus the minimal registration calls used by dev tooling and tests.
///
/// All reads are tenant-scoped: an id that exists under another tenant is
/// simply absent from the result.
#[async_trait::async_trait]
pub trait PartCatalog: Send + Sync {
    /// Load the given parts; missing ids are omitted.
    async fn load_parts(&self, tenant_id: TenantId, ids: &[PartId]) -> Result<Vec<Part>, StoreError>;

    async fn list_parts(&self, tenant_id: TenantId) -> Result<Vec<Part>, StoreError>;

    /// Subset of `ids` that exist for the tenant.
    async fn existing_equipment(
        &self,
        tenant_id: TenantId,
        ids: &[EquipmentId],
    ) -> Result<Vec<EquipmentId>, StoreError>;

    /// Subset of `ids` that exist for the tenant.
    async fn existing_repairs(&self, tenant_id: TenantId, ids: &[RepairId]) -> Result<Vec<RepairId>, StoreError>;

    async fn insert_part(&self, part: &Part) -> Result<(), StoreError>;

    async fn insert_equipment(&self, tenant_id: TenantId, id: EquipmentId) -> Result<(), StoreError>;

    async fn insert_repair(&self, tenant_id: TenantId, id: RepairId) -> Result<(), StoreError>;
}

/// Tenant-scoped ledger persistence.
///
/// ## Atomic units
///
/// `commit_movements` and `commit_cancellation` each apply their whole commit
/// or nothing. Every part write is compared against its expected version and
/// bumps the version on success; a mismatch aborts the unit with
/// [`StoreError::Conflict`] so the caller can re-plan from fresh state.
///
/// `commit_cancellation` sets the cancellation triple only on a transaction that
/// is not cancelled yet, which makes the reversal effect apply exactly once.
#[async_trait::async_trait]
pub trait LedgerStore: PartCatalog {
    async fn commit_movements(&self, tenant_id: TenantId, commit: &LedgerCommit) -> Result<(), StoreError>;

    async fn commit_cancellation(
        &self,
        tenant_id: TenantId,
        commit: &CancellationCommit,
    ) -> Result<(), StoreError>;

    async fn load_transaction(
        &self,
        tenant_id: TenantId,
        id: TransactionId,
    ) -> Result<Option<Transaction>, StoreError>;

    /// Filtered history, newest first.
    async fn query_transactions(
        &self,
        tenant_id: TenantId,
        filter: &TransactionFilter,
        pagination: Pagination,
    ) -> Result<TransactionPage, StoreError>;

    /// Signed sum of the part's non-cancelled movements.
    async fn ledger_sum(&self, tenant_id: TenantId, part_id: PartId) -> Result<i128, StoreError>;
}

#[async_trait::async_trait]
impl<S> PartCatalog for Arc<S>
where
    S: PartCatalog + ?Sized,
{
    async fn load_parts(&self, tenant_id: TenantId, ids: &[PartId]) -> Result<Vec<Part>, StoreError> {
        (**self).load_parts(tenant_id, ids).await
    }

    async fn list_parts(&self, tenant_id: TenantId) -> Result<Vec<Part>, StoreError> {
        (**self).list_parts(tenant_id).await
    }

    async fn existing_equipment(
        &self,
        tenant_id: TenantId,
        ids: &[EquipmentId],
    ) -> Result<Vec<EquipmentId>, StoreError> {
        (**self).existing_equipment(tenant_id, ids).await
    }

    async fn existing_repairs(&self, tenant_id: TenantId, ids: &[RepairId]) -> Result<Vec<RepairId>, StoreError> {
        (**self).existing_repairs(tenant_id, ids).await
    }

    async fn insert_part(&self, part: &Part) -> Result<(), StoreError> {
        (**self).insert_part(part).await
    }

    async fn insert_equipment(&self, tenant_id: TenantId, id: EquipmentId) -> Result<(), StoreError> {
        (**self).insert_equipment(tenant_id, id).await
    }

    async fn insert_repair(&self, tenant_id: TenantId, id: RepairId) -> Result<(), StoreError> {
        (**self).insert_repair(tenant_id, id).await
    }
}

#[async_trait::async_trait]
impl<S> LedgerStore for Arc<S>
where
    S: LedgerStore + ?Sized,
{
    async fn commit_movements(&self, tenant_id: TenantId, commit: &LedgerCommit) -> Result<(), StoreError> {
        (**self).commit_movements(tenant_id, commit).await
    }

    async fn commit_cancellation(
        &self,
        tenant_id: TenantId,
        commit: &CancellationCommit,
    ) -> Result<(), StoreError> {
        (**self).commit_cancellation(tenant_id, commit).await
    }

    async fn load_transaction(
        &self,
        tenant_id: TenantId,
        id: TransactionId,
    ) -> Result<Option<Transaction>, StoreError> {
        (**self).load_transaction(tenant_id, id).await
    }

    async fn query_transactions(
        &self,
        tenant_id: TenantId,
        filter: &TransactionFilter,
        pagination: Pagination,
    ) -> Result<TransactionPage, StoreError> {
        (**self).query_transactions(tenant_id, filter, pagination).await
    }

    async fn ledger_sum(&self, tenant_id: TenantId, part_id: PartId) -> Result<i128, StoreError> {
        (**self).ledger_sum(tenant_id, part_id).await
    }
}
