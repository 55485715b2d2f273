use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use depot_core::TenantId;
use depot_inventory::{
    CancellationCommit, EquipmentId, LedgerCommit, NotFoundKind, Part, PartId, PartWrite, RepairId,
    Transaction, TransactionId,
};

use super::query::{Pagination, TransactionFilter, TransactionPage};
use super::r#trait::{LedgerStore, PartCatalog, StoreError};

#[derive(Debug, Default)]
struct State {
    parts: HashMap<(TenantId, PartId), Part>,
    transactions: HashMap<TransactionId, Transaction>,
    equipment: HashSet<(TenantId, EquipmentId)>,
    repairs: HashSet<(TenantId, RepairId)>,
}

impl State {
    /// Verify every write against the current part version without mutating.
    fn check_write(&self, tenant_id: TenantId, write: &PartWrite) -> Result<(), StoreError> {
        let part = self
            .parts
            .get(&(tenant_id, write.part_id))
            .ok_or(StoreError::NotFound(NotFoundKind::Part))?;
        if !write.expected_version.matches(part.version) {
            return Err(StoreError::Conflict(format!(
                "part {} expected {}, found v{}",
                write.part_id, write.expected_version, part.version
            )));
        }
        Ok(())
    }

    fn apply_write(&mut self, tenant_id: TenantId, write: &PartWrite) {
        if let Some(part) = self.parts.get_mut(&(tenant_id, write.part_id)) {
            part.quantity = write.new_quantity;
            part.version += 1;
        }
    }
}

/// In-memory ledger store.
///
/// Intended for tests/dev. A single write lock covers each commit, so
/// version checks and writes happen as one step.
#[derive(Debug, Default)]
pub struct InMemoryLedgerStore {
    state: RwLock<State>,
}

impl InMemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, State>, StoreError> {
        self.state
            .read()
            .map_err(|_| StoreError::Backend("lock poisoned".to_string()))
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, State>, StoreError> {
        self.state
            .write()
            .map_err(|_| StoreError::Backend("lock poisoned".to_string()))
    }
}

#[async_trait::async_trait]
impl PartCatalog for InMemoryLedgerStore {
    async fn load_parts(&self, tenant_id: TenantId, ids: &[PartId]) -> Result<Vec<Part>, StoreError> {
        let state = self.read()?;
        Ok(ids
            .iter()
            .filter_map(|id| state.parts.get(&(tenant_id, *id)).cloned())
            .collect())
    }

    async fn list_parts(&self, tenant_id: TenantId) -> Result<Vec<Part>, StoreError> {
        let state = self.read()?;
        let mut parts: Vec<Part> = state
            .parts
            .values()
            .filter(|p| p.tenant_id == tenant_id)
            .cloned()
            .collect();
        parts.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(parts)
    }

    async fn existing_equipment(
        &self,
        tenant_id: TenantId,
        ids: &[EquipmentId],
    ) -> Result<Vec<EquipmentId>, StoreError> {
        let state = self.read()?;
        Ok(ids
            .iter()
            .copied()
            .filter(|id| state.equipment.contains(&(tenant_id, *id)))
            .collect())
    }

    async fn existing_repairs(&self, tenant_id: TenantId, ids: &[RepairId]) -> Result<Vec<RepairId>, StoreError> {
        let state = self.read()?;
        Ok(ids
            .iter()
            .copied()
            .filter(|id| state.repairs.contains(&(tenant_id, *id)))
            .collect())
    }

    async fn insert_part(&self, part: &Part) -> Result<(), StoreError> {
        let mut state = self.write()?;
        let key = (part.tenant_id, part.id);
        if state.parts.contains_key(&key) {
            return Err(StoreError::Duplicate(format!("part {} already exists", part.id)));
        }
        state.parts.insert(key, part.clone());
        Ok(())
    }

    async fn insert_equipment(&self, tenant_id: TenantId, id: EquipmentId) -> Result<(), StoreError> {
        let mut state = self.write()?;
        if !state.equipment.insert((tenant_id, id)) {
            return Err(StoreError::Duplicate(format!("equipment {id} already exists")));
        }
        Ok(())
    }

    async fn insert_repair(&self, tenant_id: TenantId, id: RepairId) -> Result<(), StoreError> {
        let mut state = self.write()?;
        if !state.repairs.insert((tenant_id, id)) {
            return Err(StoreError::Duplicate(format!("repair {id} already exists")));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl LedgerStore for InMemoryLedgerStore {
    async fn commit_movements(&self, tenant_id: TenantId, commit: &LedgerCommit) -> Result<(), StoreError> {
        let mut state = self.write()?;

        for write in &commit.part_writes {
            state.check_write(tenant_id, write)?;
        }
        for txn in &commit.transactions {
            if txn.tenant_id != tenant_id {
                return Err(StoreError::Backend(format!(
                    "transaction {} belongs to another tenant",
                    txn.id
                )));
            }
            if state.transactions.contains_key(&txn.id) {
                return Err(StoreError::Duplicate(format!("transaction {} already exists", txn.id)));
            }
        }

        for write in &commit.part_writes {
            state.apply_write(tenant_id, write);
        }
        for txn in &commit.transactions {
            state.transactions.insert(txn.id, txn.clone());
        }
        Ok(())
    }

    async fn commit_cancellation(
        &self,
        tenant_id: TenantId,
        commit: &CancellationCommit,
    ) -> Result<(), StoreError> {
        let mut state = self.write()?;

        match state.transactions.get(&commit.transaction_id) {
            Some(txn) if txn.tenant_id == tenant_id => {
                if txn.is_cancelled() {
                    return Err(StoreError::AlreadyCancelled);
                }
            }
            _ => return Err(StoreError::NotFound(NotFoundKind::Transaction)),
        }
        state.check_write(tenant_id, &commit.part_write)?;

        state.apply_write(tenant_id, &commit.part_write);
        if let Some(txn) = state.transactions.get_mut(&commit.transaction_id) {
            txn.cancellation = Some(commit.cancellation.clone());
        }
        Ok(())
    }

    async fn load_transaction(
        &self,
        tenant_id: TenantId,
        id: TransactionId,
    ) -> Result<Option<Transaction>, StoreError> {
        let state = self.read()?;
        Ok(state
            .transactions
            .get(&id)
            .filter(|t| t.tenant_id == tenant_id)
            .cloned())
    }

    async fn query_transactions(
        &self,
        tenant_id: TenantId,
        filter: &TransactionFilter,
        pagination: Pagination,
    ) -> Result<TransactionPage, StoreError> {
        let state = self.read()?;
        let mut matching: Vec<&Transaction> = state
            .transactions
            .values()
            .filter(|t| t.tenant_id == tenant_id && filter.matches(t))
            .collect();
        // Newest first; v7 ids break ties in creation order.
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));

        let total = matching.len() as u64;
        let items: Vec<Transaction> = matching
            .into_iter()
            .skip(pagination.offset as usize)
            .take(pagination.limit as usize)
            .cloned()
            .collect();
        let has_more = (pagination.offset as u64) + (items.len() as u64) < total;

        Ok(TransactionPage {
            items,
            total,
            pagination,
            has_more,
        })
    }

    async fn ledger_sum(&self, tenant_id: TenantId, part_id: PartId) -> Result<i128, StoreError> {
        let state = self.read()?;
        Ok(state
            .transactions
            .values()
            .filter(|t| t.tenant_id == tenant_id && t.part_id == part_id)
            .map(Transaction::effective_delta)
            .sum())
    }
}
