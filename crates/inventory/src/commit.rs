//! Descriptions of atomic units produced by the planners.
//!
//! Planners never touch storage. They read a [`ReferenceSnapshot`] loaded by the
//! caller and return what must be written; infrastructure applies the result
//! all-or-nothing, guarding each part write with its expected version.

use std::collections::{HashMap, HashSet};

use depot_core::ExpectedVersion;

use crate::ids::{EquipmentId, PartId, RepairId, TransactionId};
use crate::movement::{Cancellation, MovementRequest, Transaction};
use crate::part::Part;

/// New counter value for one part, valid only if the part is still at
/// `expected_version` when the unit commits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartWrite {
    pub part_id: PartId,
    pub expected_version: ExpectedVersion,
    pub new_quantity: u64,
}

/// One atomic unit of movement recording (single movement or whole batch).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerCommit {
    /// One write per distinct part, carrying its final quantity.
    pub part_writes: Vec<PartWrite>,
    /// Transactions to insert, in request order.
    pub transactions: Vec<Transaction>,
}

/// One atomic unit of reversal: counter correction + cancellation marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CancellationCommit {
    pub transaction_id: TransactionId,
    pub part_write: PartWrite,
    pub cancellation: Cancellation,
}

/// Distinct ids referenced by a list of movement requests, in first-seen order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct References {
    pub parts: Vec<PartId>,
    pub equipment: Vec<EquipmentId>,
    pub repairs: Vec<RepairId>,
}

impl References {
    pub fn of(items: &[MovementRequest]) -> Self {
        let mut refs = References::default();
        for item in items {
            if !refs.parts.contains(&item.part_id) {
                refs.parts.push(item.part_id);
            }
            if let Some(eq) = item.equipment_id {
                if !refs.equipment.contains(&eq) {
                    refs.equipment.push(eq);
                }
            }
            if let Some(rep) = item.repair_id {
                if !refs.repairs.contains(&rep) {
                    refs.repairs.push(rep);
                }
            }
        }
        refs
    }
}

/// Tenant-scoped state read once before planning.
///
/// Contains only the parts/equipment/repairs that resolved for the tenant;
/// anything absent is reported as not found by the planners.
#[derive(Debug, Clone, Default)]
pub struct ReferenceSnapshot {
    parts: HashMap<PartId, Part>,
    equipment: HashSet<EquipmentId>,
    repairs: HashSet<RepairId>,
}

impl ReferenceSnapshot {
    pub fn new(
        parts: impl IntoIterator<Item = Part>,
        equipment: impl IntoIterator<Item = EquipmentId>,
        repairs: impl IntoIterator<Item = RepairId>,
    ) -> Self {
        Self {
            parts: parts.into_iter().map(|p| (p.id, p)).collect(),
            equipment: equipment.into_iter().collect(),
            repairs: repairs.into_iter().collect(),
        }
    }

    pub fn part(&self, id: &PartId) -> Option<&Part> {
        self.parts.get(id)
    }

    pub fn has_equipment(&self, id: &EquipmentId) -> bool {
        self.equipment.contains(id)
    }

    pub fn has_repair(&self, id: &RepairId) -> bool {
        self.repairs.contains(id)
    }
}
