//! Transaction history queries.
//!
//! Read-only, tenant-scoped and paginated by default.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use depot_inventory::{EquipmentId, MovementKind, PartId, RepairId, Transaction};

/// Pagination parameters for history queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    /// Maximum number of transactions to return.
    pub limit: u32,
    /// Offset for pagination (0-based).
    pub offset: u32,
}

impl Pagination {
    pub const DEFAULT_LIMIT: u32 = 50;
    pub const MAX_LIMIT: u32 = 500;

    pub fn new(limit: Option<u32>, offset: Option<u32>) -> Self {
        Self {
            limit: limit.unwrap_or(Self::DEFAULT_LIMIT).clamp(1, Self::MAX_LIMIT),
            offset: offset.unwrap_or(0),
        }
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self::new(None, None)
    }
}

/// Which side of the cancellation state machine to return.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusFilter {
    #[default]
    All,
    Active,
    Cancelled,
}

/// Filter criteria for history queries. Every field narrows the result.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionFilter {
    pub kind: Option<MovementKind>,
    pub part_id: Option<PartId>,
    pub equipment_id: Option<EquipmentId>,
    pub repair_id: Option<RepairId>,
    /// Inclusive lower bound on `created_at`.
    pub created_from: Option<DateTime<Utc>>,
    /// Inclusive upper bound on `created_at`.
    pub created_to: Option<DateTime<Utc>>,
    pub status: StatusFilter,
}

impl TransactionFilter {
    pub fn matches(&self, txn: &Transaction) -> bool {
        self.kind.is_none_or(|k| txn.kind == k)
            && self.part_id.is_none_or(|p| txn.part_id == p)
            && self.equipment_id.is_none_or(|e| txn.equipment_id == Some(e))
            && self.repair_id.is_none_or(|r| txn.repair_id == Some(r))
            && self.created_from.is_none_or(|from| txn.created_at >= from)
            && self.created_to.is_none_or(|to| txn.created_at <= to)
            && match self.status {
                StatusFilter::All => true,
                StatusFilter::Active => !txn.is_cancelled(),
                StatusFilter::Cancelled => txn.is_cancelled(),
            }
    }
}

/// Paginated history result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionPage {
    pub items: Vec<Transaction>,
    /// Number of transactions matching the filter (across all pages).
    pub total: u64,
    pub pagination: Pagination,
    pub has_more: bool,
}
