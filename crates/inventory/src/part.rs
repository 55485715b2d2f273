use serde::{Deserialize, Serialize};

use depot_core::{AggregateRoot, DomainError, DomainResult, TenantId};

use crate::ids::PartId;

/// A spare part owned by a company, with its materialized stock counter.
///
/// `quantity` is authoritative and only moves through the ledger (or an
/// administrative edit outside it). `version` is bumped by the store on every
/// committed quantity write and acts as the optimistic-concurrency token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Part {
    pub id: PartId,
    pub tenant_id: TenantId,
    pub name: String,
    pub quantity: u64,
    /// Unit price in minor currency units.
    pub unit_price: Option<i64>,
    pub version: u64,
}

impl Part {
    /// Register a new part with an initial quantity set outside the ledger.
    pub fn register(
        tenant_id: TenantId,
        id: PartId,
        name: impl Into<String>,
        unit_price: Option<i64>,
        initial_quantity: u64,
    ) -> DomainResult<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(DomainError::validation("part name cannot be empty"));
        }
        if matches!(unit_price, Some(p) if p < 0) {
            return Err(DomainError::validation("unit price cannot be negative"));
        }
        if initial_quantity > crate::movement::MAX_QUANTITY {
            return Err(DomainError::validation("initial quantity is out of range"));
        }
        Ok(Self {
            id,
            tenant_id,
            name: name.trim().to_string(),
            quantity: initial_quantity,
            unit_price,
            version: 0,
        })
    }
}

impl AggregateRoot for Part {
    type Id = PartId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}
