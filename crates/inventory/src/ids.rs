//! Identifiers of ledger entities and the collaborators they reference.

use depot_core::uuid_newtype;

uuid_newtype!(
    /// Identifier of a spare part (tenant-scoped via the part's `tenant_id`).
    pub struct PartId,
    "PartId"
);

uuid_newtype!(
    /// Identifier of a ledger movement.
    pub struct TransactionId,
    "TransactionId"
);

uuid_newtype!(
    /// Identifier of a piece of equipment a movement may be booked against.
    pub struct EquipmentId,
    "EquipmentId"
);

uuid_newtype!(
    /// Identifier of a repair a movement may be booked against.
    pub struct RepairId,
    "RepairId"
);
