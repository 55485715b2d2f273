//! Postgres-backed ledger store.
//!
//! ## Atomicity
//!
//! Each commit runs in one database transaction. Part writes are applied in
//! `part_id` order with a conditional update on `version`, so two commits that
//! touch overlapping parts lock rows in the same order and the loser observes
//! zero affected rows instead of deadlocking.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | StoreError | Scenario |
//! |------------|----------------------|------------|----------|
//! | Database (unique violation) | `23505` | `Duplicate` | Id already present |
//! | Database (serialization failure) | `40001` | `Conflict` | Concurrent writer won |
//! | Database (deadlock detected) | `40P01` | `Conflict` | Concurrent writer won |
//! | Database (check constraint violation) | `23514` | `Backend` | Row would break a column check |
//! | Database (other) | Any other | `Backend` | Other database errors |
//! | PoolClosed / Other | N/A | `Backend` | Connection and network failures |

use std::sync::Arc;

use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool, Postgres, Row};
use tracing::{Span, instrument};

use depot_core::{TenantId, UserId};
use depot_inventory::{
    Cancellation, CancellationCommit, EquipmentId, LedgerCommit, MovementKind, NotFoundKind, Part, PartId,
    PartWrite, RepairId, Transaction, TransactionId,
};

use super::query::{Pagination, StatusFilter, TransactionFilter, TransactionPage};
use super::r#trait::{LedgerStore, PartCatalog, StoreError};

const SCHEMA: &str = include_str!("../../migrations/0001_ledger.sql");

/// Postgres-backed ledger store.
///
/// Every statement carries `tenant_id` in its WHERE clause; rows belonging to
/// another tenant are indistinguishable from missing rows.
#[derive(Debug, Clone)]
pub struct PostgresLedgerStore {
    pool: Arc<PgPool>,
}

impl PostgresLedgerStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool: Arc::new(pool) }
    }

    /// Connect and make sure the ledger tables exist.
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = PgPool::connect(database_url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        let store = Self::new(pool);
        store.ensure_schema().await?;
        Ok(store)
    }

    /// Apply the bundled schema. Idempotent.
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        sqlx::raw_sql(SCHEMA)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("ensure_schema", e))?;
        Ok(())
    }
}

async fn apply_part_write(
    tx: &mut sqlx::Transaction<'_, Postgres>,
    tenant_id: TenantId,
    write: &PartWrite,
) -> Result<(), StoreError> {
    let expected = to_i64(write.expected_version.get(), "expected_version")?;

    let result = sqlx::query(
        r#"
        UPDATE parts
        SET quantity = $3, version = version + 1, updated_at = NOW()
        WHERE tenant_id = $1
            AND part_id = $2
            AND version = $4
        "#,
    )
    .bind(tenant_id.as_uuid())
    .bind(write.part_id.as_uuid())
    .bind(to_i64(write.new_quantity, "quantity")?)
    .bind(expected)
    .execute(&mut **tx)
    .await
    .map_err(|e| map_sqlx_error("update_part_quantity", e))?;

    if result.rows_affected() == 0 {
        return Err(StoreError::Conflict(format!(
            "part {} changed or disappeared since it was read (expected {})",
            write.part_id, write.expected_version
        )));
    }
    Ok(())
}

async fn insert_transaction(
    tx: &mut sqlx::Transaction<'_, Postgres>,
    txn: &Transaction,
) -> Result<(), StoreError> {
    sqlx::query(
        r#"
        INSERT INTO inventory_transactions (
            transaction_id,
            tenant_id,
            kind,
            part_id,
            part_name,
            quantity,
            description,
            equipment_id,
            repair_id,
            created_by,
            created_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        "#,
    )
    .bind(txn.id.as_uuid())
    .bind(txn.tenant_id.as_uuid())
    .bind(txn.kind.as_str())
    .bind(txn.part_id.as_uuid())
    .bind(&txn.part_name)
    .bind(to_i64(txn.quantity, "quantity")?)
    .bind(&txn.description)
    .bind(txn.equipment_id.map(|id| *id.as_uuid()))
    .bind(txn.repair_id.map(|id| *id.as_uuid()))
    .bind(txn.created_by.as_uuid())
    .bind(txn.created_at)
    .execute(&mut **tx)
    .await
    .map_err(|e| map_sqlx_error("insert_transaction", e))?;
    Ok(())
}

async fn rollback(tx: sqlx::Transaction<'_, Postgres>, err: StoreError) -> StoreError {
    match tx.rollback().await {
        Ok(()) => err,
        Err(e) => map_sqlx_error("rollback", e),
    }
}

#[async_trait::async_trait]
impl PartCatalog for PostgresLedgerStore {
    #[instrument(
        skip(self, ids),
        fields(tenant_id = %tenant_id, requested = ids.len(), found = tracing::field::Empty)
    )]
    async fn load_parts(&self, tenant_id: TenantId, ids: &[PartId]) -> Result<Vec<Part>, StoreError> {
        let uuids: Vec<uuid::Uuid> = ids.iter().map(|id| *id.as_uuid()).collect();
        let rows = sqlx::query(
            r#"
            SELECT tenant_id, part_id, name, quantity, unit_price, version
            FROM parts
            WHERE tenant_id = $1 AND part_id = ANY($2)
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(&uuids)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("load_parts", e))?;

        let parts = rows
            .iter()
            .map(|row| PartRow::from_row(row).map(Part::from))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| StoreError::Backend(format!("failed to decode part row: {e}")))?;
        Span::current().record("found", parts.len());
        Ok(parts)
    }

    async fn list_parts(&self, tenant_id: TenantId) -> Result<Vec<Part>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT tenant_id, part_id, name, quantity, unit_price, version
            FROM parts
            WHERE tenant_id = $1
            ORDER BY name ASC, part_id ASC
            "#,
        )
        .bind(tenant_id.as_uuid())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_parts", e))?;

        rows.iter()
            .map(|row| PartRow::from_row(row).map(Part::from))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| StoreError::Backend(format!("failed to decode part row: {e}")))
    }

    async fn existing_equipment(
        &self,
        tenant_id: TenantId,
        ids: &[EquipmentId],
    ) -> Result<Vec<EquipmentId>, StoreError> {
        if ids.is_empty() {
            return Ok(vec![]);
        }
        let uuids: Vec<uuid::Uuid> = ids.iter().map(|id| *id.as_uuid()).collect();
        let found: Vec<uuid::Uuid> = sqlx::query_scalar(
            "SELECT equipment_id FROM equipment WHERE tenant_id = $1 AND equipment_id = ANY($2)",
        )
        .bind(tenant_id.as_uuid())
        .bind(&uuids)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("existing_equipment", e))?;
        Ok(found.into_iter().map(EquipmentId::from_uuid).collect())
    }

    async fn existing_repairs(&self, tenant_id: TenantId, ids: &[RepairId]) -> Result<Vec<RepairId>, StoreError> {
        if ids.is_empty() {
            return Ok(vec![]);
        }
        let uuids: Vec<uuid::Uuid> = ids.iter().map(|id| *id.as_uuid()).collect();
        let found: Vec<uuid::Uuid> =
            sqlx::query_scalar("SELECT repair_id FROM repairs WHERE tenant_id = $1 AND repair_id = ANY($2)")
                .bind(tenant_id.as_uuid())
                .bind(&uuids)
                .fetch_all(&*self.pool)
                .await
                .map_err(|e| map_sqlx_error("existing_repairs", e))?;
        Ok(found.into_iter().map(RepairId::from_uuid).collect())
    }

    #[instrument(skip(self, part), fields(tenant_id = %part.tenant_id, part_id = %part.id))]
    async fn insert_part(&self, part: &Part) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO parts (tenant_id, part_id, name, quantity, unit_price, version)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(part.tenant_id.as_uuid())
        .bind(part.id.as_uuid())
        .bind(&part.name)
        .bind(to_i64(part.quantity, "quantity")?)
        .bind(part.unit_price)
        .bind(to_i64(part.version, "version")?)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_part", e))?;
        Ok(())
    }

    async fn insert_equipment(&self, tenant_id: TenantId, id: EquipmentId) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO equipment (tenant_id, equipment_id) VALUES ($1, $2)")
            .bind(tenant_id.as_uuid())
            .bind(id.as_uuid())
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("insert_equipment", e))?;
        Ok(())
    }

    async fn insert_repair(&self, tenant_id: TenantId, id: RepairId) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO repairs (tenant_id, repair_id) VALUES ($1, $2)")
            .bind(tenant_id.as_uuid())
            .bind(id.as_uuid())
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("insert_repair", e))?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl LedgerStore for PostgresLedgerStore {
    #[instrument(
        skip(self, commit),
        fields(
            tenant_id = %tenant_id,
            part_writes = commit.part_writes.len(),
            transactions = commit.transactions.len()
        )
    )]
    async fn commit_movements(&self, tenant_id: TenantId, commit: &LedgerCommit) -> Result<(), StoreError> {
        let mut writes = commit.part_writes.clone();
        writes.sort_by_key(|w| w.part_id);

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        for write in &writes {
            if let Err(err) = apply_part_write(&mut tx, tenant_id, write).await {
                return Err(rollback(tx, err).await);
            }
        }
        for txn in &commit.transactions {
            if txn.tenant_id != tenant_id {
                let err = StoreError::Backend(format!("transaction {} belongs to another tenant", txn.id));
                return Err(rollback(tx, err).await);
            }
            if let Err(err) = insert_transaction(&mut tx, txn).await {
                return Err(rollback(tx, err).await);
            }
        }

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;
        Ok(())
    }

    #[instrument(
        skip(self, commit),
        fields(tenant_id = %tenant_id, transaction_id = %commit.transaction_id)
    )]
    async fn commit_cancellation(
        &self,
        tenant_id: TenantId,
        commit: &CancellationCommit,
    ) -> Result<(), StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        let marked = sqlx::query(
            r#"
            UPDATE inventory_transactions
            SET cancelled_at = $3, cancelled_by = $4, cancellation_reason = $5
            WHERE tenant_id = $1 AND transaction_id = $2 AND cancelled_at IS NULL
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(commit.transaction_id.as_uuid())
        .bind(commit.cancellation.cancelled_at)
        .bind(commit.cancellation.cancelled_by.as_uuid())
        .bind(&commit.cancellation.reason)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("mark_cancelled", e))?;

        if marked.rows_affected() == 0 {
            let exists: Option<bool> = sqlx::query_scalar(
                "SELECT cancelled_at IS NOT NULL FROM inventory_transactions WHERE tenant_id = $1 AND transaction_id = $2",
            )
            .bind(tenant_id.as_uuid())
            .bind(commit.transaction_id.as_uuid())
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("check_cancelled", e))?;
            let err = match exists {
                Some(true) => StoreError::AlreadyCancelled,
                _ => StoreError::NotFound(NotFoundKind::Transaction),
            };
            return Err(rollback(tx, err).await);
        }

        if let Err(err) = apply_part_write(&mut tx, tenant_id, &commit.part_write).await {
            return Err(rollback(tx, err).await);
        }

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;
        Ok(())
    }

    async fn load_transaction(
        &self,
        tenant_id: TenantId,
        id: TransactionId,
    ) -> Result<Option<Transaction>, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM inventory_transactions WHERE tenant_id = $1 AND transaction_id = $2"
        ))
        .bind(tenant_id.as_uuid())
        .bind(id.as_uuid())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("load_transaction", e))?;

        row.map(|row| decode_transaction(&row)).transpose()
    }

    #[instrument(
        skip(self, filter),
        fields(
            tenant_id = %tenant_id,
            limit = pagination.limit,
            offset = pagination.offset,
            returned = tracing::field::Empty
        )
    )]
    async fn query_transactions(
        &self,
        tenant_id: TenantId,
        filter: &TransactionFilter,
        pagination: Pagination,
    ) -> Result<TransactionPage, StoreError> {
        // Optional filters collapse to TRUE when their parameter is NULL.
        const WHERE_CLAUSE: &str = r#"
            WHERE tenant_id = $1
                AND ($2::text IS NULL OR kind = $2)
                AND ($3::uuid IS NULL OR part_id = $3)
                AND ($4::uuid IS NULL OR equipment_id = $4)
                AND ($5::uuid IS NULL OR repair_id = $5)
                AND ($6::timestamptz IS NULL OR created_at >= $6)
                AND ($7::timestamptz IS NULL OR created_at <= $7)
                AND ($8::text = 'all'
                    OR ($8 = 'active' AND cancelled_at IS NULL)
                    OR ($8 = 'cancelled' AND cancelled_at IS NOT NULL))
        "#;

        let status = match filter.status {
            StatusFilter::All => "all",
            StatusFilter::Active => "active",
            StatusFilter::Cancelled => "cancelled",
        };
        let kind = filter.kind.map(MovementKind::as_str);
        let part_id = filter.part_id.map(|id| *id.as_uuid());
        let equipment_id = filter.equipment_id.map(|id| *id.as_uuid());
        let repair_id = filter.repair_id.map(|id| *id.as_uuid());

        let total: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(*) FROM inventory_transactions {WHERE_CLAUSE}"
        ))
        .bind(tenant_id.as_uuid())
        .bind(kind)
        .bind(part_id)
        .bind(equipment_id)
        .bind(repair_id)
        .bind(filter.created_from)
        .bind(filter.created_to)
        .bind(status)
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("count_transactions", e))?;

        let rows = sqlx::query(&format!(
            r#"
            SELECT {TRANSACTION_COLUMNS}
            FROM inventory_transactions
            {WHERE_CLAUSE}
            ORDER BY created_at DESC, transaction_id DESC
            LIMIT $9 OFFSET $10
            "#
        ))
        .bind(tenant_id.as_uuid())
        .bind(kind)
        .bind(part_id)
        .bind(equipment_id)
        .bind(repair_id)
        .bind(filter.created_from)
        .bind(filter.created_to)
        .bind(status)
        .bind(pagination.limit as i64)
        .bind(pagination.offset as i64)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("query_transactions", e))?;

        let items = rows
            .iter()
            .map(decode_transaction)
            .collect::<Result<Vec<_>, _>>()?;
        let total = total.max(0) as u64;
        let has_more = (pagination.offset as u64) + (items.len() as u64) < total;

        Span::current().record("returned", items.len());
        Ok(TransactionPage {
            items,
            total,
            pagination,
            has_more,
        })
    }

    async fn ledger_sum(&self, tenant_id: TenantId, part_id: PartId) -> Result<i128, StoreError> {
        // SUM over BIGINT yields NUMERIC; decode through text to keep full range.
        let sum: String = sqlx::query_scalar(
            r#"
            SELECT COALESCE(SUM(CASE WHEN kind = 'arrival' THEN quantity ELSE -quantity END), 0)::TEXT
            FROM inventory_transactions
            WHERE tenant_id = $1 AND part_id = $2 AND cancelled_at IS NULL
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(part_id.as_uuid())
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("ledger_sum", e))?;

        sum.parse::<i128>()
            .map_err(|e| StoreError::Backend(format!("invalid ledger sum '{sum}': {e}")))
    }
}

const TRANSACTION_COLUMNS: &str = "transaction_id, tenant_id, kind, part_id, part_name, quantity, description, \
     equipment_id, repair_id, created_by, created_at, cancelled_at, cancelled_by, cancellation_reason";

fn to_i64(value: u64, field: &str) -> Result<i64, StoreError> {
    i64::try_from(value).map_err(|_| StoreError::Backend(format!("{field} {value} exceeds BIGINT range")))
}

fn decode_transaction(row: &sqlx::postgres::PgRow) -> Result<Transaction, StoreError> {
    let row = TransactionRow::from_row(row)
        .map_err(|e| StoreError::Backend(format!("failed to decode transaction row: {e}")))?;
    row.try_into()
}

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code().as_deref() {
                Some("23505") => StoreError::Duplicate(msg),
                Some("40001") | Some("40P01") => StoreError::Conflict(msg),
                _ => StoreError::Backend(msg),
            }
        }
        sqlx::Error::PoolClosed => StoreError::Backend(format!("connection pool closed in {operation}")),
        _ => StoreError::Backend(format!("sqlx error in {operation}: {err}")),
    }
}

// SQLx row types

#[derive(Debug)]
struct PartRow {
    tenant_id: uuid::Uuid,
    part_id: uuid::Uuid,
    name: String,
    quantity: i64,
    unit_price: Option<i64>,
    version: i64,
}

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for PartRow {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        Ok(PartRow {
            tenant_id: row.try_get("tenant_id")?,
            part_id: row.try_get("part_id")?,
            name: row.try_get("name")?,
            quantity: row.try_get("quantity")?,
            unit_price: row.try_get("unit_price")?,
            version: row.try_get("version")?,
        })
    }
}

impl From<PartRow> for Part {
    fn from(row: PartRow) -> Self {
        Part {
            id: PartId::from_uuid(row.part_id),
            tenant_id: TenantId::from_uuid(row.tenant_id),
            name: row.name,
            // Column checks keep both non-negative.
            quantity: row.quantity.max(0) as u64,
            unit_price: row.unit_price,
            version: row.version.max(0) as u64,
        }
    }
}

#[derive(Debug)]
struct TransactionRow {
    transaction_id: uuid::Uuid,
    tenant_id: uuid::Uuid,
    kind: String,
    part_id: uuid::Uuid,
    part_name: String,
    quantity: i64,
    description: String,
    equipment_id: Option<uuid::Uuid>,
    repair_id: Option<uuid::Uuid>,
    created_by: uuid::Uuid,
    created_at: DateTime<Utc>,
    cancelled_at: Option<DateTime<Utc>>,
    cancelled_by: Option<uuid::Uuid>,
    cancellation_reason: Option<String>,
}

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for TransactionRow {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        Ok(TransactionRow {
            transaction_id: row.try_get("transaction_id")?,
            tenant_id: row.try_get("tenant_id")?,
            kind: row.try_get("kind")?,
            part_id: row.try_get("part_id")?,
            part_name: row.try_get("part_name")?,
            quantity: row.try_get("quantity")?,
            description: row.try_get("description")?,
            equipment_id: row.try_get("equipment_id")?,
            repair_id: row.try_get("repair_id")?,
            created_by: row.try_get("created_by")?,
            created_at: row.try_get("created_at")?,
            cancelled_at: row.try_get("cancelled_at")?,
            cancelled_by: row.try_get("cancelled_by")?,
            cancellation_reason: row.try_get("cancellation_reason")?,
        })
    }
}

impl TryFrom<TransactionRow> for Transaction {
    type Error = StoreError;

    fn try_from(row: TransactionRow) -> Result<Self, Self::Error> {
        let kind: MovementKind = row
            .kind
            .parse()
            .map_err(|e| StoreError::Backend(format!("invalid stored kind: {e}")))?;

        let cancellation = match (row.cancelled_at, row.cancelled_by, row.cancellation_reason) {
            (Some(cancelled_at), Some(cancelled_by), Some(reason)) => Some(Cancellation {
                cancelled_at,
                cancelled_by: UserId::from_uuid(cancelled_by),
                reason,
            }),
            (None, None, None) => None,
            _ => {
                return Err(StoreError::Backend(format!(
                    "transaction {} has a partial cancellation record",
                    row.transaction_id
                )));
            }
        };

        Ok(Transaction {
            id: TransactionId::from_uuid(row.transaction_id),
            tenant_id: TenantId::from_uuid(row.tenant_id),
            kind,
            part_id: PartId::from_uuid(row.part_id),
            part_name: row.part_name,
            quantity: row.quantity.max(0) as u64,
            description: row.description,
            equipment_id: row.equipment_id.map(EquipmentId::from_uuid),
            repair_id: row.repair_id.map(RepairId::from_uuid),
            created_by: UserId::from_uuid(row.created_by),
            created_at: row.created_at,
            cancellation,
        })
    }
}
