use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{Value, json};

use depot_infra::{CancellationReceipt, Pagination, Reconciliation, StatusFilter, TransactionFilter, TransactionPage};
use depot_inventory::{
    BatchItemFailure, EquipmentId, ItemFailure, LedgerError, MovementKind, MovementRequest, Part, PartId, RepairId,
    Transaction,
};

// -------------------------
// Request DTOs
// -------------------------

/// Movement body as received. Fields stay loose so every shape problem is
/// reported as a validation error rather than a body rejection.
#[derive(Debug, Default, Deserialize)]
pub struct MovementBody {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub part_id: Option<String>,
    pub quantity: Option<Value>,
    pub description: Option<String>,
    pub equipment_id: Option<String>,
    pub repair_id: Option<String>,
}

impl MovementBody {
    pub fn into_request(self) -> Result<MovementRequest, ItemFailure> {
        let invalid = |msg: &str| ItemFailure::Validation(msg.to_string());

        let kind = self.kind.ok_or_else(|| invalid("type is required"))?;
        let kind = MovementKind::from_str(&kind).map_err(|e| ItemFailure::Validation(e.to_string()))?;
        let part_id = parse_required_id::<PartId>(self.part_id, "part_id")?;
        let quantity = self
            .quantity
            .as_ref()
            .ok_or_else(|| invalid("quantity is required"))?
            .as_u64()
            .ok_or_else(|| invalid("quantity must be a positive integer"))?;

        let request = MovementRequest {
            kind,
            part_id,
            quantity,
            description: self.description.unwrap_or_default().trim().to_string(),
            equipment_id: parse_optional_id::<EquipmentId>(self.equipment_id, "equipment_id")?,
            repair_id: parse_optional_id::<RepairId>(self.repair_id, "repair_id")?,
        };
        request.validate()?;
        Ok(request)
    }
}

/// Items stay raw JSON so a malformed item is reported at its index instead
/// of rejecting the whole body.
#[derive(Debug, Default, Deserialize)]
pub struct BatchBody {
    #[serde(default)]
    pub transactions: Vec<Value>,
}

impl BatchBody {
    /// Convert every item, collecting each failing index.
    pub fn into_requests(self) -> Result<Vec<MovementRequest>, LedgerError> {
        let mut requests = Vec::with_capacity(self.transactions.len());
        let mut failures = Vec::new();
        for (index, item) in self.transactions.into_iter().enumerate() {
            let converted = serde_json::from_value::<MovementBody>(item)
                .map_err(|e| ItemFailure::Validation(format!("item is not a movement object: {e}")))
                .and_then(MovementBody::into_request);
            match converted {
                Ok(r) => requests.push(r),
                Err(failure) => failures.push(BatchItemFailure { index, failure }),
            }
        }
        if failures.is_empty() {
            Ok(requests)
        } else {
            Err(LedgerError::BatchRejected(failures))
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct CancelBody {
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreatePartRequest {
    pub name: String,
    pub unit_price: Option<i64>,
    #[serde(default)]
    pub quantity: u64,
}

/// Optional caller-chosen id for reference registration.
#[derive(Debug, Default, Deserialize)]
pub struct RegisterReferenceRequest {
    pub id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListTransactionsQuery {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub part_id: Option<String>,
    pub equipment_id: Option<String>,
    pub repair_id: Option<String>,
    /// RFC3339
    pub from: Option<String>,
    /// RFC3339
    pub to: Option<String>,
    pub status: Option<String>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

impl ListTransactionsQuery {
    pub fn into_filter(self) -> Result<(TransactionFilter, Pagination), LedgerError> {
        let validation = |f: ItemFailure| LedgerError::from(f);

        let kind = self
            .kind
            .as_deref()
            .map(MovementKind::from_str)
            .transpose()
            .map_err(|e| LedgerError::validation(e.to_string()))?;
        let status = match self.status.as_deref().map(|s| s.trim().to_ascii_lowercase()) {
            None => StatusFilter::All,
            Some(s) => match s.as_str() {
                "" | "all" => StatusFilter::All,
                "active" => StatusFilter::Active,
                "cancelled" => StatusFilter::Cancelled,
                other => {
                    return Err(LedgerError::validation(format!(
                        "unknown status '{other}' (expected active, cancelled or all)"
                    )));
                }
            },
        };

        let filter = TransactionFilter {
            kind,
            part_id: parse_optional_id(self.part_id, "part_id").map_err(validation)?,
            equipment_id: parse_optional_id(self.equipment_id, "equipment_id").map_err(validation)?,
            repair_id: parse_optional_id(self.repair_id, "repair_id").map_err(validation)?,
            created_from: parse_timestamp(self.from, "from")?,
            created_to: parse_timestamp(self.to, "to")?,
            status,
        };
        Ok((filter, Pagination::new(self.limit, self.offset)))
    }
}

fn parse_required_id<T: FromStr>(value: Option<String>, field: &str) -> Result<T, ItemFailure> {
    parse_optional_id(value, field)?.ok_or_else(|| ItemFailure::Validation(format!("{field} is required")))
}

fn parse_optional_id<T: FromStr>(value: Option<String>, field: &str) -> Result<Option<T>, ItemFailure> {
    match value.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(raw) => raw
            .parse()
            .map(Some)
            .map_err(|_| ItemFailure::Validation(format!("{field} is not a valid id"))),
    }
}

fn parse_timestamp(value: Option<String>, field: &str) -> Result<Option<DateTime<Utc>>, LedgerError> {
    value
        .map(|raw| {
            DateTime::parse_from_rfc3339(raw.trim())
                .map(|t| t.with_timezone(&Utc))
                .map_err(|_| LedgerError::validation(format!("{field} must be an RFC3339 timestamp")))
        })
        .transpose()
}

// -------------------------
// JSON mapping helpers
// -------------------------

pub fn transaction_to_json(t: &Transaction) -> Value {
    let cancellation = t.cancellation.as_ref();
    json!({
        "id": t.id.to_string(),
        "type": t.kind.as_str(),
        "part_id": t.part_id.to_string(),
        "part_name": t.part_name,
        "quantity": t.quantity,
        "description": t.description,
        "equipment_id": t.equipment_id.map(|id| id.to_string()),
        "repair_id": t.repair_id.map(|id| id.to_string()),
        "created_by": t.created_by.to_string(),
        "created_at": t.created_at.to_rfc3339(),
        "status": if t.is_cancelled() { "cancelled" } else { "active" },
        "cancelled_at": cancellation.map(|c| c.cancelled_at.to_rfc3339()),
        "cancelled_by": cancellation.map(|c| c.cancelled_by.to_string()),
        "cancellation_reason": cancellation.map(|c| c.reason.clone()),
    })
}

pub fn page_to_json(page: &TransactionPage) -> Value {
    json!({
        "items": page.items.iter().map(transaction_to_json).collect::<Vec<_>>(),
        "total": page.total,
        "limit": page.pagination.limit,
        "offset": page.pagination.offset,
        "has_more": page.has_more,
    })
}

pub fn receipt_to_json(r: &CancellationReceipt) -> Value {
    json!({
        "transaction": transaction_to_json(&r.transaction),
        "part_quantity": r.part_quantity,
        "clamped": r.drift.is_some(),
        "drift": r.drift,
    })
}

pub fn part_to_json(p: &Part) -> Value {
    json!({
        "id": p.id.to_string(),
        "name": p.name,
        "quantity": p.quantity,
        "unit_price": p.unit_price,
    })
}

pub fn reconciliation_to_json(r: &Reconciliation) -> Value {
    json!({
        "part_id": r.part_id.to_string(),
        "part_name": r.part_name,
        "counter": r.counter,
        "ledger_sum": signed_to_json(r.ledger_sum),
        "drift": signed_to_json(r.drift),
        "consistent": r.consistent(),
    })
}

/// Numbers outside i64 are rendered as strings; most JSON consumers lose precision beyond that.
fn signed_to_json(value: i128) -> Value {
    i64::try_from(value)
        .map(Value::from)
        .unwrap_or_else(|_| Value::String(value.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body(kind: &str, quantity: Value) -> MovementBody {
        MovementBody {
            kind: Some(kind.to_string()),
            part_id: Some(PartId::new().to_string()),
            quantity: Some(quantity),
            description: Some("  fitting  ".to_string()),
            ..MovementBody::default()
        }
    }

    #[test]
    fn converts_well_formed_body() {
        let req = body("Expense", json!(3)).into_request().unwrap();
        assert_eq!(req.kind, MovementKind::Expense);
        assert_eq!(req.quantity, 3);
        assert_eq!(req.description, "fitting");
    }

    #[test]
    fn rejects_bad_shapes_as_validation() {
        for q in [json!(0), json!(-2), json!(1.5), json!("4")] {
            assert!(matches!(body("arrival", q).into_request(), Err(ItemFailure::Validation(_))));
        }
        assert!(matches!(body("transfer", json!(1)).into_request(), Err(ItemFailure::Validation(_))));

        let mut bad_id = body("arrival", json!(1));
        bad_id.equipment_id = Some("nope".into());
        assert_eq!(
            bad_id.into_request(),
            Err(ItemFailure::Validation("equipment_id is not a valid id".into()))
        );
    }

    fn raw_item(kind: &str, quantity: Value) -> Value {
        json!({ "type": kind, "part_id": PartId::new().to_string(), "quantity": quantity, "description": "fitting" })
    }

    #[test]
    fn batch_conversion_reports_every_bad_index() {
        let batch = BatchBody {
            transactions: vec![raw_item("arrival", json!(1)), raw_item("arrival", json!(0)), json!({})],
        };
        match batch.into_requests() {
            Err(LedgerError::BatchRejected(f)) => {
                assert_eq!(f.iter().map(|f| f.index).collect::<Vec<_>>(), vec![1, 2]);
            }
            other => panic!("expected BatchRejected, got {other:?}"),
        }
    }

    #[test]
    fn non_object_batch_items_fail_at_their_index() {
        let batch: BatchBody = serde_json::from_value(json!({
            "transactions": [raw_item("expense", json!(2)), 1, { "type": 5 }, "arrival"],
        }))
        .unwrap();
        match batch.into_requests() {
            Err(LedgerError::BatchRejected(f)) => {
                assert_eq!(f.iter().map(|f| f.index).collect::<Vec<_>>(), vec![1, 2, 3]);
                assert!(f.iter().all(|f| matches!(f.failure, ItemFailure::Validation(_))));
            }
            other => panic!("expected BatchRejected, got {other:?}"),
        }
    }

    #[test]
    fn query_parsing_defaults_and_errors() {
        let (filter, page) = ListTransactionsQuery::default().into_filter().unwrap();
        assert_eq!(filter, TransactionFilter::default());
        assert_eq!(page, Pagination::default());

        let q = ListTransactionsQuery {
            status: Some("Cancelled".into()),
            limit: Some(10_000),
            from: Some("2024-01-01T00:00:00Z".into()),
            ..ListTransactionsQuery::default()
        };
        let (filter, page) = q.into_filter().unwrap();
        assert_eq!(filter.status, StatusFilter::Cancelled);
        assert_eq!(page.limit, Pagination::MAX_LIMIT);
        assert!(filter.created_from.is_some());

        let bad = ListTransactionsQuery {
            to: Some("yesterday".into()),
            ..ListTransactionsQuery::default()
        };
        assert!(matches!(bad.into_filter(), Err(LedgerError::Validation(_))));
    }
}
