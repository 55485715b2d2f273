use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use depot_inventory::{BatchItemFailure, ItemFailure, LedgerError, NotFoundKind};

/// Map a ledger failure onto status + `{error, message, ...}`.
pub fn ledger_error_to_response(err: LedgerError) -> axum::response::Response {
    let code = err.code();
    match err {
        LedgerError::Validation(msg) => json_error(StatusCode::BAD_REQUEST, code, msg),
        LedgerError::NotFound(kind) => not_found(kind),
        LedgerError::InsufficientStock { available, requested } => (
            StatusCode::CONFLICT,
            axum::Json(json!({
                "error": code,
                "message": format!("insufficient stock: requested {requested}, available {available}"),
                "available": available,
                "requested": requested,
            })),
        )
            .into_response(),
        LedgerError::AlreadyCancelled => {
            json_error(StatusCode::BAD_REQUEST, code, "transaction is already cancelled")
        }
        LedgerError::BatchRejected(failures) => batch_rejected(&failures),
        LedgerError::Conflict(msg) => json_error(StatusCode::CONFLICT, code, msg),
        LedgerError::Store(msg) => {
            tracing::error!(%msg, "ledger store failure surfaced to client");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, code, "internal storage error")
        }
    }
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

pub fn not_found(kind: NotFoundKind) -> axum::response::Response {
    (
        StatusCode::NOT_FOUND,
        axum::Json(json!({
            "error": "not_found",
            "message": format!("{kind} not found"),
            "resource": kind.as_str(),
        })),
    )
        .into_response()
}

pub fn forbidden(message: impl Into<String>) -> axum::response::Response {
    json_error(StatusCode::FORBIDDEN, "forbidden", message)
}

pub fn invalid_id(what: &str) -> axum::response::Response {
    json_error(StatusCode::BAD_REQUEST, "invalid_id", format!("invalid {what} id"))
}

fn batch_rejected(failures: &[BatchItemFailure]) -> axum::response::Response {
    let errors: Vec<serde_json::Value> = failures.iter().map(item_failure_to_json).collect();
    (
        StatusCode::BAD_REQUEST,
        axum::Json(json!({
            "error": "batch_validation_error",
            "message": format!("{} of the batch items failed validation", failures.len()),
            "errors": errors,
        })),
    )
        .into_response()
}

fn item_failure_to_json(item: &BatchItemFailure) -> serde_json::Value {
    let mut body = json!({
        "index": item.index,
        "code": item.failure.code(),
        "message": item.failure.to_string(),
    });
    match &item.failure {
        ItemFailure::InsufficientStock { available, requested } => {
            body["available"] = json!(available);
            body["requested"] = json!(requested);
        }
        ItemFailure::NotFound(kind) => body["resource"] = json!(kind.as_str()),
        ItemFailure::Validation(_) => {}
    }
    body
}
