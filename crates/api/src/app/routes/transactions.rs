use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{
        Extension, Path, Query,
        rejection::{JsonRejection, QueryRejection},
    },
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use serde_json::json;

use depot_auth::permissions;
use depot_inventory::TransactionId;

use crate::app::routes::common::{CmdAuth, json_body};
use crate::app::services::{AppServices, TOPIC_MOVEMENT_CANCELLED, TOPIC_MOVEMENT_RECORDED};
use crate::app::{dto, errors};
use crate::context::{PrincipalContext, TenantContext};

pub fn router() -> Router {
    Router::new()
        .route("/", post(record_movement).get(list_transactions))
        .route("/batch", post(record_batch))
        .route("/:id", get(get_transaction))
        .route("/:id/cancel", post(cancel_movement))
}

/// POST /transactions
pub async fn record_movement(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    body: Result<Json<dto::MovementBody>, JsonRejection>,
) -> axum::response::Response {
    let body = match json_body(body) {
        Ok(b) => b,
        Err(resp) => return resp,
    };
    let request = match CmdAuth::new(body, permissions::TRANSACTIONS_CREATE).authorize(&tenant, &principal) {
        Ok(b) => b.into_request(),
        Err(resp) => return resp,
    };
    let request = match request {
        Ok(r) => r,
        Err(failure) => return errors::ledger_error_to_response(failure.into()),
    };

    let txn = match services
        .ledger()
        .record_movement(tenant.tenant_id(), request, principal.user_id())
        .await
    {
        Ok(t) => t,
        Err(e) => return errors::ledger_error_to_response(e),
    };

    let body = dto::transaction_to_json(&txn);
    services.publish(tenant.tenant_id(), TOPIC_MOVEMENT_RECORDED, json!({ "items": [body.clone()] }));
    (StatusCode::CREATED, Json(body)).into_response()
}

/// POST /transactions/batch
pub async fn record_batch(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    body: Result<Json<dto::BatchBody>, JsonRejection>,
) -> axum::response::Response {
    let body = match json_body(body) {
        Ok(b) => b,
        Err(resp) => return resp,
    };
    let body = match CmdAuth::new(body, permissions::TRANSACTIONS_CREATE).authorize(&tenant, &principal) {
        Ok(b) => b,
        Err(resp) => return resp,
    };
    // Size is checked before per-item shape so oversized batches fail fast.
    if let Err(e) = depot_inventory::check_batch_size(body.transactions.len()) {
        return errors::ledger_error_to_response(e);
    }
    let requests = match body.into_requests() {
        Ok(r) => r,
        Err(e) => return errors::ledger_error_to_response(e),
    };

    let committed = match services
        .ledger()
        .record_batch(tenant.tenant_id(), requests, principal.user_id())
        .await
    {
        Ok(c) => c,
        Err(e) => return errors::ledger_error_to_response(e),
    };

    let items: Vec<serde_json::Value> = committed.iter().map(dto::transaction_to_json).collect();
    services.publish(tenant.tenant_id(), TOPIC_MOVEMENT_RECORDED, json!({ "items": items.clone() }));
    (StatusCode::CREATED, Json(json!({ "items": items }))).into_response()
}

/// POST /transactions/:id/cancel
pub async fn cancel_movement(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    body: Result<Json<dto::CancelBody>, JsonRejection>,
) -> axum::response::Response {
    let transaction_id: TransactionId = match id.parse() {
        Ok(v) => v,
        Err(_) => return errors::invalid_id("transaction"),
    };
    let body = match json_body(body) {
        Ok(b) => b,
        Err(resp) => return resp,
    };
    let body = match CmdAuth::new(body, permissions::TRANSACTIONS_CANCEL).authorize(&tenant, &principal) {
        Ok(b) => b,
        Err(resp) => return resp,
    };

    let reason = body.reason.unwrap_or_default();
    let receipt = match services
        .ledger()
        .cancel_movement(tenant.tenant_id(), transaction_id, &reason, principal.user_id())
        .await
    {
        Ok(r) => r,
        Err(e) => return errors::ledger_error_to_response(e),
    };

    let body = dto::receipt_to_json(&receipt);
    services.publish(tenant.tenant_id(), TOPIC_MOVEMENT_CANCELLED, body.clone());
    (StatusCode::OK, Json(body)).into_response()
}

/// GET /transactions
pub async fn list_transactions(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    query: Result<Query<dto::ListTransactionsQuery>, QueryRejection>,
) -> axum::response::Response {
    let query = match query {
        Ok(Query(q)) => q,
        Err(e) => return errors::json_error(StatusCode::BAD_REQUEST, "validation_error", e.body_text()),
    };
    let query = match CmdAuth::new(query, permissions::TRANSACTIONS_READ).authorize(&tenant, &principal) {
        Ok(q) => q,
        Err(resp) => return resp,
    };
    let (filter, pagination) = match query.into_filter() {
        Ok(v) => v,
        Err(e) => return errors::ledger_error_to_response(e),
    };

    match services
        .ledger()
        .list_transactions(tenant.tenant_id(), &filter, pagination)
        .await
    {
        Ok(page) => (StatusCode::OK, Json(dto::page_to_json(&page))).into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

/// GET /transactions/:id
pub async fn get_transaction(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    if let Err(resp) = CmdAuth::new((), permissions::TRANSACTIONS_READ).authorize(&tenant, &principal) {
        return resp;
    }
    let transaction_id: TransactionId = match id.parse() {
        Ok(v) => v,
        Err(_) => return errors::invalid_id("transaction"),
    };

    match services.ledger().get_transaction(tenant.tenant_id(), transaction_id).await {
        Ok(txn) => (StatusCode::OK, Json(dto::transaction_to_json(&txn))).into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}
