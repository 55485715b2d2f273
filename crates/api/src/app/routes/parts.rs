//! Collaborator surface: parts and the bare equipment/repair references the
//! ledger checks for existence, plus per-part reconciliation.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use serde_json::json;

use depot_auth::permissions;
use depot_inventory::{EquipmentId, LedgerError, Part, PartId, RepairId};

use crate::app::routes::common::{CmdAuth, json_body};
use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::{PrincipalContext, TenantContext};

pub fn router() -> Router {
    Router::new()
        .route("/parts", post(create_part).get(list_parts))
        .route("/parts/:id", get(get_part))
        .route("/parts/:id/reconciliation", get(reconcile_part))
        .route("/equipment", post(register_equipment))
        .route("/repairs", post(register_repair))
}

pub async fn create_part(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    body: Result<Json<dto::CreatePartRequest>, JsonRejection>,
) -> axum::response::Response {
    let body = match json_body(body) {
        Ok(b) => b,
        Err(resp) => return resp,
    };
    let body = match CmdAuth::new(body, permissions::PARTS_MANAGE).authorize(&tenant, &principal) {
        Ok(b) => b,
        Err(resp) => return resp,
    };

    let part = match Part::register(tenant.tenant_id(), PartId::new(), body.name, body.unit_price, body.quantity) {
        Ok(p) => p,
        Err(e) => return errors::ledger_error_to_response(LedgerError::from(e)),
    };
    match services.ledger().register_part(part).await {
        Ok(p) => (StatusCode::CREATED, Json(dto::part_to_json(&p))).into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

pub async fn list_parts(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
) -> axum::response::Response {
    if let Err(resp) = CmdAuth::new((), permissions::TRANSACTIONS_READ).authorize(&tenant, &principal) {
        return resp;
    }
    match services.ledger().list_parts(tenant.tenant_id()).await {
        Ok(parts) => {
            let items: Vec<_> = parts.iter().map(dto::part_to_json).collect();
            (StatusCode::OK, Json(json!({ "items": items }))).into_response()
        }
        Err(e) => errors::ledger_error_to_response(e),
    }
}

pub async fn get_part(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    if let Err(resp) = CmdAuth::new((), permissions::TRANSACTIONS_READ).authorize(&tenant, &principal) {
        return resp;
    }
    let part_id: PartId = match id.parse() {
        Ok(v) => v,
        Err(_) => return errors::invalid_id("part"),
    };
    match services.ledger().get_part(tenant.tenant_id(), part_id).await {
        Ok(p) => (StatusCode::OK, Json(dto::part_to_json(&p))).into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

/// GET /parts/:id/reconciliation
pub async fn reconcile_part(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    if let Err(resp) = CmdAuth::new((), permissions::TRANSACTIONS_READ).authorize(&tenant, &principal) {
        return resp;
    }
    let part_id: PartId = match id.parse() {
        Ok(v) => v,
        Err(_) => return errors::invalid_id("part"),
    };
    match services.ledger().reconcile(tenant.tenant_id(), part_id).await {
        Ok(r) => (StatusCode::OK, Json(dto::reconciliation_to_json(&r))).into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

pub async fn register_equipment(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    body: Option<Json<dto::RegisterReferenceRequest>>,
) -> axum::response::Response {
    let body = body.map(|Json(b)| b).unwrap_or_default();
    let body = match CmdAuth::new(body, permissions::PARTS_MANAGE).authorize(&tenant, &principal) {
        Ok(b) => b,
        Err(resp) => return resp,
    };
    let id = match body.id.as_deref().map(str::parse::<EquipmentId>).transpose() {
        Ok(id) => id.unwrap_or_default(),
        Err(_) => return errors::invalid_id("equipment"),
    };
    match services.ledger().register_equipment(tenant.tenant_id(), id).await {
        Ok(()) => (StatusCode::CREATED, Json(json!({ "id": id.to_string() }))).into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

pub async fn register_repair(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    body: Option<Json<dto::RegisterReferenceRequest>>,
) -> axum::response::Response {
    let body = body.map(|Json(b)| b).unwrap_or_default();
    let body = match CmdAuth::new(body, permissions::PARTS_MANAGE).authorize(&tenant, &principal) {
        Ok(b) => b,
        Err(resp) => return resp,
    };
    let id = match body.id.as_deref().map(str::parse::<RepairId>).transpose() {
        Ok(id) => id.unwrap_or_default(),
        Err(_) => return errors::invalid_id("repair"),
    };
    match services.ledger().register_repair(tenant.tenant_id(), id).await {
        Ok(()) => (StatusCode::CREATED, Json(json!({ "id": id.to_string() }))).into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}
