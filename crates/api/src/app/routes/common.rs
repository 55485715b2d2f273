use axum::{Json, extract::rejection::JsonRejection, http::StatusCode};
use serde::de::DeserializeOwned;

use depot_auth::{CommandAuthorization, Permission};

use crate::app::errors;
use crate::context::{PrincipalContext, TenantContext};

/// Associates required permissions with a command.
pub struct CmdAuth<C> {
    pub inner: C,
    pub required: Vec<Permission>,
}

impl<C> CmdAuth<C> {
    pub fn new(inner: C, permission: &'static str) -> Self {
        Self {
            inner,
            required: vec![Permission::new(permission)],
        }
    }

    /// Return the command if the request context holds every required permission.
    pub fn authorize(
        self,
        tenant: &TenantContext,
        principal: &PrincipalContext,
    ) -> Result<C, axum::response::Response> {
        crate::authz::authorize_command(tenant, principal, &self).map_err(|e| errors::forbidden(e.to_string()))?;
        Ok(self.inner)
    }
}

impl<C> CommandAuthorization for CmdAuth<C> {
    fn required_permissions(&self) -> &[Permission] {
        &self.required
    }
}

/// Unwrap a JSON body, reporting malformed input in the standard error shape.
pub fn json_body<T: DeserializeOwned>(
    body: Result<Json<T>, JsonRejection>,
) -> Result<T, axum::response::Response> {
    body.map(|Json(v)| v)
        .map_err(|e| errors::json_error(StatusCode::BAD_REQUEST, "invalid_json", e.body_text()))
}
