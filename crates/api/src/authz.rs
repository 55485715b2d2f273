//! API-side authorization guard for ledger commands.
//!
//! Enforced at the command boundary, before the ledger service runs, so the
//! ledger itself stays auth-agnostic.

use depot_auth::{AuthzError, CommandAuthorization, Principal, authorize};

use crate::context::{PrincipalContext, TenantContext};

/// Check authorization for a command in the current request context.
pub fn authorize_command<C: CommandAuthorization>(
    tenant: &TenantContext,
    principal: &PrincipalContext,
    command: &C,
) -> Result<(), AuthzError> {
    let principal = Principal::from_roles(principal.user_id(), tenant.tenant_id(), principal.roles().to_vec());

    for perm in command.required_permissions() {
        authorize(&principal, perm)?;
    }

    Ok(())
}
