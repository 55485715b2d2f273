use thiserror::Error;

use crate::{Permission, Principal};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("tenant mismatch")]
    TenantMismatch,

    #[error("forbidden: missing permission '{0}'")]
    Forbidden(String),
}

/// Command-side authorization contract (checked at the command boundary).
///
/// The API layer enforces these requirements before calling the ledger.
pub trait CommandAuthorization {
    fn required_permissions(&self) -> &[Permission];
}

/// Authorize a principal within its active tenant context.
///
/// Pure policy check: no IO, no panics.
pub fn authorize(principal: &Principal, required: &Permission) -> Result<(), AuthzError> {
    if principal.active_tenant_id != principal.membership.tenant_id {
        return Err(AuthzError::TenantMismatch);
    }

    let granted = principal
        .membership
        .permissions
        .iter()
        .any(|p| p.is_wildcard() || p == required);

    if granted {
        Ok(())
    } else {
        Err(AuthzError::Forbidden(required.as_str().to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Role, permissions};
    use depot_core::{TenantId, UserId};

    fn principal(role: &'static str) -> Principal {
        Principal::from_roles(UserId::new(), TenantId::new(), vec![Role::new(role)])
    }

    #[test]
    fn admin_wildcard_allows_everything() {
        let p = principal(Role::ADMIN);
        assert!(authorize(&p, &Permission::new(permissions::PARTS_MANAGE)).is_ok());
        assert!(authorize(&p, &Permission::new("anything.else")).is_ok());
    }

    #[test]
    fn viewer_may_read_but_not_write() {
        let p = principal(Role::VIEWER);
        assert!(authorize(&p, &Permission::new(permissions::TRANSACTIONS_READ)).is_ok());
        assert_eq!(
            authorize(&p, &Permission::new(permissions::TRANSACTIONS_CREATE)),
            Err(AuthzError::Forbidden(permissions::TRANSACTIONS_CREATE.to_string()))
        );
    }

    #[test]
    fn tenant_mismatch_is_rejected_even_for_admin() {
        let mut p = principal(Role::ADMIN);
        p.active_tenant_id = TenantId::new();
        assert_eq!(
            authorize(&p, &Permission::new(permissions::TRANSACTIONS_READ)),
            Err(AuthzError::TenantMismatch)
        );
    }
}
