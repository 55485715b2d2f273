use std::borrow::Cow;

use serde::{Deserialize, Serialize};

use crate::permissions::{self, Permission};

/// Role identifier used for RBAC.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Role(Cow<'static, str>);

impl Role {
    pub const ADMIN: &'static str = "admin";
    pub const STOREKEEPER: &'static str = "storekeeper";
    pub const VIEWER: &'static str = "viewer";

    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Static role→permission policy. Unknown roles grant nothing.
pub fn permissions_for_roles(roles: &[Role]) -> Vec<Permission> {
    let mut granted: Vec<Permission> = Vec::new();
    for role in roles {
        let perms: &[&'static str] = match role.as_str() {
            Role::ADMIN => &[permissions::ALL],
            Role::STOREKEEPER => &[
                permissions::TRANSACTIONS_CREATE,
                permissions::TRANSACTIONS_CANCEL,
                permissions::TRANSACTIONS_READ,
            ],
            Role::VIEWER => &[permissions::TRANSACTIONS_READ],
            _ => &[],
        };
        for p in perms {
            let p = Permission::new(*p);
            if !granted.contains(&p) {
                granted.push(p);
            }
        }
    }
    granted
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storekeeper_cannot_manage_parts() {
        let perms = permissions_for_roles(&[Role::new(Role::STOREKEEPER)]);
        assert!(perms.contains(&Permission::new(permissions::TRANSACTIONS_CANCEL)));
        assert!(!perms.contains(&Permission::new(permissions::PARTS_MANAGE)));
    }

    #[test]
    fn roles_union_without_duplicates() {
        let perms = permissions_for_roles(&[Role::new(Role::VIEWER), Role::new(Role::STOREKEEPER)]);
        assert_eq!(perms.len(), 3);
        assert!(permissions_for_roles(&[Role::new("auditor")]).is_empty());
    }
}
