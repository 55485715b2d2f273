use std::borrow::Cow;

use serde::{Deserialize, Serialize};

pub const ALL: &str = "*";
pub const TRANSACTIONS_CREATE: &str = "inventory.transactions.create";
pub const TRANSACTIONS_CANCEL: &str = "inventory.transactions.cancel";
pub const TRANSACTIONS_READ: &str = "inventory.transactions.read";
pub const PARTS_MANAGE: &str = "inventory.parts.manage";

/// Permission identifier.
///
/// Permissions are opaque strings (e.g. "inventory.transactions.read"). The
/// wildcard `"*"` allows everything within the tenant.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Permission(Cow<'static, str>);

impl Permission {
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_wildcard(&self) -> bool {
        self.as_str() == ALL
    }
}

impl core::fmt::Display for Permission {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}
