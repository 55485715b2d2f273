//! Environment-driven server configuration.

use std::net::SocketAddr;

use thiserror::Error;

use depot_infra::DEFAULT_MAX_ATTEMPTS;

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
const DEV_JWT_SECRET: &str = "dev-secret";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{name} is invalid: {reason}")]
    Invalid { name: &'static str, reason: String },

    #[error("{0} must be set")]
    Missing(&'static str),
}

/// Where ledger state lives.
#[derive(Clone, PartialEq, Eq)]
pub enum StoreConfig {
    InMemory,
    Postgres { database_url: String },
}

impl StoreConfig {
    pub fn kind(&self) -> &'static str {
        match self {
            StoreConfig::InMemory => "in_memory",
            StoreConfig::Postgres { .. } => "postgres",
        }
    }
}

impl std::fmt::Debug for StoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreConfig::InMemory => f.write_str("InMemory"),
            StoreConfig::Postgres { .. } => f
                .debug_struct("Postgres")
                .field("database_url", &"[REDACTED]")
                .finish(),
        }
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct ApiConfig {
    pub bind_addr: SocketAddr,
    pub jwt_secret: String,
    pub store: StoreConfig,
    /// Plan/commit attempts per ledger operation before surfacing a conflict.
    pub ledger_max_attempts: u32,
}

impl std::fmt::Debug for ApiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiConfig")
            .field("bind_addr", &self.bind_addr)
            .field("jwt_secret", &"[REDACTED]")
            .field("store", &self.store)
            .field("ledger_max_attempts", &self.ledger_max_attempts)
            .finish()
    }
}

impl ApiConfig {
    /// Read configuration from process environment variables.
    ///
    /// - `DEPOT_BIND_ADDR` (default `0.0.0.0:8080`)
    /// - `JWT_SECRET` (insecure dev default when unset)
    /// - `USE_PERSISTENT_STORES` (default `false`)
    /// - `DATABASE_URL` (required when persistent)
    /// - `DEPOT_LEDGER_MAX_ATTEMPTS` (default 5)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`ApiConfig::from_env`] with an injectable variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| {
            lookup(name).and_then(|v| {
                let trimmed = v.trim();
                (!trimmed.is_empty()).then(|| trimmed.to_string())
            })
        };

        let bind_addr = var("DEPOT_BIND_ADDR")
            .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string())
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::Invalid {
                name: "DEPOT_BIND_ADDR",
                reason: e.to_string(),
            })?;

        let jwt_secret = var("JWT_SECRET").unwrap_or_else(|| DEV_JWT_SECRET.to_string());

        let persistent = match var("USE_PERSISTENT_STORES") {
            Some(v) => parse_bool("USE_PERSISTENT_STORES", &v)?,
            None => false,
        };
        let store = if persistent {
            let database_url = var("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?;
            StoreConfig::Postgres { database_url }
        } else {
            StoreConfig::InMemory
        };

        let ledger_max_attempts = match var("DEPOT_LEDGER_MAX_ATTEMPTS") {
            Some(v) => match v.parse::<u32>() {
                Ok(n) if n > 0 => n,
                Ok(_) => {
                    return Err(ConfigError::Invalid {
                        name: "DEPOT_LEDGER_MAX_ATTEMPTS",
                        reason: "must be at least 1".to_string(),
                    });
                }
                Err(e) => {
                    return Err(ConfigError::Invalid {
                        name: "DEPOT_LEDGER_MAX_ATTEMPTS",
                        reason: e.to_string(),
                    });
                }
            },
            None => DEFAULT_MAX_ATTEMPTS,
        };

        Ok(Self {
            bind_addr,
            jwt_secret,
            store,
            ledger_max_attempts,
        })
    }

    pub fn uses_dev_secret(&self) -> bool {
        self.jwt_secret == DEV_JWT_SECRET
    }
}

fn parse_bool(name: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "y" => Ok(true),
        "false" | "0" | "no" | "n" => Ok(false),
        _ => Err(ConfigError::Invalid {
            name,
            reason: "must be a boolean (true/false/1/0)".to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config(vars: &[(&str, &str)]) -> Result<ApiConfig, ConfigError> {
        let vars: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        ApiConfig::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn defaults_apply_when_environment_is_empty() {
        let c = config(&[]).unwrap();
        assert_eq!(c.bind_addr, DEFAULT_BIND_ADDR.parse().unwrap());
        assert_eq!(c.store, StoreConfig::InMemory);
        assert_eq!(c.ledger_max_attempts, DEFAULT_MAX_ATTEMPTS);
        assert!(c.uses_dev_secret());
    }

    #[test]
    fn persistent_store_requires_database_url() {
        assert_eq!(
            config(&[("USE_PERSISTENT_STORES", "true")]),
            Err(ConfigError::Missing("DATABASE_URL"))
        );

        let c = config(&[
            ("USE_PERSISTENT_STORES", "1"),
            ("DATABASE_URL", "postgres://localhost/depot"),
        ])
        .unwrap();
        assert_eq!(c.store.kind(), "postgres");
    }

    #[test]
    fn malformed_values_are_rejected() {
        assert!(matches!(
            config(&[("DEPOT_BIND_ADDR", "nowhere")]),
            Err(ConfigError::Invalid { name: "DEPOT_BIND_ADDR", .. })
        ));
        assert!(matches!(
            config(&[("USE_PERSISTENT_STORES", "maybe")]),
            Err(ConfigError::Invalid { name: "USE_PERSISTENT_STORES", .. })
        ));
        assert!(matches!(
            config(&[("DEPOT_LEDGER_MAX_ATTEMPTS", "0")]),
            Err(ConfigError::Invalid { name: "DEPOT_LEDGER_MAX_ATTEMPTS", .. })
        ));
    }

    #[test]
    fn debug_output_redacts_secrets() {
        let c = config(&[
            ("JWT_SECRET", "hunter2"),
            ("USE_PERSISTENT_STORES", "true"),
            ("DATABASE_URL", "postgres://user:pw@db/depot"),
        ])
        .unwrap();
        let rendered = format!("{c:?}");
        assert!(!rendered.contains("hunter2"));
        assert!(!rendered.contains("pw@db"));
    }
}
