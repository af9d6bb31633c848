//! Process configuration.
//!
//! Loaded once at startup from a JSON file; every secret-bearing struct has
//! a manual `Debug` that redacts the secret so config can be logged.

use crate::gate::GateConfig;
use anyhow::Context;
use serde::Deserialize;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// Signing secret and token lifetime for the session token service.
#[derive(Clone, Deserialize)]
pub struct TokenSettings {
    pub secret: String,
    pub ttl_seconds: i64,
}

impl fmt::Debug for TokenSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenSettings")
            .field("secret", &"<redacted>")
            .field("ttl_seconds", &self.ttl_seconds)
            .finish()
    }
}

/// Where the ledger database lives. `path: None` means in-memory, which is
/// only useful for tests and local experiments.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DatabaseSettings {
    #[serde(default)]
    pub path: Option<PathBuf>,
}

/// Bootstrap credentials for the superuser account upserted at startup.
#[derive(Clone, Deserialize)]
pub struct SuperuserSettings {
    pub external_id: i64,
    pub password: String,
}

impl fmt::Debug for SuperuserSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SuperuserSettings")
            .field("external_id", &self.external_id)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Top-level core configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct CoreConfig {
    pub token: TokenSettings,
    #[serde(default)]
    pub database: DatabaseSettings,
    pub superuser: SuperuserSettings,
    #[serde(default)]
    pub gate: GateConfig,
}

impl CoreConfig {
    pub fn from_path(path: &Path) -> anyhow::Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let config: Self = serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_config() {
        let raw = r#"{
            "token": { "secret": "s3cret", "ttl_seconds": 3600 },
            "superuser": { "external_id": 10001, "password": "changeme" }
        }"#;
        let config: CoreConfig = serde_json::from_str(raw).unwrap();
        assert_eq!(config.token.ttl_seconds, 3600);
        assert!(config.database.path.is_none());
        assert!(config.gate.exempt_routes.is_empty());
    }

    #[test]
    fn parses_exempt_routes() {
        let raw = r#"{
            "token": { "secret": "s3cret", "ttl_seconds": 3600 },
            "superuser": { "external_id": 10001, "password": "changeme" },
            "gate": { "exempt_routes": ["status", "activity/recently"] }
        }"#;
        let config: CoreConfig = serde_json::from_str(raw).unwrap();
        assert!(config.gate.exempt_routes.contains("status"));
    }

    #[test]
    fn debug_redacts_secrets() {
        let raw = r#"{
            "token": { "secret": "s3cret", "ttl_seconds": 3600 },
            "superuser": { "external_id": 10001, "password": "changeme" }
        }"#;
        let config: CoreConfig = serde_json::from_str(raw).unwrap();
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("s3cret"));
        assert!(!rendered.contains("changeme"));
    }
}
