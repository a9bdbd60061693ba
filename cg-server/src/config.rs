//! Configuration resolution for cg-server
//!
//! Listen address: CLI → TOML → compiled default.
//! Scheduler key: Database → ENV → TOML → generated.

use cg_common::config::TomlConfig;
use cg_common::db::settings::{get_setting, load_or_create_scheduler_key, SCHEDULER_KEY_SETTING};
use cg_common::Result;
use sqlx::SqlitePool;
use tracing::{info, warn};

/// Environment variable holding the scheduler key
pub const SCHEDULER_KEY_ENV: &str = "CARDGRAPH_SCHEDULER_KEY";

pub const DEFAULT_BIND_ADDRESS: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 5740;

/// Resolved listen address
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
}

impl ServerConfig {
    /// Command-line values win over the TOML file
    pub fn resolve(cli_bind: Option<String>, cli_port: Option<u16>, toml_config: &TomlConfig) -> Self {
        Self {
            bind_address: cli_bind
                .or_else(|| toml_config.bind_address.clone())
                .filter(|b| !b.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string()),
            port: cli_port.or(toml_config.port).unwrap_or(DEFAULT_PORT),
        }
    }

    pub fn listen_address(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }
}

/// A usable key is non-empty after trimming
pub fn is_valid_key(key: &str) -> bool {
    !key.trim().is_empty()
}

/// Resolve the shared key accepted by the scheduler endpoints
///
/// **Priority:** Database → ENV → TOML. When no source has a key, a random
/// one is generated and stored in the database.
pub async fn resolve_scheduler_key(db: &SqlitePool, toml_config: &TomlConfig) -> Result<String> {
    let db_key = get_setting(db, SCHEDULER_KEY_SETTING)
        .await?
        .filter(|k| is_valid_key(k));
    let env_key = std::env::var(SCHEDULER_KEY_ENV).ok().filter(|k| is_valid_key(k));
    let toml_key = toml_config.scheduler_key.clone().filter(|k| is_valid_key(k));

    let sources: Vec<&str> = [
        db_key.as_ref().map(|_| "database"),
        env_key.as_ref().map(|_| "environment"),
        toml_key.as_ref().map(|_| "TOML"),
    ]
    .into_iter()
    .flatten()
    .collect();
    if sources.len() > 1 {
        warn!(
            "Scheduler key found in multiple sources: {}. Using {} (highest priority).",
            sources.join(", "),
            sources[0]
        );
    }

    if let Some(key) = db_key {
        info!("Scheduler key loaded from database");
        return Ok(key);
    }
    if let Some(key) = env_key {
        info!("Scheduler key loaded from environment variable");
        return Ok(key);
    }
    if let Some(key) = toml_key {
        info!("Scheduler key loaded from TOML config");
        return Ok(key);
    }

    load_or_create_scheduler_key(db).await
}
