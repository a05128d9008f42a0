use std::sync::Arc;

use serde::Deserialize;
use tracing_subscriber::EnvFilter;

use worthdb_core::{StorageBackend, StorageError};
use worthdb_memory::InMemoryStorage;
use worthdb_sqlite::SqliteStorage;

use crate::error::LedgerError;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    /// `"sqlite"` for the embedded on-disk engine, `"memory"` for an
    /// ephemeral ledger.
    #[serde(default = "default_backend")]
    pub backend: String,

    /// Database path for the sqlite backend.
    #[serde(default = "default_path")]
    pub path: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub json: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            path: default_path(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_backend() -> String {
    "sqlite".to_string()
}

fn default_path() -> String {
    "worthdb.db".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    pub fn load(path: &str) -> Result<Self, LedgerError> {
        let text = std::fs::read_to_string(path).map_err(StorageError::from)?;
        toml::from_str(&text)
            .map_err(|err| LedgerError::Validation(format!("invalid config file: {err}")))
    }
}

/// Builds the storage backend named by the config.
pub fn open_storage(config: &StorageConfig) -> Result<Arc<dyn StorageBackend>, LedgerError> {
    match config.backend.as_str() {
        "memory" => Ok(Arc::new(InMemoryStorage::new())),
        "sqlite" => Ok(Arc::new(SqliteStorage::new(&config.path)?)),
        other => Err(LedgerError::Validation(format!(
            "unknown storage backend: {other}"
        ))),
    }
}

/// Installs the global tracing subscriber for the embedding application.
/// `RUST_LOG` overrides the configured level; a no-op if a subscriber is
/// already installed.
pub fn init_tracing(config: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));
    if config.json {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .try_init();
    } else {
        let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
    }
}
