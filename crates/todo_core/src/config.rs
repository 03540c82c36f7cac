//! Declarative core configuration and bootstrap.
//!
//! # Responsibility
//! - Describe storage backend and optional logging in one JSON document.
//! - Wire logging, stores and the model from that description.
//!
//! # Invariants
//! - Both collections of one configuration live in the same backend.
//! - Logging, when configured, is started before any store is opened.

use crate::logging::{default_log_level, init_logging};
use crate::service::todo_model::{ModelError, TodoModel};
use crate::store::memory_store::MemoryStore;
use crate::store::sqlite_store::SqliteStore;
use crate::store::Store;
use crate::{CATEGORIES_COLLECTION, TASKS_COLLECTION};
use log::info;
use serde::Deserialize;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

/// Storage backend selection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(tag = "backend", rename_all = "snake_case")]
pub enum StorageConfig {
    /// Non-durable in-process store.
    #[default]
    Memory,
    /// SQLite database file shared by both collections.
    Sqlite { path: PathBuf },
}

/// Rolling file log settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Defaults to `default_log_level()`.
    #[serde(default)]
    pub level: Option<String>,
    /// Absolute directory for log files.
    pub log_dir: String,
}

/// Top-level core configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CoreConfig {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub logging: Option<LoggingConfig>,
}

impl CoreConfig {
    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(text).map_err(ConfigError::Parse)
    }
}

/// Error raised while loading configuration or bootstrapping the model.
#[derive(Debug)]
pub enum ConfigError {
    Parse(serde_json::Error),
    Logging(String),
    Model(ModelError),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Parse(err) => write!(f, "invalid configuration: {err}"),
            Self::Logging(message) => write!(f, "logging setup failed: {message}"),
            Self::Model(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Parse(err) => Some(err),
            Self::Logging(_) => None,
            Self::Model(err) => Some(err),
        }
    }
}

impl From<ModelError> for ConfigError {
    fn from(value: ModelError) -> Self {
        Self::Model(value)
    }
}

/// Starts logging (if configured) and opens a model over the configured
/// backend.
pub fn bootstrap(config: &CoreConfig) -> Result<TodoModel<Box<dyn Store>>, ConfigError> {
    if let Some(logging) = config.logging.as_ref() {
        let level = logging.level.as_deref().unwrap_or(default_log_level());
        init_logging(level, &logging.log_dir).map_err(ConfigError::Logging)?;
    }

    let (tasks, categories) = open_stores(&config.storage)?;
    let model = TodoModel::new(tasks, categories)?;
    info!(
        "event=bootstrap module=config status=ok backend={}",
        match config.storage {
            StorageConfig::Memory => "memory",
            StorageConfig::Sqlite { .. } => "sqlite",
        }
    );
    Ok(model)
}

fn open_stores(storage: &StorageConfig) -> Result<(Box<dyn Store>, Box<dyn Store>), ModelError> {
    match storage {
        StorageConfig::Memory => {
            let tasks: Box<dyn Store> = Box::new(MemoryStore::new(TASKS_COLLECTION));
            let categories: Box<dyn Store> = Box::new(MemoryStore::new(CATEGORIES_COLLECTION));
            Ok((tasks, categories))
        }
        StorageConfig::Sqlite { path } => {
            let tasks: Box<dyn Store> = Box::new(SqliteStore::open(path, TASKS_COLLECTION)?);
            let categories: Box<dyn Store> =
                Box::new(SqliteStore::open(path, CATEGORIES_COLLECTION)?);
            Ok((tasks, categories))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{CoreConfig, StorageConfig};

    #[test]
    fn empty_document_defaults_to_memory_without_logging() {
        let config = CoreConfig::from_json_str("{}").unwrap();
        assert_eq!(config, CoreConfig::default());
        assert_eq!(config.storage, StorageConfig::Memory);
    }

    #[test]
    fn sqlite_backend_parses_path() {
        let config =
            CoreConfig::from_json_str(r#"{"storage": {"backend": "sqlite", "path": "/tmp/t.db"}}"#)
                .unwrap();
        assert_eq!(
            config.storage,
            StorageConfig::Sqlite {
                path: "/tmp/t.db".into()
            }
        );
    }

    #[test]
    fn unknown_top_level_keys_are_rejected() {
        assert!(CoreConfig::from_json_str(r#"{"store": {}}"#).is_err());
    }
}
