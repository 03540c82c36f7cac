//! Core domain logic for the categorized todo list.
//! This crate is the single source of truth for task/category integrity.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod service;
pub mod store;

pub use config::{bootstrap, ConfigError, CoreConfig, LoggingConfig, StorageConfig};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::record::{Fields, Record, RecordId, RecordIdParseError};
pub use model::task::{
    Category, ReadQuery, Task, TaskCounts, TaskFilter, TaskPatch, TaskView,
};
pub use service::todo_model::{ModelError, ModelResult, TodoModel};
pub use store::memory_store::MemoryStore;
pub use store::sqlite_store::SqliteStore;
pub use store::{Store, StoreError, StoreResult};

/// Collection name used for task records.
pub const TASKS_COLLECTION: &str = "tasks";
/// Collection name used for category records.
pub const CATEGORIES_COLLECTION: &str = "categories";

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
