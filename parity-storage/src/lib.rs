mod config;
mod error;
mod history;
mod schema;
mod sqlite;
#[cfg(test)]
mod sqlite_test;
mod worker;
#[cfg(test)]
mod worker_test;

pub use config::{DEFAULT_CONFIG_FILE, HistoryConfig, ParityConfig};
pub use error::StorageError;
pub use history::{HistoryEntry, HistorySink, HistoryStore};
pub use schema::{SchemaCatalog, SchemaError, SchemaSpec, TableSpec};
pub use sqlite::SqliteHistoryStore;
pub use worker::{HistoryWorkerConfig, HistoryWorkerHandle, spawn_history_worker};
