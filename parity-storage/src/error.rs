use thiserror::Error;

use crate::SchemaError;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("io error: {0}")]
    Io(String),
    #[error("config error: {0}")]
    Config(String),
    #[error("invalid config: {0}")]
    InvalidConfig(String),
    #[error("sqlite error: {0}")]
    Sqlite(String),
    #[error("corrupt history row {id}: {message}")]
    CorruptRow { id: String, message: String },
    #[error(transparent)]
    Schema(#[from] SchemaError),
    #[error("history worker stopped")]
    WorkerStopped,
}
