use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RuntimeError {
    #[error("no targets to replay against")]
    NoTargets,
    #[error("invalid replay options: {0}")]
    InvalidOptions(String),
    #[error("failed to start execution unit: {0}")]
    Spawn(String),
    #[error("execution unit is not accepting messages")]
    UnitUnavailable,
    #[error("update channel closed")]
    Disconnected,
}
