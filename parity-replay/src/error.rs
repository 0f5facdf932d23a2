use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ReplayError {
    #[error("invalid options: {0}")]
    InvalidOptions(String),
    #[error("no targets to replay against")]
    NoTargets,
}
