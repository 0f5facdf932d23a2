use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ModelError {
    #[error("invalid target url {0}: {1}")]
    InvalidTargetUrl(String, String),
    #[error("target url must be absolute http(s): {0}")]
    UnsupportedTargetUrl(String),
    #[error("concurrency limit must be at least 1")]
    InvalidConcurrency,
}

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("malformed message: {0}")]
    Malformed(String),
    #[error("message encoding failed: {0}")]
    Encode(String),
}
