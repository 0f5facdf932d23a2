use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RequestError {
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    #[error("invalid method: {0}")]
    InvalidMethod(String),
    #[error("dns lookup failed for {host}: {message}")]
    Dns { host: String, message: String },
    #[error("connect failed: {0}")]
    Connect(String),
    #[error("tls handshake failed: {0}")]
    Tls(String),
    #[error("io error: {0}")]
    Io(String),
    #[error("invalid response: {0}")]
    Protocol(String),
    #[error("request timed out after {0} ms")]
    Timeout(u64),
    #[error("too many redirects (limit {0})")]
    TooManyRedirects(usize),
    #[error("Request cancelled")]
    Cancelled,
}
