use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::ModelError;

/// Body paths left out of diffs unless configured otherwise.
pub const DEFAULT_IGNORE_PATHS: &[&str] = &["$.timestamp", "$.traceId", "$.meta.requestId"];

/// Lower-cases a header name and trims surrounding whitespace.
pub fn normalize_header_name(name: &str) -> String {
    name.trim().to_ascii_lowercase()
}

/// Format-agnostic request produced by the extractors.
///
/// Header names are always lower-case and `host` is never stored: the
/// authority comes from the target at dispatch time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalRequest {
    pub method: String,
    pub path: String,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
}

impl CanonicalRequest {
    pub fn new(method: &str, path: impl Into<String>) -> Self {
        Self {
            method: method.trim().to_ascii_uppercase(),
            path: path.into(),
            headers: BTreeMap::new(),
            query: None,
            body: None,
        }
    }

    /// Inserts a header, last write wins. `host` is silently dropped.
    pub fn set_header(&mut self, name: &str, value: impl Into<String>) {
        let name = normalize_header_name(name);
        if name.is_empty() || name == "host" {
            return;
        }
        self.headers.insert(name, value.into());
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&normalize_header_name(name))
            .map(String::as_str)
    }

    pub fn has_header(&self, name: &str) -> bool {
        self.header(name).is_some()
    }

    /// Empty query maps are stored as `None`.
    pub fn with_query(mut self, query: BTreeMap<String, String>) -> Self {
        self.query = if query.is_empty() { None } else { Some(query) };
        self
    }

    /// Empty bodies are stored as `None`.
    pub fn with_body(mut self, body: Option<String>) -> Self {
        self.body = body.filter(|body| !body.is_empty());
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Target {
    pub name: String,
    pub base_url: String,
}

impl Target {
    pub fn new(name: impl Into<String>, base_url: &str) -> Result<Self, ModelError> {
        parse_base_url(base_url)?;
        Ok(Self {
            name: name.into(),
            base_url: base_url.trim().to_string(),
        })
    }

    /// Builds a target named after its `host[:port]`, or `Target N` when the
    /// URL carries no host.
    pub fn from_url(base_url: &str, position: usize) -> Result<Self, ModelError> {
        let url = parse_base_url(base_url)?;
        let name = match (url.host_str(), url.port()) {
            (Some(host), Some(port)) => format!("{host}:{port}"),
            (Some(host), None) => host.to_string(),
            (None, _) => format!("Target {}", position + 1),
        };
        Ok(Self {
            name,
            base_url: base_url.trim().to_string(),
        })
    }

    pub fn url(&self) -> Result<Url, ModelError> {
        parse_base_url(&self.base_url)
    }
}

fn parse_base_url(base_url: &str) -> Result<Url, ModelError> {
    let trimmed = base_url.trim();
    let url = Url::parse(trimmed)
        .map_err(|err| ModelError::InvalidTargetUrl(trimmed.to_string(), err.to_string()))?;
    match url.scheme() {
        "http" | "https" if url.has_host() => Ok(url),
        _ => Err(ModelError::UnsupportedTargetUrl(trimmed.to_string())),
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum FailureKind {
    Connection,
    Dns,
    Tls,
    Timeout,
    Cancelled,
    Unknown,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Connection => "connection",
            Self::Dns => "dns",
            Self::Tls => "tls",
            Self::Timeout => "timeout",
            Self::Cancelled => "cancelled",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResultError {
    pub kind: FailureKind,
    pub message: String,
}

/// Outcome of replaying against one target. `status` is 0 exactly when
/// `error` is present.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalResult {
    pub target: String,
    pub status: u16,
    pub duration_ms: u64,
    pub headers: BTreeMap<String, String>,
    pub body: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ResultError>,
}

impl CanonicalResult {
    pub fn success(
        target: impl Into<String>,
        status: u16,
        duration_ms: u64,
        headers: BTreeMap<String, String>,
        body: String,
    ) -> Self {
        Self {
            target: target.into(),
            status,
            duration_ms,
            headers,
            body,
            error: None,
        }
    }

    pub fn failure(target: impl Into<String>, duration_ms: u64, error: ResultError) -> Self {
        Self {
            target: target.into(),
            status: 0,
            duration_ms,
            headers: BTreeMap::new(),
            body: String::new(),
            error: Some(error),
        }
    }

    pub fn is_failure(&self) -> bool {
        self.error.is_some()
    }

    /// Status code, or the failure kind for transport errors.
    pub fn status_or_error_kind(&self) -> String {
        match &self.error {
            Some(error) => error.kind.to_string(),
            None => self.status.to_string(),
        }
    }
}

/// Lifecycle stage of a single target's execution. Ordering follows the
/// lifecycle so phase transitions can be checked with `<`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Connecting,
    Sending,
    Receiving,
    Done,
}

impl Phase {
    pub fn is_active(&self) -> bool {
        !matches!(self, Self::Done)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Connecting => "connecting",
            Self::Sending => "sending",
            Self::Receiving => "receiving",
            Self::Done => "done",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct ReplayOptions {
    /// Zero disables the request deadline.
    pub timeout_ms: u64,
    pub follow_redirects: bool,
    pub allow_insecure_tls: bool,
    pub default_headers: BTreeMap<String, String>,
    pub concurrency_limit: usize,
}

impl Default for ReplayOptions {
    fn default() -> Self {
        Self {
            timeout_ms: 30_000,
            follow_redirects: true,
            allow_insecure_tls: false,
            default_headers: BTreeMap::new(),
            concurrency_limit: 5,
        }
    }
}

impl ReplayOptions {
    pub fn validate(&self) -> Result<(), ModelError> {
        if self.concurrency_limit == 0 {
            return Err(ModelError::InvalidConcurrency);
        }
        Ok(())
    }
}
