use parity_core::{FailureKind, ResultError};

use crate::RequestError;

pub const CANCELLED_MESSAGE: &str = "Request cancelled";

const DNS_PATTERNS: &[&str] = &[
    "dns",
    "lookup",
    "getaddrinfo",
    "enotfound",
    "name or service not known",
    "nodename nor servname",
    "no such host",
];

const CONNECTION_PATTERNS: &[&str] = &[
    "refused",
    "reset",
    "econnrefused",
    "econnreset",
    "etimedout",
    "connection timed out",
    "connection aborted",
    "broken pipe",
    "network is unreachable",
    "host is unreachable",
    "not connected",
];

const TLS_PATTERNS: &[&str] = &[
    "certificate",
    "ssl",
    "tls",
    "handshake",
    "self signed",
    "self-signed",
];

const TIMEOUT_PATTERNS: &[&str] = &["timed out", "timeout", "deadline"];

/// Maps a transport failure onto the fixed failure taxonomy. Checks run in
/// order: cancelled, dns, connection, tls, timeout, unknown.
pub fn classify_message(aborted: bool, message: &str) -> ResultError {
    if aborted {
        return ResultError {
            kind: FailureKind::Cancelled,
            message: CANCELLED_MESSAGE.to_string(),
        };
    }
    let lowered = message.to_lowercase();
    let matches = |patterns: &[&str]| patterns.iter().any(|pattern| lowered.contains(pattern));

    let kind = if matches(DNS_PATTERNS) {
        FailureKind::Dns
    } else if matches(CONNECTION_PATTERNS) {
        FailureKind::Connection
    } else if matches(TLS_PATTERNS) {
        FailureKind::Tls
    } else if matches(TIMEOUT_PATTERNS) {
        FailureKind::Timeout
    } else {
        FailureKind::Unknown
    };
    ResultError {
        kind,
        message: message.to_string(),
    }
}

pub fn classify_error(error: &RequestError) -> ResultError {
    classify_message(matches!(error, RequestError::Cancelled), &error.to_string())
}
