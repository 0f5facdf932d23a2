use std::fmt;
use std::sync::LazyLock;

use parity_core::CanonicalRequest;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::blocks::extract_first_block;
use crate::curl::{extract_curl, looks_like_curl};
use crate::log::extract_log;
use crate::raw_http::{VERBS, extract_raw_http, request_line};

static BLOCK_SEPARATOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^###").expect("valid separator regex"));

static LOG_REQUEST: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"(?i)REQUEST\s+({VERBS})\s+/\S*")).expect("valid log request regex")
});

pub const UNDETECTED_REASON: &str = "Could not detect HTTP request format in selection";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SourceFormat {
    Curl,
    RawHttp,
    Blocks,
    Log,
    Har,
    Unknown,
}

impl SourceFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Curl => "curl",
            Self::RawHttp => "rawHttp",
            Self::Blocks => "blocks",
            Self::Log => "log",
            Self::Har => "har",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for SourceFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of [`extract_request`]. `reason` is set whenever `request` is not.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Extraction {
    pub request: Option<CanonicalRequest>,
    pub format: SourceFormat,
    pub reason: Option<String>,
}

struct Strategy {
    format: SourceFormat,
    matches: fn(&str) -> bool,
    parse: fn(&str) -> Option<CanonicalRequest>,
}

const STRATEGIES: [Strategy; 4] = [
    Strategy {
        format: SourceFormat::Curl,
        matches: looks_like_curl,
        parse: extract_curl,
    },
    Strategy {
        format: SourceFormat::RawHttp,
        matches: starts_with_request_line,
        parse: extract_raw_http,
    },
    Strategy {
        format: SourceFormat::Blocks,
        matches: has_block_separator,
        parse: extract_first_block,
    },
    Strategy {
        format: SourceFormat::Log,
        matches: has_log_request,
        parse: extract_log,
    },
];

fn starts_with_request_line(text: &str) -> bool {
    text.lines()
        .find(|line| !line.trim().is_empty())
        .and_then(request_line)
        .is_some()
}

fn has_block_separator(text: &str) -> bool {
    BLOCK_SEPARATOR.is_match(text)
}

fn has_log_request(text: &str) -> bool {
    LOG_REQUEST.is_match(text)
}

pub fn detect_format(text: &str) -> SourceFormat {
    STRATEGIES
        .iter()
        .find(|strategy| (strategy.matches)(text))
        .map_or(SourceFormat::Unknown, |strategy| strategy.format)
}

/// Detects the format of `text` and runs the matching extractor. Unknown
/// input is still offered to the raw-HTTP parser before giving up.
pub fn extract_request(text: &str) -> Extraction {
    let Some(strategy) = STRATEGIES.iter().find(|strategy| (strategy.matches)(text)) else {
        return match extract_raw_http(text) {
            Some(request) => Extraction {
                request: Some(request),
                format: SourceFormat::RawHttp,
                reason: None,
            },
            None => Extraction {
                request: None,
                format: SourceFormat::Unknown,
                reason: Some(UNDETECTED_REASON.to_string()),
            },
        };
    };

    match (strategy.parse)(text) {
        Some(request) => Extraction {
            request: Some(request),
            format: strategy.format,
            reason: None,
        },
        None => Extraction {
            request: None,
            format: strategy.format,
            reason: Some(format!(
                "Detected {} format but could not extract a request",
                strategy.format
            )),
        },
    }
}
