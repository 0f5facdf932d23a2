use std::sync::LazyLock;

use parity_core::CanonicalRequest;
use regex::Regex;
use url::Url;

use crate::query::{parse_query_string, split_path_query};
use crate::raw_http::VERBS;

static REQUEST_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"(?i)REQUEST\s+({VERBS})\s+(/\S*)(.*)"))
        .expect("valid request marker regex")
});

static OUTGOING_ARROW: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?i)(?:-->|>>|outgoing request:?)\s*({VERBS})\s+(https?://\S+|/\S*)"
    ))
    .expect("valid outgoing request regex")
});

static BARE_VERB_PATH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r#"(?i)\b({VERBS})\s+(/[^\s"]*)"#)).expect("valid verb path regex")
});

static BODY_ANNOTATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bbody=").expect("valid body annotation regex"));

static HEADER_ANNOTATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bheader=([^:,\s]+):([^,\s]+)").expect("valid header annotation regex")
});

static NEXT_HEADER_ANNOTATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\s+header=").expect("valid header boundary regex"));

/// Scans log output line by line and returns the first request it recognizes.
pub fn extract_log(text: &str) -> Option<CanonicalRequest> {
    text.lines().find_map(|line| {
        request_marker(line)
            .or_else(|| outgoing_arrow(line))
            .or_else(|| bare_verb_path(line))
    })
}

fn request_marker(line: &str) -> Option<CanonicalRequest> {
    let captures = REQUEST_MARKER.captures(line)?;
    let (path, query) = split_path_query(&captures[2]);
    let mut request = CanonicalRequest::new(&captures[1], path).with_query(query);

    let rest = captures.get(3).map(|m| m.as_str()).unwrap_or_default();
    for header in HEADER_ANNOTATION.captures_iter(rest) {
        request.set_header(&header[1], header[2].trim());
    }
    Some(request.with_body(body_annotation(rest)))
}

fn outgoing_arrow(line: &str) -> Option<CanonicalRequest> {
    let captures = OUTGOING_ARROW.captures(line)?;
    let target = &captures[2];
    let (path, query) = if target.starts_with('/') {
        split_path_query(target)
    } else {
        let url = Url::parse(target).ok()?;
        let query = url.query().map(parse_query_string).unwrap_or_default();
        (url.path().to_string(), query)
    };
    Some(CanonicalRequest::new(&captures[1], path).with_query(query))
}

fn bare_verb_path(line: &str) -> Option<CanonicalRequest> {
    let captures = BARE_VERB_PATH.captures(line)?;
    let target = captures[2].trim_end_matches(['"', ',']);
    let (path, query) = split_path_query(target);
    Some(CanonicalRequest::new(&captures[1], path).with_query(query))
}

/// `body=` is either quoted with `'`/`"` (closing quote optional) or runs to
/// the next `header=` annotation or the end of the line.
fn body_annotation(rest: &str) -> Option<String> {
    let start = BODY_ANNOTATION.find(rest)?.end();
    let value = &rest[start..];
    let body = match value.chars().next() {
        Some(quote @ ('"' | '\'')) => {
            let inner = &value[1..];
            inner.find(quote).map_or(inner, |end| &inner[..end])
        }
        _ => {
            let end = NEXT_HEADER_ANNOTATION
                .find(value)
                .map_or(value.len(), |m| m.start());
            value[..end].trim()
        }
    };
    Some(body.to_string())
}
