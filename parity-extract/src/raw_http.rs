use std::sync::LazyLock;

use parity_core::CanonicalRequest;
use regex::Regex;

use crate::query::split_path_query;

pub(crate) const VERBS: &str = "GET|POST|PUT|PATCH|DELETE|HEAD|OPTIONS|TRACE";

static REQUEST_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?i)^({VERBS})\s+(\S+)(?:\s+HTTP/[\d.]+)?\s*$"
    ))
    .expect("valid request line regex")
});

/// Parses a wire-format request: request line, headers up to the first
/// blank line, then the body.
pub fn extract_raw_http(text: &str) -> Option<CanonicalRequest> {
    let normalized = text.replace("\r\n", "\n");
    let lines: Vec<&str> = normalized.split('\n').collect();
    parse_message(&lines, false)
}

/// Returns the `(method, target)` pair of a request line.
pub(crate) fn request_line(line: &str) -> Option<(String, String)> {
    let captures = REQUEST_LINE.captures(line.trim())?;
    Some((captures[1].to_string(), captures[2].to_string()))
}

/// Shared by the raw and block extractors. With `skip_comments`, lines
/// starting with `#` are ignored before the request line and among headers.
pub(crate) fn parse_message(lines: &[&str], skip_comments: bool) -> Option<CanonicalRequest> {
    let is_comment = |line: &str| skip_comments && line.trim_start().starts_with('#');

    let mut cursor = 0;
    while cursor < lines.len() && (lines[cursor].trim().is_empty() || is_comment(lines[cursor])) {
        cursor += 1;
    }
    let (method, target) = request_line(lines.get(cursor)?)?;
    cursor += 1;

    let (path, query) = split_path_query(&target);
    let mut request = CanonicalRequest::new(&method, path).with_query(query);

    while cursor < lines.len() {
        let line = lines[cursor];
        cursor += 1;
        if line.trim().is_empty() {
            break;
        }
        if is_comment(line) {
            continue;
        }
        if let Some((name, value)) = line.split_once(':') {
            request.set_header(name, value.trim());
        }
    }

    let body = lines.get(cursor..).unwrap_or_default().join("\n");
    let body = body.trim();
    Some(request.with_body((!body.is_empty()).then(|| body.to_string())))
}
