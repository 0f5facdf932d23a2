use std::collections::BTreeMap;

use parity_codec::{ContentEncoding, bytes_to_string_lossy, decode_content, decode_content_prefix};
use parity_core::CanonicalResult;

use crate::Response;

pub const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;
pub const TRUNCATION_MARKER: &str = "\n[... truncated at 10MB ...]";

/// Lower-cases header names and joins repeated headers with `, `.
pub fn normalize_headers(headers: &[(String, String)]) -> BTreeMap<String, String> {
    let mut normalized: BTreeMap<String, String> = BTreeMap::new();
    for (name, value) in headers {
        let name = name.trim().to_ascii_lowercase();
        normalized
            .entry(name)
            .and_modify(|existing| {
                existing.push_str(", ");
                existing.push_str(value);
            })
            .or_insert_with(|| value.clone());
    }
    normalized
}

/// Decodes the body per `content-encoding` and marks capped bodies. A capped
/// compressed body keeps whatever prefix decodes; raw bytes are used only
/// when nothing decodes.
pub fn normalize_body(content_encoding: Option<&str>, body: &[u8], truncated: bool) -> String {
    let encoding = ContentEncoding::from_header(content_encoding);
    let mut text = match decode_content(encoding, body) {
        Ok(decoded) => bytes_to_string_lossy(&decoded),
        Err(_) if truncated => {
            let prefix = decode_content_prefix(encoding, body);
            if prefix.is_empty() {
                bytes_to_string_lossy(body)
            } else {
                bytes_to_string_lossy(&prefix)
            }
        }
        Err(_) => bytes_to_string_lossy(body),
    };
    if truncated {
        text.push_str(TRUNCATION_MARKER);
    }
    text
}

pub fn normalize_response(target: &str, duration_ms: u64, response: &Response) -> CanonicalResult {
    let headers = normalize_headers(&response.headers);
    let body = normalize_body(
        headers.get("content-encoding").map(String::as_str),
        &response.body,
        response.truncated,
    );
    CanonicalResult::success(target, response.status, duration_ms, headers, body)
}
