use parity_core::CanonicalRequest;
use serde::{Deserialize, Serialize};

use crate::raw_http::parse_message;

const SEPARATOR: &str = "###";

/// One request of a `###`-delimited request file. Line numbers are 0-based
/// and inclusive; `start_line` points at the separator when there is one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestBlock {
    pub name: String,
    pub request: CanonicalRequest,
    pub start_line: usize,
    pub end_line: usize,
}

/// Returns the first block of the file that holds a request.
pub fn extract_first_block(text: &str) -> Option<CanonicalRequest> {
    parse_all_blocks(text)
        .into_iter()
        .next()
        .map(|block| block.request)
}

pub fn parse_all_blocks(text: &str) -> Vec<RequestBlock> {
    let normalized = text.replace("\r\n", "\n");
    let lines: Vec<&str> = normalized.split('\n').collect();
    let last_line = lines.len().saturating_sub(1);

    let separators: Vec<usize> = lines
        .iter()
        .enumerate()
        .filter(|(_, line)| line.trim_start().starts_with(SEPARATOR))
        .map(|(index, _)| index)
        .collect();

    if separators.is_empty() {
        return parse_message(&lines, true)
            .map(|request| RequestBlock {
                name: "Request".to_string(),
                request,
                start_line: 0,
                end_line: last_line,
            })
            .into_iter()
            .collect();
    }

    let mut blocks = Vec::new();
    let first = separators[0];
    if first > 0 {
        if let Some(request) = parse_message(&lines[..first], true) {
            blocks.push(RequestBlock {
                name: "Request".to_string(),
                request,
                start_line: 0,
                end_line: first - 1,
            });
        }
    }
    for (position, &start) in separators.iter().enumerate() {
        let end = separators
            .get(position + 1)
            .map(|next| next - 1)
            .unwrap_or(last_line);
        let label = lines[start].trim_start()[SEPARATOR.len()..].trim();
        let name = if label.is_empty() {
            format!("Request {}", position + 1)
        } else {
            label.to_string()
        };
        if let Some(request) = parse_message(&lines[start + 1..=end.max(start)], true) {
            blocks.push(RequestBlock {
                name,
                request,
                start_line: start,
                end_line: end,
            });
        }
    }
    blocks
}
