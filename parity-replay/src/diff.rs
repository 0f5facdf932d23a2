use std::collections::{BTreeMap, BTreeSet, HashSet};

use parity_core::CanonicalResult;
use serde_json::Value;
use similar::{ChangeTag, TextDiff};

use crate::{BodyDiff, DiffKind, DiffNode, DiffOptions, DiffResult, DiffSummary, StatusDiff};

pub fn diff_results(
    left: &CanonicalResult,
    right: &CanonicalResult,
    options: &DiffOptions,
) -> DiffResult {
    let body = diff_bodies(&left.body, &right.body, options);
    let text_diff = (!body.is_json).then(|| render_text_diff(&left.body, &right.body));
    DiffResult {
        body_diff: body.nodes,
        header_diff: diff_headers(&left.headers, &right.headers),
        status_diff: StatusDiff {
            left: left.status,
            right: right.status,
            changed: left.status != right.status,
        },
        is_json_diff: body.is_json,
        left_raw: left.body.clone(),
        right_raw: right.body.clone(),
        text_diff,
    }
}

/// Structural diff when either side is JSON, the unparseable side standing
/// in as a string; otherwise a single opaque text node.
pub fn diff_bodies(left: &str, right: &str, options: &DiffOptions) -> BodyDiff {
    let left_json = parse_json(left);
    let right_json = parse_json(right);
    if left_json.is_none() && right_json.is_none() {
        return BodyDiff {
            nodes: vec![diff_text(left, right)],
            is_json: false,
        };
    }

    let left_value = left_json.unwrap_or_else(|| Value::String(left.to_string()));
    let right_value = right_json.unwrap_or_else(|| Value::String(right.to_string()));
    let ignore: HashSet<&str> = options
        .ignore_paths
        .iter()
        .map(|path| path.trim())
        .collect();
    let mut nodes = Vec::new();
    diff_json_values(&left_value, &right_value, "$", &ignore, &mut nodes);
    BodyDiff {
        nodes,
        is_json: true,
    }
}

fn parse_json(text: &str) -> Option<Value> {
    let trimmed = text.trim();
    if !trimmed.starts_with('{') && !trimmed.starts_with('[') {
        return None;
    }
    serde_json::from_str(trimmed).ok()
}

/// Pre-order walk appending one node per compared location to `out`.
pub fn diff_json_values(
    left: &Value,
    right: &Value,
    path: &str,
    ignore: &HashSet<&str>,
    out: &mut Vec<DiffNode>,
) {
    if ignore.contains(path) {
        return;
    }
    match (left, right) {
        (Value::Object(left_map), Value::Object(right_map)) => {
            let keys: BTreeSet<&String> = left_map.keys().chain(right_map.keys()).collect();
            for key in keys {
                let child = format!("{path}.{key}");
                if ignore.contains(child.as_str()) {
                    continue;
                }
                match (left_map.get(key), right_map.get(key)) {
                    (Some(l), Some(r)) => diff_json_values(l, r, &child, ignore, out),
                    (None, Some(r)) => out.push(DiffNode::added(child, r.clone())),
                    (Some(l), None) => out.push(DiffNode::removed(child, l.clone())),
                    (None, None) => {}
                }
            }
        }
        (Value::Array(left_items), Value::Array(right_items)) => {
            for index in 0..left_items.len().max(right_items.len()) {
                let child = format!("{path}[{index}]");
                if ignore.contains(child.as_str()) {
                    continue;
                }
                match (left_items.get(index), right_items.get(index)) {
                    (Some(l), Some(r)) => diff_json_values(l, r, &child, ignore, out),
                    (None, Some(r)) => out.push(DiffNode::added(child, r.clone())),
                    (Some(l), None) => out.push(DiffNode::removed(child, l.clone())),
                    (None, None) => {}
                }
            }
        }
        _ => {
            let kind = if scalar_eq(left, right) {
                DiffKind::Unchanged
            } else {
                DiffKind::Changed
            };
            out.push(DiffNode::compared(path, kind, left.clone(), right.clone()));
        }
    }
}

/// Strict equality, except numbers compare by value so `1` equals `1.0`.
fn scalar_eq(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Number(l), Value::Number(r)) => {
            if let (Some(l), Some(r)) = (l.as_i64(), r.as_i64()) {
                return l == r;
            }
            if let (Some(l), Some(r)) = (l.as_u64(), r.as_u64()) {
                return l == r;
            }
            l.as_f64() == r.as_f64()
        }
        _ => left == right,
    }
}

/// Header maps compared over the case-insensitive key union, sorted.
pub fn diff_headers(
    left: &BTreeMap<String, String>,
    right: &BTreeMap<String, String>,
) -> Vec<DiffNode> {
    let lower = |map: &BTreeMap<String, String>| -> BTreeMap<String, String> {
        map.iter()
            .map(|(name, value)| (name.to_ascii_lowercase(), value.clone()))
            .collect()
    };
    let left = lower(left);
    let right = lower(right);
    let keys: BTreeSet<&String> = left.keys().chain(right.keys()).collect();

    keys.into_iter()
        .filter_map(|key| match (left.get(key), right.get(key)) {
            (Some(l), Some(r)) => {
                let kind = if l == r {
                    DiffKind::Unchanged
                } else {
                    DiffKind::Changed
                };
                Some(DiffNode::compared(
                    key.as_str(),
                    kind,
                    Value::String(l.clone()),
                    Value::String(r.clone()),
                ))
            }
            (None, Some(r)) => Some(DiffNode::added(key.as_str(), Value::String(r.clone()))),
            (Some(l), None) => Some(DiffNode::removed(key.as_str(), Value::String(l.clone()))),
            (None, None) => None,
        })
        .collect()
}

pub fn diff_text(left: &str, right: &str) -> DiffNode {
    let kind = if left == right {
        DiffKind::Unchanged
    } else {
        DiffKind::Changed
    };
    DiffNode::compared(
        "$",
        kind,
        Value::String(left.to_string()),
        Value::String(right.to_string()),
    )
}

/// Line diff with `-`/`+`/` ` prefixes.
pub fn render_text_diff(left: &str, right: &str) -> String {
    let diff = TextDiff::from_lines(left, right);
    let mut output = String::new();
    for change in diff.iter_all_changes() {
        let prefix = match change.tag() {
            ChangeTag::Delete => "-",
            ChangeTag::Insert => "+",
            ChangeTag::Equal => " ",
        };
        output.push_str(prefix);
        output.push_str(change.value());
        if change.missing_newline() {
            output.push('\n');
        }
    }
    output
}

pub fn summarize<'a>(nodes: impl IntoIterator<Item = &'a DiffNode>) -> DiffSummary {
    let mut summary = DiffSummary::default();
    for node in nodes {
        match node.kind {
            DiffKind::Added => summary.added += 1,
            DiffKind::Removed => summary.removed += 1,
            DiffKind::Changed => summary.changed += 1,
            DiffKind::Unchanged => {}
        }
    }
    summary.total = summary.added + summary.removed + summary.changed;
    summary.has_diff = summary.total > 0;
    summary
}
