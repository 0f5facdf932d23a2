use parity_core::{CanonicalResult, Phase};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchEvent {
    Progress { target: String, phase: Phase },
    Result(CanonicalResult),
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum DiffKind {
    Added,
    Removed,
    Changed,
    Unchanged,
}

/// One compared location. Header nodes use the lower-cased header name as
/// path, body nodes a `$`-rooted JSONPath-like string.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DiffNode {
    pub path: String,
    pub kind: DiffKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub left_value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub right_value: Option<Value>,
}

impl DiffNode {
    pub fn added(path: impl Into<String>, right: Value) -> Self {
        Self {
            path: path.into(),
            kind: DiffKind::Added,
            left_value: None,
            right_value: Some(right),
        }
    }

    pub fn removed(path: impl Into<String>, left: Value) -> Self {
        Self {
            path: path.into(),
            kind: DiffKind::Removed,
            left_value: Some(left),
            right_value: None,
        }
    }

    pub fn compared(path: impl Into<String>, kind: DiffKind, left: Value, right: Value) -> Self {
        Self {
            path: path.into(),
            kind,
            left_value: Some(left),
            right_value: Some(right),
        }
    }

    pub fn is_change(&self) -> bool {
        self.kind != DiffKind::Unchanged
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct StatusDiff {
    pub left: u16,
    pub right: u16,
    pub changed: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct DiffSummary {
    pub added: usize,
    pub removed: usize,
    pub changed: usize,
    pub total: usize,
    pub has_diff: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BodyDiff {
    pub nodes: Vec<DiffNode>,
    pub is_json: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DiffResult {
    pub body_diff: Vec<DiffNode>,
    pub header_diff: Vec<DiffNode>,
    pub status_diff: StatusDiff,
    pub is_json_diff: bool,
    pub left_raw: String,
    pub right_raw: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_diff: Option<String>,
}

impl DiffResult {
    /// Header and body changes plus one `changed` for a differing status.
    pub fn summary(&self) -> DiffSummary {
        let mut summary = crate::summarize(self.header_diff.iter().chain(&self.body_diff));
        if self.status_diff.changed {
            summary.changed += 1;
            summary.total += 1;
            summary.has_diff = true;
        }
        summary
    }

    pub fn body_changes(&self) -> impl Iterator<Item = &DiffNode> {
        self.body_diff.iter().filter(|node| node.is_change())
    }

    pub fn header_changes(&self) -> impl Iterator<Item = &DiffNode> {
        self.header_diff.iter().filter(|node| node.is_change())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct DiffOptions {
    pub ignore_paths: Vec<String>,
}

impl DiffOptions {
    pub fn new<I, S>(ignore_paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            ignore_paths: ignore_paths.into_iter().map(Into::into).collect(),
        }
    }
}
