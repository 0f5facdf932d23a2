use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{CanonicalRequest, CanonicalResult, Target};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    Recorded,
    Duplicate,
    UnknownTarget,
}

/// What the history collaborator receives for a finished session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub session_id: String,
    pub method: String,
    pub path: String,
    pub targets: Vec<String>,
    pub status_summary: BTreeMap<String, String>,
    pub started_at: DateTime<Utc>,
}

/// One replay run. Results are keyed by target base URL; the first result
/// for a target wins.
#[derive(Debug, Clone)]
pub struct ExecutionSession {
    pub id: String,
    pub request: CanonicalRequest,
    pub targets: Vec<Target>,
    pub started_at: DateTime<Utc>,
    results: HashMap<String, CanonicalResult>,
}

impl ExecutionSession {
    pub fn new(id: impl Into<String>, request: CanonicalRequest, targets: Vec<Target>) -> Self {
        Self {
            id: id.into(),
            request,
            targets,
            started_at: Utc::now(),
            results: HashMap::new(),
        }
    }

    pub fn record(&mut self, result: CanonicalResult) -> RecordOutcome {
        if !self
            .targets
            .iter()
            .any(|target| target.base_url == result.target)
        {
            return RecordOutcome::UnknownTarget;
        }
        if self.results.contains_key(&result.target) {
            return RecordOutcome::Duplicate;
        }
        self.results.insert(result.target.clone(), result);
        RecordOutcome::Recorded
    }

    pub fn received(&self) -> usize {
        self.results.len()
    }

    pub fn is_complete(&self) -> bool {
        self.results.len() == self.targets.len()
    }

    pub fn result_for(&self, base_url: &str) -> Option<&CanonicalResult> {
        self.results.get(base_url)
    }

    /// Results in target-list order; targets without a result are skipped.
    pub fn ordered_results(&self) -> Vec<CanonicalResult> {
        self.targets
            .iter()
            .filter_map(|target| self.results.get(&target.base_url).cloned())
            .collect()
    }

    pub fn summary(&self) -> SessionSummary {
        let status_summary = self
            .results
            .iter()
            .map(|(target, result)| (target.clone(), result.status_or_error_kind()))
            .collect();
        SessionSummary {
            session_id: self.id.clone(),
            method: self.request.method.clone(),
            path: self.request.path.clone(),
            targets: self
                .targets
                .iter()
                .map(|target| target.base_url.clone())
                .collect(),
            status_summary,
            started_at: self.started_at,
        }
    }
}
