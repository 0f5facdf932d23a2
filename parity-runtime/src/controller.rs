use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, unbounded};
use parity_core::{
    CanonicalRequest, CanonicalResult, ExecutionSession, Phase, RecordOutcome, ReplayOptions,
    GLOBAL_SESSION_ID, Target, WorkerMessage,
};
use parity_storage::{HistoryEntry, HistorySink};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{ExecutionUnit, RuntimeError, WorkerPool};

/// What the presentation layer is told about running sessions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplayUpdate {
    Progress {
        session_id: String,
        target: String,
        phase: Phase,
    },
    Result {
        session_id: String,
        result: CanonicalResult,
    },
    /// Every target has reported; results follow the session's target order.
    Complete {
        session_id: String,
        results: Vec<CanonicalResult>,
    },
    /// The session was rejected or crashed inside the execution unit.
    Failed { session_id: String, message: String },
    /// The execution unit died; the listed sessions will never complete.
    UnitFailed {
        message: String,
        abandoned: Vec<String>,
    },
}

/// In-flight sessions, by id.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: HashMap<String, ExecutionSession>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, session: ExecutionSession) {
        self.sessions.insert(session.id.clone(), session);
    }

    pub fn get(&self, session_id: &str) -> Option<&ExecutionSession> {
        self.sessions.get(session_id)
    }

    pub fn get_mut(&mut self, session_id: &str) -> Option<&mut ExecutionSession> {
        self.sessions.get_mut(session_id)
    }

    pub fn remove(&mut self, session_id: &str) -> Option<ExecutionSession> {
        self.sessions.remove(session_id)
    }

    pub fn contains(&self, session_id: &str) -> bool {
        self.sessions.contains_key(session_id)
    }

    /// Drops every session and returns their ids, sorted.
    pub fn abandon_all(&mut self) -> Vec<String> {
        let mut ids: Vec<String> = self.sessions.drain().map(|(id, _)| id).collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

/// Owns session bookkeeping on the caller's side of the execution unit.
pub struct ReplayController<U: ExecutionUnit> {
    unit: U,
    events: Receiver<WorkerMessage>,
    sessions: SessionRegistry,
    pending: VecDeque<ReplayUpdate>,
    history: Option<Arc<dyn HistorySink>>,
}

impl ReplayController<WorkerPool> {
    pub fn with_worker_pool() -> Self {
        let (sender, receiver) = unbounded();
        Self::new(WorkerPool::new(sender), receiver)
    }
}

impl<U: ExecutionUnit> ReplayController<U> {
    /// `events` must be the receiving end of the channel `unit` reports on.
    pub fn new(unit: U, events: Receiver<WorkerMessage>) -> Self {
        Self {
            unit,
            events,
            sessions: SessionRegistry::new(),
            pending: VecDeque::new(),
            history: None,
        }
    }

    pub fn with_history(mut self, sink: Arc<dyn HistorySink>) -> Self {
        self.history = Some(sink);
        self
    }

    pub fn unit(&self) -> &U {
        &self.unit
    }

    pub fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }

    /// Starts a session and returns its id. Targets sharing a base URL are
    /// replayed once.
    pub fn dispatch(
        &mut self,
        request: CanonicalRequest,
        targets: Vec<Target>,
        options: ReplayOptions,
    ) -> Result<String, RuntimeError> {
        options
            .validate()
            .map_err(|err| RuntimeError::InvalidOptions(err.to_string()))?;
        let targets = dedupe_targets(targets);
        if targets.is_empty() {
            return Err(RuntimeError::NoTargets);
        }

        let session_id = Uuid::new_v4().to_string();
        info!(
            %session_id,
            method = %request.method,
            path = %request.path,
            targets = targets.len(),
            "session dispatched"
        );
        self.sessions.insert(ExecutionSession::new(
            session_id.clone(),
            request.clone(),
            targets.clone(),
        ));

        if let Err(err) = self.unit.execute(&session_id, request, targets, options) {
            self.sessions.remove(&session_id);
            return Err(err);
        }
        Ok(session_id)
    }

    /// Asks the unit to cancel `session_id`. Cancelled results still arrive
    /// and complete the session. Returns `false` for unknown sessions.
    pub fn cancel(&mut self, session_id: &str) -> Result<bool, RuntimeError> {
        if !self.sessions.contains(session_id) {
            debug!(%session_id, "cancel for unknown session");
            return Ok(false);
        }
        info!(%session_id, "cancelling session");
        self.unit.cancel(session_id)?;
        Ok(true)
    }

    /// Waits up to `timeout` for the next update. `Ok(None)` means nothing
    /// arrived in time.
    pub fn next_update(&mut self, timeout: Duration) -> Result<Option<ReplayUpdate>, RuntimeError> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(update) = self.pending.pop_front() {
                return Ok(Some(update));
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.events.recv_timeout(remaining) {
                Ok(message) => self.handle_message(message),
                Err(RecvTimeoutError::Timeout) => return Ok(None),
                Err(RecvTimeoutError::Disconnected) => return Err(RuntimeError::Disconnected),
            }
        }
    }

    pub fn shutdown(mut self) {
        let abandoned = self.sessions.abandon_all();
        if !abandoned.is_empty() {
            debug!(sessions = abandoned.len(), "shutting down with sessions in flight");
        }
        self.unit.dispose();
    }

    fn handle_message(&mut self, message: WorkerMessage) {
        match message {
            WorkerMessage::Progress {
                session_id,
                target,
                phase,
            } => {
                if self.sessions.contains(&session_id) {
                    self.pending.push_back(ReplayUpdate::Progress {
                        session_id,
                        target,
                        phase,
                    });
                }
            }
            WorkerMessage::Result { session_id, result } => self.handle_result(session_id, result),
            WorkerMessage::Error { session_id, message } if session_id == GLOBAL_SESSION_ID => {
                let abandoned = self.sessions.abandon_all();
                warn!(%message, abandoned = abandoned.len(), "execution unit failed");
                self.pending
                    .push_back(ReplayUpdate::UnitFailed { message, abandoned });
            }
            WorkerMessage::Error {
                session_id,
                message,
            } => {
                if self.sessions.remove(&session_id).is_some() {
                    warn!(%session_id, %message, "session failed");
                    self.pending
                        .push_back(ReplayUpdate::Failed { session_id, message });
                } else {
                    debug!(%session_id, "error for unknown session ignored");
                }
            }
            other => warn!(
                session_id = other.session_id(),
                "unexpected message from execution unit"
            ),
        }
    }

    fn handle_result(&mut self, session_id: String, result: CanonicalResult) {
        let Some(session) = self.sessions.get_mut(&session_id) else {
            debug!(%session_id, target = %result.target, "late result ignored");
            return;
        };
        match session.record(result.clone()) {
            RecordOutcome::Recorded => {}
            RecordOutcome::Duplicate => {
                debug!(%session_id, base_url = %result.target, "duplicate result ignored");
                return;
            }
            RecordOutcome::UnknownTarget => {
                warn!(%session_id, base_url = %result.target, "result for unknown target");
                return;
            }
        }
        let complete = session.is_complete();
        self.pending
            .push_back(ReplayUpdate::Result {
                session_id: session_id.clone(),
                result,
            });

        if !complete {
            return;
        }
        let Some(session) = self.sessions.remove(&session_id) else {
            return;
        };
        info!(%session_id, targets = session.targets.len(), "session complete");
        if let Some(history) = &self.history {
            history.record(HistoryEntry::from(session.summary()));
        }
        self.pending.push_back(ReplayUpdate::Complete {
            session_id,
            results: session.ordered_results(),
        });
    }
}

fn dedupe_targets(targets: Vec<Target>) -> Vec<Target> {
    let mut seen = HashSet::new();
    targets
        .into_iter()
        .filter(|target| seen.insert(target.base_url.clone()))
        .collect()
}
