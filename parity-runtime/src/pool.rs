use crossbeam_channel::Sender;
use parity_core::{CanonicalRequest, ReplayOptions, Target, WorkerMessage};
use tracing::{debug, info, warn};

use crate::unit::{UnitHandle, spawn_unit};
use crate::RuntimeError;

/// Where the controller sends work. Implementations report progress, results
/// and errors on the event channel they were built with.
pub trait ExecutionUnit: Send {
    fn execute(
        &mut self,
        session_id: &str,
        request: CanonicalRequest,
        targets: Vec<Target>,
        options: ReplayOptions,
    ) -> Result<(), RuntimeError>;

    fn cancel(&mut self, session_id: &str) -> Result<(), RuntimeError>;

    fn dispose(&mut self);
}

/// Thread-backed execution unit. Holds at most one live unit and replaces it
/// on the next `execute` once it has died.
#[derive(Debug)]
pub struct WorkerPool {
    events: Sender<WorkerMessage>,
    unit: Option<UnitHandle>,
    spawned: usize,
}

impl WorkerPool {
    pub fn new(events: Sender<WorkerMessage>) -> Self {
        Self {
            events,
            unit: None,
            spawned: 0,
        }
    }

    pub fn is_running(&self) -> bool {
        self.unit.as_ref().is_some_and(UnitHandle::is_alive)
    }

    /// Number of units started so far.
    pub fn spawned(&self) -> usize {
        self.spawned
    }

    fn live_unit(&mut self) -> Result<&UnitHandle, RuntimeError> {
        if !self.is_running() {
            if let Some(dead) = self.unit.take() {
                warn!("execution unit is gone, restarting");
                dead.shutdown();
            }
            let unit = spawn_unit(self.events.clone())?;
            self.spawned += 1;
            info!(generation = self.spawned, "execution unit spawned");
            self.unit = Some(unit);
        }
        self.unit.as_ref().ok_or(RuntimeError::UnitUnavailable)
    }
}

impl ExecutionUnit for WorkerPool {
    fn execute(
        &mut self,
        session_id: &str,
        request: CanonicalRequest,
        targets: Vec<Target>,
        options: ReplayOptions,
    ) -> Result<(), RuntimeError> {
        let message = WorkerMessage::Execute {
            session_id: session_id.to_string(),
            request,
            targets,
            options,
        };
        self.live_unit()?.send(message)
    }

    fn cancel(&mut self, session_id: &str) -> Result<(), RuntimeError> {
        match &self.unit {
            Some(unit) if unit.is_alive() => unit.send(WorkerMessage::Cancel {
                session_id: session_id.to_string(),
            }),
            _ => {
                debug!(%session_id, "no live execution unit to cancel on");
                Ok(())
            }
        }
    }

    fn dispose(&mut self) {
        if let Some(unit) = self.unit.take() {
            unit.shutdown();
            debug!("execution unit disposed");
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.dispose();
    }
}
