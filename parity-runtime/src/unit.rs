use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::Sender;
use parity_core::{CanonicalRequest, ReplayOptions, Target, WorkerMessage};
use parity_replay::{DispatchEvent, dispatch};
use tokio::sync::mpsc;
use tokio_stream::StreamExt;
use tracing::{debug, error, info, warn};

use crate::{CancellationRegistry, RuntimeError};

pub const UNIT_THREAD_NAME: &str = "parity-exec";
const SHUTDOWN_GRACE: Duration = Duration::from_secs(1);

/// Executing this session id makes the unit panic.
#[cfg(test)]
pub(crate) const CRASH_SESSION_ID: &str = "crash-execution-unit";

/// The controller's end of a running execution unit.
#[derive(Debug)]
pub struct UnitHandle {
    commands: mpsc::UnboundedSender<WorkerMessage>,
    thread: JoinHandle<()>,
}

impl UnitHandle {
    pub fn send(&self, message: WorkerMessage) -> Result<(), RuntimeError> {
        self.commands
            .send(message)
            .map_err(|_| RuntimeError::UnitUnavailable)
    }

    pub fn is_alive(&self) -> bool {
        !self.thread.is_finished() && !self.commands.is_closed()
    }

    /// Closes the command channel and waits for the thread to exit.
    /// In-flight sessions are dropped with the unit's runtime.
    pub fn shutdown(self) {
        drop(self.commands);
        if self.thread.join().is_err() {
            warn!("execution unit thread panicked during shutdown");
        }
    }
}

/// Starts an execution unit on its own thread with its own tokio runtime.
/// Everything the unit produces, including a global error when it dies, is
/// sent to `events`.
pub fn spawn_unit(events: Sender<WorkerMessage>) -> Result<UnitHandle, RuntimeError> {
    let (commands, receiver) = mpsc::unbounded_channel();
    let thread = std::thread::Builder::new()
        .name(UNIT_THREAD_NAME.to_string())
        .spawn(move || run_unit(receiver, events))
        .map_err(|err| RuntimeError::Spawn(err.to_string()))?;
    Ok(UnitHandle { commands, thread })
}

fn run_unit(commands: mpsc::UnboundedReceiver<WorkerMessage>, events: Sender<WorkerMessage>) {
    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("parity-exec-worker")
        .build()
    {
        Ok(runtime) => runtime,
        Err(err) => {
            error!(error = %err, "failed to build execution unit runtime");
            let _ = events.send(WorkerMessage::global_error(format!(
                "execution unit runtime failed to start: {err}"
            )));
            return;
        }
    };

    info!("execution unit started");
    let serve_events = events.clone();
    let outcome = catch_unwind(AssertUnwindSafe(|| {
        runtime.block_on(serve(commands, serve_events));
    }));
    runtime.shutdown_timeout(SHUTDOWN_GRACE);

    match outcome {
        Ok(()) => info!("execution unit stopped"),
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            error!(%message, "execution unit crashed");
            let _ = events.send(WorkerMessage::global_error(format!(
                "execution unit crashed: {message}"
            )));
        }
    }
}

async fn serve(mut commands: mpsc::UnboundedReceiver<WorkerMessage>, events: Sender<WorkerMessage>) {
    let registry = Arc::new(CancellationRegistry::new());

    while let Some(message) = commands.recv().await {
        match message {
            #[cfg(test)]
            WorkerMessage::Execute { session_id, .. } if session_id == CRASH_SESSION_ID => {
                panic!("crash requested by {session_id}")
            }
            WorkerMessage::Execute {
                session_id,
                request,
                targets,
                options,
            } => start_session(&registry, &events, session_id, request, targets, options),
            WorkerMessage::Cancel { session_id } => {
                if registry.cancel(&session_id) {
                    info!(%session_id, "session cancelled");
                } else {
                    debug!(%session_id, "cancel for unknown or finished session");
                }
            }
            other => warn!(session_id = other.session_id(), "unexpected message for execution unit"),
        }
    }

    let cancelled = registry.cancel_all();
    if cancelled > 0 {
        debug!(cancelled, "execution unit closing with sessions in flight");
    }
}

fn start_session(
    registry: &Arc<CancellationRegistry>,
    events: &Sender<WorkerMessage>,
    session_id: String,
    request: CanonicalRequest,
    targets: Vec<Target>,
    options: ReplayOptions,
) {
    let cancel = registry.register(&session_id);
    let session = tokio::spawn(run_session(
        registry.clone(),
        events.clone(),
        session_id.clone(),
        request,
        targets,
        options,
        cancel,
    ));

    let registry = registry.clone();
    let events = events.clone();
    tokio::spawn(async move {
        if let Err(err) = session.await {
            registry.remove(&session_id);
            if err.is_panic() {
                let message = panic_message(err.into_panic().as_ref());
                error!(%session_id, %message, "session task panicked");
                let _ = events.send(WorkerMessage::Error {
                    session_id,
                    message: format!("session task panicked: {message}"),
                });
            }
        }
    });
}

async fn run_session(
    registry: Arc<CancellationRegistry>,
    events: Sender<WorkerMessage>,
    session_id: String,
    request: CanonicalRequest,
    targets: Vec<Target>,
    options: ReplayOptions,
    cancel: parity_web::CancelToken,
) {
    let mut stream = match dispatch(&request, &targets, &options, cancel) {
        Ok(stream) => stream,
        Err(err) => {
            registry.remove(&session_id);
            warn!(%session_id, error = %err, "dispatch rejected");
            let _ = events.send(WorkerMessage::Error {
                session_id,
                message: err.to_string(),
            });
            return;
        }
    };

    while let Some(event) = stream.next().await {
        let message = match event {
            DispatchEvent::Progress { target, phase } => WorkerMessage::Progress {
                session_id: session_id.clone(),
                target,
                phase,
            },
            DispatchEvent::Result(result) => WorkerMessage::Result {
                session_id: session_id.clone(),
                result,
            },
        };
        if events.send(message).is_err() {
            debug!(%session_id, "controller gone, dropping session events");
            break;
        }
    }

    registry.remove(&session_id);
    debug!(%session_id, "session finished in execution unit");
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
