use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};
use tracing::{debug, warn};

use crate::history::{HistoryEntry, HistorySink, HistoryStore};
use crate::StorageError;

#[derive(Debug, Clone)]
pub struct HistoryWorkerConfig {
    pub max_queue_size: usize,
    /// Zero disables pruning.
    pub max_entries: usize,
}

impl Default for HistoryWorkerConfig {
    fn default() -> Self {
        Self {
            max_queue_size: 1_024,
            max_entries: 100,
        }
    }
}

enum HistoryCommand {
    Record(HistoryEntry),
    Flush(Sender<()>),
}

impl std::fmt::Debug for HistoryCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Record(entry) => f.debug_tuple("Record").field(&entry.id).finish(),
            Self::Flush(_) => f.write_str("Flush"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct HistoryWorkerHandle {
    sender: Sender<HistoryCommand>,
}

impl HistoryWorkerHandle {
    /// Queues `entry`, blocking while the queue is full.
    pub fn send(&self, entry: HistoryEntry) -> Result<(), StorageError> {
        self.sender
            .send(HistoryCommand::Record(entry))
            .map_err(|_| StorageError::WorkerStopped)
    }

    /// Waits until every entry queued before this call has been written.
    pub fn flush(&self) -> Result<(), StorageError> {
        let (ack_sender, ack_receiver) = bounded(1);
        self.sender
            .send(HistoryCommand::Flush(ack_sender))
            .map_err(|_| StorageError::WorkerStopped)?;
        ack_receiver
            .recv()
            .map_err(|_| StorageError::WorkerStopped)
    }
}

impl HistorySink for HistoryWorkerHandle {
    fn record(&self, entry: HistoryEntry) {
        match self.sender.try_send(HistoryCommand::Record(entry)) {
            Ok(()) => {}
            Err(TrySendError::Full(HistoryCommand::Record(entry))) => {
                warn!(id = %entry.id, "history queue full, dropping entry");
            }
            Err(TrySendError::Full(_)) => {}
            Err(TrySendError::Disconnected(_)) => {
                warn!("history worker stopped, dropping entry");
            }
        }
    }
}

pub fn spawn_history_worker(
    store: Box<dyn HistoryStore>,
    config: HistoryWorkerConfig,
) -> Result<HistoryWorkerHandle, StorageError> {
    let (sender, receiver) = bounded(config.max_queue_size.max(1));

    std::thread::Builder::new()
        .name("parity-history".to_string())
        .spawn(move || worker_loop(receiver, store, config))
        .map_err(|err| StorageError::Io(err.to_string()))?;

    Ok(HistoryWorkerHandle { sender })
}

fn worker_loop(
    receiver: Receiver<HistoryCommand>,
    store: Box<dyn HistoryStore>,
    config: HistoryWorkerConfig,
) {
    for command in receiver {
        match command {
            HistoryCommand::Record(entry) => write_entry(store.as_ref(), &config, &entry),
            HistoryCommand::Flush(ack) => {
                let _ = ack.send(());
            }
        }
    }
    debug!("history worker exiting");
}

fn write_entry(store: &dyn HistoryStore, config: &HistoryWorkerConfig, entry: &HistoryEntry) {
    if let Err(err) = store.insert(entry) {
        warn!(id = %entry.id, error = %err, "failed to record history entry");
        return;
    }
    match store.prune(config.max_entries) {
        Ok(0) => {}
        Ok(pruned) => debug!(pruned, "pruned history entries"),
        Err(err) => warn!(error = %err, "failed to prune history"),
    }
}
