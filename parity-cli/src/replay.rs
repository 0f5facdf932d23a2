use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use anyhow::{Context, bail};
use parity_core::{CanonicalRequest, CanonicalResult, ReplayOptions, Target, WorkerMessage, encode_line};
use parity_replay::{DiffOptions, diff_results};
use parity_runtime::{ReplayController, ReplayUpdate, WorkerPool};
use parity_storage::{
    HistoryConfig, HistoryWorkerConfig, HistoryWorkerHandle, ParityConfig, SqliteHistoryStore,
    spawn_history_worker,
};
use tracing::{debug, info, warn};

use crate::ReplayArgs;
use crate::input::{load_config, resolve_request};
use crate::render::{print_diff, print_results};

const POLL_INTERVAL: Duration = Duration::from_millis(100);

pub async fn run(args: ReplayArgs) -> anyhow::Result<()> {
    let mut config = load_config(&args.config)?;
    apply_overrides(&mut config, &args);
    config.validate().context("invalid replay settings")?;
    let targets = config.targets()?;
    let options = config.replay_options();
    let diff_options = DiffOptions::new(config.ignore_diff_paths.iter().cloned());

    let (request, format) = resolve_request(&args.input)?;
    info!(%format, method = %request.method, path = %request.path, "request extracted");

    let history = start_history(&config.history);
    let mut controller = ReplayController::with_worker_pool();
    if let Some(history) = &history {
        controller = controller.with_history(Arc::new(history.clone()));
    }

    let interrupted = Arc::new(AtomicBool::new(false));
    let flag = interrupted.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            flag.store(true, Ordering::SeqCst);
        }
    });

    let json = args.json;
    let session_targets = targets.clone();
    let results = tokio::task::spawn_blocking(move || {
        let outcome = run_session(
            &mut controller,
            request,
            session_targets,
            options,
            &interrupted,
            json,
        );
        controller.shutdown();
        outcome
    })
    .await
    .context("replay session panicked")??;

    if let Some(history) = history {
        if let Err(err) = history.flush() {
            warn!(error = %err, "history was not flushed");
        }
    }

    let diff = match results.as_slice() {
        [left, right] => Some(diff_results(left, right, &diff_options)),
        _ => None,
    };

    if json {
        if let Some(diff) = diff {
            println!("{}", serde_json::to_string(&diff)?);
        }
    } else {
        print_results(&targets, &results);
        if let Some(diff) = diff {
            print_diff(&diff);
        }
    }
    Ok(())
}

fn apply_overrides(config: &mut ParityConfig, args: &ReplayArgs) {
    if !args.targets.is_empty() {
        config.targets = args.targets.clone();
    }
    config.ignore_diff_paths.extend(args.ignore.iter().cloned());
    if let Some(timeout_ms) = args.timeout_ms {
        config.timeout_ms = timeout_ms;
    }
    if let Some(concurrency) = args.concurrency {
        config.concurrency_limit = concurrency;
    }
    if args.insecure {
        config.allow_insecure_tls = true;
    }
    if args.no_redirects {
        config.follow_redirects = false;
    }
}

fn start_history(config: &HistoryConfig) -> Option<HistoryWorkerHandle> {
    if !config.enabled {
        return None;
    }
    let store = match SqliteHistoryStore::open(&config.path) {
        Ok(store) => store,
        Err(err) => {
            warn!(path = %config.path.display(), error = %err, "history disabled");
            return None;
        }
    };
    let worker_config = HistoryWorkerConfig {
        max_entries: config.max_entries,
        ..HistoryWorkerConfig::default()
    };
    match spawn_history_worker(Box::new(store), worker_config) {
        Ok(handle) => Some(handle),
        Err(err) => {
            warn!(error = %err, "history disabled");
            None
        }
    }
}

fn run_session(
    controller: &mut ReplayController<WorkerPool>,
    request: CanonicalRequest,
    targets: Vec<Target>,
    options: ReplayOptions,
    interrupted: &AtomicBool,
    json: bool,
) -> anyhow::Result<Vec<CanonicalResult>> {
    let session_id = controller.dispatch(request, targets, options)?;
    let mut cancel_sent = false;

    loop {
        if !cancel_sent && interrupted.load(Ordering::SeqCst) {
            warn!(%session_id, "interrupted, cancelling replay");
            controller.cancel(&session_id)?;
            cancel_sent = true;
        }

        let Some(update) = controller.next_update(POLL_INTERVAL)? else {
            continue;
        };
        match update {
            ReplayUpdate::Progress {
                session_id,
                target,
                phase,
            } => {
                debug!(base_url = %target, %phase, "progress");
                if json {
                    emit(&WorkerMessage::Progress {
                        session_id,
                        target,
                        phase,
                    })?;
                }
            }
            ReplayUpdate::Result { session_id, result } => {
                info!(base_url = %result.target, status = %result.status_or_error_kind(), "target finished");
                if json {
                    emit(&WorkerMessage::Result { session_id, result })?;
                }
            }
            ReplayUpdate::Complete { results, .. } => return Ok(results),
            ReplayUpdate::Failed { message, .. } => bail!("replay failed: {message}"),
            ReplayUpdate::UnitFailed { message, .. } => bail!("replay aborted: {message}"),
        }
    }
}

fn emit(message: &WorkerMessage) -> anyhow::Result<()> {
    println!("{}", encode_line(message)?);
    Ok(())
}
