use std::collections::BTreeMap;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;

use parity_codec::url_encode_component;
use parity_core::{CanonicalRequest, CanonicalResult, Phase, ReplayOptions, Target, normalize_header_name};
use parity_web::{
    CancelToken, Client, ClientConfig, Request, RequestError, classify_error, normalize_response,
};
use tokio::sync::{Semaphore, mpsc};
use tokio_stream::Stream;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::{debug, info};
use url::Url;

use crate::{DispatchEvent, ReplayError};

pub type DispatchStream = Pin<Box<dyn Stream<Item = DispatchEvent> + Send>>;

/// Replays `request` against every target, at most
/// `options.concurrency_limit` at a time. The stream ends once every target
/// has produced its result. Must be called from within a tokio runtime.
pub fn dispatch(
    request: &CanonicalRequest,
    targets: &[Target],
    options: &ReplayOptions,
    cancel: CancelToken,
) -> Result<DispatchStream, ReplayError> {
    options
        .validate()
        .map_err(|err| ReplayError::InvalidOptions(err.to_string()))?;
    if targets.is_empty() {
        return Err(ReplayError::NoTargets);
    }

    info!(
        method = %request.method,
        path = %request.path,
        targets = targets.len(),
        limit = options.concurrency_limit,
        "dispatching request"
    );

    let semaphore = Arc::new(Semaphore::new(options.concurrency_limit));
    let client = Client::new(ClientConfig::from_options(options));
    let headers = merge_headers(&options.default_headers, &request.headers);
    let (sender, receiver) = mpsc::unbounded_channel();

    for target in targets {
        let task = TargetTask {
            base_url: target.base_url.clone(),
            request: build_request(request, &headers, target),
            client: client.clone(),
            semaphore: semaphore.clone(),
            cancel: cancel.clone(),
            events: sender.clone(),
        };
        tokio::spawn(task.run());
    }
    drop(sender);

    Ok(Box::pin(UnboundedReceiverStream::new(receiver)))
}

struct TargetTask {
    base_url: String,
    request: Result<Request, RequestError>,
    client: Client,
    semaphore: Arc<Semaphore>,
    cancel: CancelToken,
    events: mpsc::UnboundedSender<DispatchEvent>,
}

impl TargetTask {
    async fn run(self) {
        let queued_at = Instant::now();
        let permit = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => None,
            permit = self.semaphore.clone().acquire_owned() => permit.ok(),
        };
        let Some(permit) = permit else {
            debug!(base_url = %self.base_url, "cancelled before admission");
            let result = CanonicalResult::failure(
                &self.base_url,
                elapsed_ms(queued_at),
                classify_error(&RequestError::Cancelled),
            );
            let _ = self.events.send(DispatchEvent::Result(result));
            return;
        };

        let started = Instant::now();
        let outcome = match self.request {
            Ok(request) => {
                let events = &self.events;
                let base_url = &self.base_url;
                self.client
                    .send(request, &self.cancel, |phase| {
                        debug!(base_url = %base_url, %phase, "progress");
                        let _ = events.send(DispatchEvent::Progress {
                            target: base_url.clone(),
                            phase,
                        });
                    })
                    .await
            }
            Err(err) => Err(err),
        };
        let duration_ms = elapsed_ms(started);

        let result = match outcome {
            Ok(response) => normalize_response(&self.base_url, duration_ms, &response),
            Err(err) => {
                debug!(base_url = %self.base_url, error = %err, "target failed");
                CanonicalResult::failure(&self.base_url, duration_ms, classify_error(&err))
            }
        };

        let _ = self.events.send(DispatchEvent::Progress {
            target: self.base_url.clone(),
            phase: Phase::Done,
        });
        let _ = self.events.send(DispatchEvent::Result(result));
        drop(permit);
    }
}

fn elapsed_ms(since: Instant) -> u64 {
    since.elapsed().as_millis() as u64
}

/// Default headers first, request headers on top; `host` is never carried.
pub fn merge_headers(
    defaults: &BTreeMap<String, String>,
    request: &BTreeMap<String, String>,
) -> BTreeMap<String, String> {
    let mut merged = BTreeMap::new();
    for (name, value) in defaults.iter().chain(request) {
        let name = normalize_header_name(name);
        if name.is_empty() || name == "host" {
            continue;
        }
        merged.insert(name, value.clone());
    }
    merged
}

/// `path` (empty becomes `/`) with the query appended as percent-encoded
/// `key=value` pairs.
pub fn build_path_with_query(path: &str, query: Option<&BTreeMap<String, String>>) -> String {
    let path = if path.is_empty() { "/" } else { path };
    let Some(query) = query.filter(|query| !query.is_empty()) else {
        return path.to_string();
    };
    let pairs: Vec<String> = query
        .iter()
        .map(|(key, value)| {
            format!(
                "{}={}",
                url_encode_component(key),
                url_encode_component(value)
            )
        })
        .collect();
    let separator = if path.contains('?') { '&' } else { '?' };
    format!("{path}{separator}{}", pairs.join("&"))
}

fn build_request(
    request: &CanonicalRequest,
    headers: &BTreeMap<String, String>,
    target: &Target,
) -> Result<Request, RequestError> {
    let base = target.base_url.trim().trim_end_matches('/');
    let path = build_path_with_query(&request.path, request.query.as_ref());
    let separator = if path.starts_with('/') { "" } else { "/" };
    let url = Url::parse(&format!("{base}{separator}{path}"))
        .map_err(|err| RequestError::InvalidUrl(format!("{}: {err}", target.base_url)))?;

    let mut builder = Request::builder(url).method_str(&request.method)?;
    for (name, value) in headers {
        builder = builder.header(name.as_str(), value.as_str());
    }
    if let Some(body) = &request.body {
        builder = builder.body(body.as_bytes().to_vec());
    }
    Ok(builder.build())
}
