use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use bytes::BytesMut;
use http::Method;
use parity_core::{Phase, ReplayOptions};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::{TcpStream, lookup_host};
use tokio_util::sync::CancellationToken;
use tracing::debug;
use url::{Host, Url};

use crate::normalize::MAX_BODY_BYTES;
use crate::{Request, RequestError, Response};

pub const DEFAULT_MAX_REDIRECTS: usize = 10;
const MAX_HEAD_BYTES: usize = 64 * 1024;
const READ_CHUNK: usize = 8192;

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Deadline for the whole exchange, redirects included. `None` waits forever.
    pub timeout: Option<Duration>,
    pub follow_redirects: bool,
    pub allow_insecure_tls: bool,
    pub max_body_bytes: usize,
    pub max_redirects: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout: Some(Duration::from_secs(30)),
            follow_redirects: true,
            allow_insecure_tls: false,
            max_body_bytes: MAX_BODY_BYTES,
            max_redirects: DEFAULT_MAX_REDIRECTS,
        }
    }
}

impl ClientConfig {
    pub fn from_options(options: &ReplayOptions) -> Self {
        Self {
            timeout: (options.timeout_ms > 0).then(|| Duration::from_millis(options.timeout_ms)),
            follow_redirects: options.follow_redirects,
            allow_insecure_tls: options.allow_insecure_tls,
            ..Self::default()
        }
    }
}

/// Cancellation signal shared by every request of a replay session.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    inner: CancellationToken,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.inner.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.is_cancelled()
    }

    pub async fn cancelled(&self) {
        self.inner.cancelled().await;
    }
}

#[derive(Debug, Clone)]
pub struct Client {
    config: Arc<ClientConfig>,
}

impl Client {
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Sends `request`, following redirects when configured. `on_phase` sees
    /// `connecting`, `sending` and `receiving` at most once each, in order.
    pub async fn send<F>(
        &self,
        request: Request,
        cancel: &CancelToken,
        on_phase: F,
    ) -> Result<Response, RequestError>
    where
        F: FnMut(Phase) + Send,
    {
        if cancel.is_cancelled() {
            return Err(RequestError::Cancelled);
        }
        let mut phases = PhaseTracker::new(on_phase);
        let exchange = self.execute_with_redirects(request, &mut phases);
        let bounded = async {
            match self.config.timeout {
                Some(limit) => match tokio::time::timeout(limit, exchange).await {
                    Ok(result) => result,
                    Err(_) => Err(RequestError::Timeout(limit.as_millis() as u64)),
                },
                None => exchange.await,
            }
        };
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(RequestError::Cancelled),
            result = bounded => result,
        }
    }

    async fn execute_with_redirects<F: FnMut(Phase)>(
        &self,
        mut request: Request,
        phases: &mut PhaseTracker<F>,
    ) -> Result<Response, RequestError> {
        let mut hops = 0;
        loop {
            let response = self.execute(&request, phases).await?;
            if !self.config.follow_redirects || !is_redirect(response.status) {
                return Ok(response);
            }
            let Some(location) = response.header("location") else {
                return Ok(response);
            };
            if hops == self.config.max_redirects {
                return Err(RequestError::TooManyRedirects(self.config.max_redirects));
            }
            let next = request
                .url
                .join(location)
                .map_err(|err| RequestError::InvalidUrl(err.to_string()))?;
            debug!(from = %request.url, to = %next, status = response.status, "following redirect");
            request = request.redirected(next, response.status);
            hops += 1;
        }
    }

    async fn execute<F: FnMut(Phase)>(
        &self,
        request: &Request,
        phases: &mut PhaseTracker<F>,
    ) -> Result<Response, RequestError> {
        let url = &request.url;
        let port = url
            .port_or_known_default()
            .ok_or_else(|| RequestError::InvalidUrl(format!("{url} has no port")))?;

        phases.advance(Phase::Connecting);
        let addrs = resolve(url, port).await?;
        let stream = connect(&addrs).await?;
        let max_body = self.config.max_body_bytes;

        match url.scheme() {
            "http" => exchange(stream, request, max_body, phases).await,
            "https" => {
                let domain = match url.host() {
                    Some(Host::Domain(domain)) => domain.to_string(),
                    Some(Host::Ipv4(ip)) => ip.to_string(),
                    Some(Host::Ipv6(ip)) => ip.to_string(),
                    None => return Err(RequestError::InvalidUrl(format!("{url} has no host"))),
                };
                let stream = self.tls_handshake(&domain, stream).await?;
                exchange(stream, request, max_body, phases).await
            }
            other => Err(RequestError::InvalidUrl(format!(
                "unsupported scheme {other}"
            ))),
        }
    }

    async fn tls_handshake(
        &self,
        domain: &str,
        stream: TcpStream,
    ) -> Result<tokio_native_tls::TlsStream<TcpStream>, RequestError> {
        let mut builder = native_tls::TlsConnector::builder();
        if self.config.allow_insecure_tls {
            builder
                .danger_accept_invalid_certs(true)
                .danger_accept_invalid_hostnames(true);
        }
        let connector = builder
            .build()
            .map_err(|err| RequestError::Tls(err.to_string()))?;
        tokio_native_tls::TlsConnector::from(connector)
            .connect(domain, stream)
            .await
            .map_err(|err| RequestError::Tls(err.to_string()))
    }
}

struct PhaseTracker<F> {
    observer: F,
    last: Option<Phase>,
}

impl<F: FnMut(Phase)> PhaseTracker<F> {
    fn new(observer: F) -> Self {
        Self {
            observer,
            last: None,
        }
    }

    fn advance(&mut self, phase: Phase) {
        if self.last.is_some_and(|last| phase <= last) {
            return;
        }
        self.last = Some(phase);
        (self.observer)(phase);
    }
}

fn is_redirect(status: u16) -> bool {
    matches!(status, 301 | 302 | 303 | 307 | 308)
}

fn io_error(err: std::io::Error) -> RequestError {
    RequestError::Io(err.to_string())
}

async fn resolve(url: &Url, port: u16) -> Result<Vec<SocketAddr>, RequestError> {
    match url.host() {
        Some(Host::Ipv4(ip)) => Ok(vec![SocketAddr::new(IpAddr::V4(ip), port)]),
        Some(Host::Ipv6(ip)) => Ok(vec![SocketAddr::new(IpAddr::V6(ip), port)]),
        Some(Host::Domain(domain)) => {
            let addrs: Vec<SocketAddr> = lookup_host((domain, port))
                .await
                .map_err(|err| RequestError::Dns {
                    host: domain.to_string(),
                    message: err.to_string(),
                })?
                .collect();
            if addrs.is_empty() {
                return Err(RequestError::Dns {
                    host: domain.to_string(),
                    message: "no addresses found".to_string(),
                });
            }
            Ok(addrs)
        }
        None => Err(RequestError::InvalidUrl(format!("{url} has no host"))),
    }
}

async fn connect(addrs: &[SocketAddr]) -> Result<TcpStream, RequestError> {
    let mut last_error = None;
    for addr in addrs {
        match TcpStream::connect(addr).await {
            Ok(stream) => return Ok(stream),
            Err(err) => {
                debug!(%addr, error = %err, "connect attempt failed");
                last_error = Some(err);
            }
        }
    }
    Err(RequestError::Connect(
        last_error
            .map(|err| err.to_string())
            .unwrap_or_else(|| "no addresses to connect to".to_string()),
    ))
}

async fn exchange<S, F>(
    stream: S,
    request: &Request,
    max_body_bytes: usize,
    phases: &mut PhaseTracker<F>,
) -> Result<Response, RequestError>
where
    S: AsyncRead + AsyncWrite + Unpin,
    F: FnMut(Phase),
{
    let mut reader = BufReader::new(stream);

    phases.advance(Phase::Sending);
    let bytes = serialize_request(request);
    reader.get_mut().write_all(&bytes).await.map_err(io_error)?;
    reader.get_mut().flush().await.map_err(io_error)?;

    phases.advance(Phase::Receiving);
    let head = loop {
        let head = read_head(&mut reader).await?;
        if (100..200).contains(&head.status) && head.status != 101 {
            continue;
        }
        break head;
    };

    let no_body = request.method == Method::HEAD || matches!(head.status, 101..=199 | 204 | 304);
    let (body, truncated) = if no_body {
        (Vec::new(), false)
    } else {
        read_body(&mut reader, &head.headers, max_body_bytes).await?
    };

    Ok(Response {
        status: head.status,
        headers: head.headers,
        body,
        truncated,
    })
}

fn serialize_request(request: &Request) -> Vec<u8> {
    let url = &request.url;
    let mut target = url.path().to_string();
    if let Some(query) = url.query() {
        target.push('?');
        target.push_str(query);
    }
    let authority = match (url.host_str(), url.port()) {
        (Some(host), Some(port)) => format!("{host}:{port}"),
        (Some(host), None) => host.to_string(),
        (None, _) => String::new(),
    };

    let mut bytes = Vec::with_capacity(256 + request.body.len());
    bytes.extend_from_slice(
        format!("{} {} HTTP/1.1\r\n", request.method.as_str(), target).as_bytes(),
    );
    bytes.extend_from_slice(format!("Host: {authority}\r\n").as_bytes());
    for (name, value) in &request.headers {
        if is_managed_header(name) || has_line_break(name) || has_line_break(value) {
            continue;
        }
        bytes.extend_from_slice(name.as_bytes());
        bytes.extend_from_slice(b": ");
        bytes.extend_from_slice(value.as_bytes());
        bytes.extend_from_slice(b"\r\n");
    }
    if !request.body.is_empty()
        || matches!(request.method, Method::POST | Method::PUT | Method::PATCH)
    {
        bytes.extend_from_slice(format!("Content-Length: {}\r\n", request.body.len()).as_bytes());
    }
    bytes.extend_from_slice(b"Connection: close\r\n\r\n");
    bytes.extend_from_slice(&request.body);
    bytes
}

fn is_managed_header(name: &str) -> bool {
    ["host", "content-length", "connection", "transfer-encoding"]
        .iter()
        .any(|managed| name.trim().eq_ignore_ascii_case(managed))
}

fn has_line_break(text: &str) -> bool {
    text.contains(['\r', '\n'])
}

struct ResponseHead {
    status: u16,
    headers: Vec<(String, String)>,
}

async fn read_line<R: AsyncBufRead + Unpin>(reader: &mut R) -> Result<Option<(String, usize)>, RequestError> {
    let mut buffer = Vec::new();
    let read = reader
        .read_until(b'\n', &mut buffer)
        .await
        .map_err(io_error)?;
    if read == 0 {
        return Ok(None);
    }
    while buffer.last().is_some_and(|byte| *byte == b'\n' || *byte == b'\r') {
        buffer.pop();
    }
    Ok(Some((String::from_utf8_lossy(&buffer).into_owned(), read)))
}

async fn read_head<R: AsyncBufRead + Unpin>(reader: &mut R) -> Result<ResponseHead, RequestError> {
    let mut consumed = 0;
    let mut lines = Vec::new();
    loop {
        let Some((line, read)) = read_line(reader).await? else {
            return Err(RequestError::Protocol(
                "connection closed before the response head completed".to_string(),
            ));
        };
        consumed += read;
        if consumed > MAX_HEAD_BYTES {
            return Err(RequestError::Protocol(format!(
                "response head exceeds {MAX_HEAD_BYTES} bytes"
            )));
        }
        if line.is_empty() {
            if lines.is_empty() {
                continue;
            }
            break;
        }
        lines.push(line);
    }

    let status = parse_status_line(&lines[0])?;
    Ok(ResponseHead {
        status,
        headers: parse_headers(&lines[1..]),
    })
}

fn parse_status_line(line: &str) -> Result<u16, RequestError> {
    let mut parts = line.splitn(3, ' ');
    let version = parts.next().unwrap_or_default();
    if !version.starts_with("HTTP/") {
        return Err(RequestError::Protocol(format!("invalid status line {line:?}")));
    }
    parts
        .next()
        .and_then(|code| code.trim().parse::<u16>().ok())
        .ok_or_else(|| RequestError::Protocol(format!("invalid status line {line:?}")))
}

/// Obsolete line folding is joined onto the previous header; lines without
/// a colon are dropped.
fn parse_headers(lines: &[String]) -> Vec<(String, String)> {
    let mut headers: Vec<(String, String)> = Vec::new();
    for line in lines {
        if line.starts_with([' ', '\t']) {
            if let Some((_, value)) = headers.last_mut() {
                value.push(' ');
                value.push_str(line.trim());
            }
            continue;
        }
        if let Some((name, value)) = line.split_once(':') {
            let name = name.trim();
            if !name.is_empty() {
                headers.push((name.to_string(), value.trim().to_string()));
            }
        }
    }
    headers
}

fn header_value<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .map(|(_, value)| value.as_str())
}

fn is_chunked(headers: &[(String, String)]) -> bool {
    headers
        .iter()
        .filter(|(name, _)| name.eq_ignore_ascii_case("transfer-encoding"))
        .any(|(_, value)| {
            value
                .split(',')
                .any(|encoding| encoding.trim().eq_ignore_ascii_case("chunked"))
        })
}

fn content_length(headers: &[(String, String)]) -> Result<Option<usize>, RequestError> {
    header_value(headers, "content-length")
        .map(|value| {
            value
                .trim()
                .parse::<usize>()
                .map_err(|_| RequestError::Protocol(format!("invalid content-length {value:?}")))
        })
        .transpose()
}

/// Accumulates body bytes up to a fixed cap.
struct BodySink {
    buffer: BytesMut,
    limit: usize,
    truncated: bool,
}

impl BodySink {
    fn new(limit: usize) -> Self {
        Self {
            buffer: BytesMut::new(),
            limit,
            truncated: false,
        }
    }

    /// Returns false once the cap is hit and reading should stop.
    fn push(&mut self, chunk: &[u8]) -> bool {
        let room = self.limit - self.buffer.len();
        if chunk.len() > room {
            self.buffer.extend_from_slice(&chunk[..room]);
            self.truncated = true;
            return false;
        }
        self.buffer.extend_from_slice(chunk);
        true
    }

    fn finish(self) -> (Vec<u8>, bool) {
        (self.buffer.to_vec(), self.truncated)
    }
}

async fn read_body<R: AsyncBufRead + Unpin>(
    reader: &mut R,
    headers: &[(String, String)],
    max_body_bytes: usize,
) -> Result<(Vec<u8>, bool), RequestError> {
    let mut sink = BodySink::new(max_body_bytes);
    if is_chunked(headers) {
        read_chunked(reader, &mut sink).await?;
    } else if let Some(length) = content_length(headers)? {
        read_sized(reader, length, &mut sink).await?;
    } else {
        read_to_close(reader, &mut sink).await?;
    }
    Ok(sink.finish())
}

/// Reads exactly `length` bytes, or fewer once the sink is full.
async fn read_sized<R: AsyncBufRead + Unpin>(
    reader: &mut R,
    length: usize,
    sink: &mut BodySink,
) -> Result<bool, RequestError> {
    let mut remaining = length;
    let mut chunk = vec![0u8; READ_CHUNK];
    while remaining > 0 {
        let want = remaining.min(chunk.len());
        let read = reader.read(&mut chunk[..want]).await.map_err(io_error)?;
        if read == 0 {
            return Err(RequestError::Protocol(format!(
                "connection closed with {remaining} body bytes outstanding"
            )));
        }
        remaining -= read;
        if !sink.push(&chunk[..read]) {
            return Ok(false);
        }
    }
    Ok(true)
}

async fn read_chunked<R: AsyncBufRead + Unpin>(
    reader: &mut R,
    sink: &mut BodySink,
) -> Result<(), RequestError> {
    loop {
        let Some((line, _)) = read_line(reader).await? else {
            return Err(RequestError::Protocol(
                "connection closed inside chunked body".to_string(),
            ));
        };
        let size_text = line
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .trim_start_matches("0x");
        let size = usize::from_str_radix(size_text, 16)
            .map_err(|_| RequestError::Protocol(format!("invalid chunk size {line:?}")))?;

        if size == 0 {
            while let Some((trailer, _)) = read_line(reader).await? {
                if trailer.is_empty() {
                    break;
                }
            }
            return Ok(());
        }

        if !read_sized(reader, size, sink).await? {
            return Ok(());
        }
        match read_line(reader).await? {
            Some((terminator, _)) if terminator.is_empty() => {}
            _ => {
                return Err(RequestError::Protocol(
                    "missing chunk terminator".to_string(),
                ));
            }
        }
    }
}

async fn read_to_close<R: AsyncBufRead + Unpin>(
    reader: &mut R,
    sink: &mut BodySink,
) -> Result<(), RequestError> {
    let mut chunk = vec![0u8; READ_CHUNK];
    loop {
        let read = reader.read(&mut chunk).await.map_err(io_error)?;
        if read == 0 || !sink.push(&chunk[..read]) {
            return Ok(());
        }
    }
}
