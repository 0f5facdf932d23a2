use std::net::SocketAddr;
use std::time::Duration;

use assert_matches::assert_matches;
use http::Method;
use parity_core::{FailureKind, Phase};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use url::Url;

use crate::{CancelToken, Client, ClientConfig, Request, RequestError, classify_error};

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

async fn read_request(stream: &mut TcpStream) -> String {
    let mut data = Vec::new();
    let mut buf = [0u8; 1024];
    loop {
        if let Some(end) = find(&data, b"\r\n\r\n") {
            let head = String::from_utf8_lossy(&data[..end]).to_ascii_lowercase();
            let length = head
                .lines()
                .find_map(|line| line.strip_prefix("content-length:"))
                .and_then(|value| value.trim().parse::<usize>().ok())
                .unwrap_or(0);
            if data.len() >= end + 4 + length {
                break;
            }
        }
        let n = stream.read(&mut buf).await.unwrap_or(0);
        if n == 0 {
            break;
        }
        data.extend_from_slice(&buf[..n]);
    }
    String::from_utf8_lossy(&data).into_owned()
}

/// Serves one canned response per connection and reports each raw request.
async fn serve(responses: Vec<&'static [u8]>) -> (SocketAddr, mpsc::UnboundedReceiver<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (sender, receiver) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        for response in responses {
            let Ok((mut stream, _)) = listener.accept().await else {
                return;
            };
            let request = read_request(&mut stream).await;
            let _ = sender.send(request);
            let _ = stream.write_all(response).await;
            let _ = stream.shutdown().await;
        }
    });

    (addr, receiver)
}

/// Accepts a connection and never answers.
async fn serve_silent() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        if let Ok((mut stream, _)) = listener.accept().await {
            let _ = read_request(&mut stream).await;
            tokio::time::sleep(Duration::from_secs(10)).await;
        }
    });
    addr
}

fn get(addr: SocketAddr, path: &str) -> Request {
    Request::builder(Url::parse(&format!("http://{addr}{path}")).unwrap()).build()
}

#[tokio::test]
async fn request_returns_response() {
    let (addr, _) = serve(vec![b"HTTP/1.1 200 OK\r\nContent-Length: 2\r\nX-A: 1\r\n\r\nOK"]).await;
    let client = Client::new(ClientConfig::default());

    let mut phases = Vec::new();
    let response = client
        .send(get(addr, "/"), &CancelToken::new(), |phase| phases.push(phase))
        .await
        .unwrap();

    assert_eq!(response.status, 200);
    assert_eq!(response.body, b"OK".to_vec());
    assert_eq!(response.header("x-a"), Some("1"));
    assert!(!response.truncated);
    assert_eq!(phases, vec![Phase::Connecting, Phase::Sending, Phase::Receiving]);
}

#[tokio::test]
async fn writes_host_and_content_length() {
    let (addr, mut requests) =
        serve(vec![b"HTTP/1.1 201 Created\r\nContent-Length: 0\r\n\r\n"]).await;
    let client = Client::new(ClientConfig::default());
    let request = Request::builder(Url::parse(&format!("http://{addr}/submit?x=1")).unwrap())
        .method(Method::POST)
        .header("host", "ignored.example")
        .header("x-trace", "abc")
        .body(b"hello".to_vec())
        .build();

    let response = client.send(request, &CancelToken::new(), |_| {}).await.unwrap();
    assert_eq!(response.status, 201);

    let raw = requests.recv().await.unwrap();
    assert!(raw.starts_with("POST /submit?x=1 HTTP/1.1\r\n"));
    assert!(raw.contains(&format!("Host: {addr}\r\n")));
    assert!(!raw.contains("ignored.example"));
    assert!(raw.contains("x-trace: abc\r\n"));
    assert!(raw.contains("Content-Length: 5\r\n"));
    assert!(raw.contains("Connection: close\r\n"));
    assert!(raw.ends_with("\r\n\r\nhello"));
}

#[tokio::test]
async fn reads_chunked_body() {
    let (addr, _) = serve(vec![
        b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n4\r\nWiki\r\n5;ext=1\r\npedia\r\n0\r\n\r\n",
    ])
    .await;
    let client = Client::new(ClientConfig::default());
    let response = client.send(get(addr, "/"), &CancelToken::new(), |_| {}).await.unwrap();
    assert_eq!(response.body, b"Wikipedia".to_vec());
}

#[tokio::test]
async fn reads_close_delimited_body() {
    let (addr, _) = serve(vec![b"HTTP/1.0 200 OK\r\nContent-Type: text/plain\r\n\r\nbye"]).await;
    let client = Client::new(ClientConfig::default());
    let response = client.send(get(addr, "/"), &CancelToken::new(), |_| {}).await.unwrap();
    assert_eq!(response.body, b"bye".to_vec());
}

#[tokio::test]
async fn skips_interim_responses_and_head_bodies() {
    let (addr, _) = serve(vec![
        b"HTTP/1.1 100 Continue\r\n\r\nHTTP/1.1 204 No Content\r\n\r\n",
        b"HTTP/1.1 200 OK\r\nContent-Length: 10\r\n\r\n",
    ])
    .await;
    let client = Client::new(ClientConfig::default());

    let response = client.send(get(addr, "/"), &CancelToken::new(), |_| {}).await.unwrap();
    assert_eq!(response.status, 204);

    let head = Request::builder(Url::parse(&format!("http://{addr}/")).unwrap())
        .method(Method::HEAD)
        .build();
    let response = client.send(head, &CancelToken::new(), |_| {}).await.unwrap();
    assert_eq!(response.status, 200);
    assert!(response.body.is_empty());
}

#[tokio::test]
async fn caps_body_at_limit() {
    let (addr, _) = serve(vec![b"HTTP/1.1 200 OK\r\nContent-Length: 10\r\n\r\n0123456789"]).await;
    let client = Client::new(ClientConfig {
        max_body_bytes: 4,
        ..ClientConfig::default()
    });
    let response = client.send(get(addr, "/"), &CancelToken::new(), |_| {}).await.unwrap();
    assert_eq!(response.body, b"0123".to_vec());
    assert!(response.truncated);
}

#[tokio::test]
async fn body_exactly_at_limit_is_not_truncated() {
    let (addr, _) = serve(vec![b"HTTP/1.1 200 OK\r\nContent-Length: 4\r\n\r\nabcd"]).await;
    let client = Client::new(ClientConfig {
        max_body_bytes: 4,
        ..ClientConfig::default()
    });
    let response = client.send(get(addr, "/"), &CancelToken::new(), |_| {}).await.unwrap();
    assert_eq!(response.body, b"abcd".to_vec());
    assert!(!response.truncated);
}

#[tokio::test]
async fn follows_redirects() {
    let (addr, mut requests) = serve(vec![
        b"HTTP/1.1 302 Found\r\nLocation: /final\r\nContent-Length: 0\r\n\r\n",
        b"HTTP/1.1 200 OK\r\nContent-Length: 4\r\n\r\ndone",
    ])
    .await;
    let client = Client::new(ClientConfig::default());

    let response = client.send(get(addr, "/start"), &CancelToken::new(), |_| {}).await.unwrap();
    assert_eq!(response.status, 200);
    assert_eq!(response.body, b"done".to_vec());
    assert!(requests.recv().await.unwrap().starts_with("GET /start "));
    assert!(requests.recv().await.unwrap().starts_with("GET /final "));
}

#[tokio::test]
async fn see_other_switches_post_to_get() {
    let (addr, mut requests) = serve(vec![
        b"HTTP/1.1 303 See Other\r\nLocation: /result\r\nContent-Length: 0\r\n\r\n",
        b"HTTP/1.1 200 OK\r\nContent-Length: 0\r\n\r\n",
    ])
    .await;
    let client = Client::new(ClientConfig::default());
    let request = Request::builder(Url::parse(&format!("http://{addr}/form")).unwrap())
        .method(Method::POST)
        .body(b"a=1".to_vec())
        .build();

    client.send(request, &CancelToken::new(), |_| {}).await.unwrap();
    assert!(requests.recv().await.unwrap().starts_with("POST /form "));
    let second = requests.recv().await.unwrap();
    assert!(second.starts_with("GET /result "));
    assert!(!second.contains("a=1"));
}

#[tokio::test]
async fn redirects_are_returned_when_not_followed() {
    let (addr, _) =
        serve(vec![b"HTTP/1.1 301 Moved\r\nLocation: /elsewhere\r\nContent-Length: 0\r\n\r\n"]).await;
    let client = Client::new(ClientConfig {
        follow_redirects: false,
        ..ClientConfig::default()
    });
    let response = client.send(get(addr, "/"), &CancelToken::new(), |_| {}).await.unwrap();
    assert_eq!(response.status, 301);
    assert_eq!(response.header("location"), Some("/elsewhere"));
}

#[tokio::test]
async fn redirect_loops_are_bounded() {
    let hop: &'static [u8] = b"HTTP/1.1 302 Found\r\nLocation: /loop\r\nContent-Length: 0\r\n\r\n";
    let (addr, _) = serve(vec![hop, hop, hop]).await;
    let client = Client::new(ClientConfig {
        max_redirects: 2,
        ..ClientConfig::default()
    });
    let result = client.send(get(addr, "/loop"), &CancelToken::new(), |_| {}).await;
    assert_matches!(result, Err(RequestError::TooManyRedirects(2)));
}

#[tokio::test]
async fn times_out_silent_servers() {
    let addr = serve_silent().await;
    let client = Client::new(ClientConfig {
        timeout: Some(Duration::from_millis(100)),
        ..ClientConfig::default()
    });
    let result = client.send(get(addr, "/"), &CancelToken::new(), |_| {}).await;
    assert_matches!(result, Err(RequestError::Timeout(100)));
    assert_eq!(
        classify_error(&result.unwrap_err()).kind,
        FailureKind::Timeout
    );
}

#[tokio::test]
async fn cancellation_aborts_in_flight_request() {
    let addr = serve_silent().await;
    let client = Client::new(ClientConfig::default());
    let cancel = CancelToken::new();

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let result = client.send(get(addr, "/"), &cancel, |_| {}).await;
    assert_matches!(result, Err(RequestError::Cancelled));
}

#[tokio::test]
async fn cancelled_token_never_connects() {
    let client = Client::new(ClientConfig::default());
    let cancel = CancelToken::new();
    cancel.cancel();

    let mut phases = Vec::new();
    let request = Request::builder(Url::parse("http://127.0.0.1:9/").unwrap()).build();
    let result = client.send(request, &cancel, |phase| phases.push(phase)).await;
    assert_matches!(result, Err(RequestError::Cancelled));
    assert!(phases.is_empty());
}

#[tokio::test]
async fn refused_connection_is_classified() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = Client::new(ClientConfig::default());
    let result = client.send(get(addr, "/"), &CancelToken::new(), |_| {}).await;
    let error = result.unwrap_err();
    assert_matches!(error, RequestError::Connect(_));
    assert_eq!(classify_error(&error).kind, FailureKind::Connection);
}
