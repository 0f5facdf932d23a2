use std::io::{BufRead, BufReader, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::thread;
use std::time::{Duration, Instant};

use parity_core::{CanonicalRequest, CanonicalResult, FailureKind, ReplayOptions, Target};
use parity_runtime::{ExecutionUnit, ReplayController, ReplayUpdate, WorkerPool};

const DEADLINE: Duration = Duration::from_secs(10);

/// Answers every connection with `status` and a JSON body naming `name`.
fn spawn_server(status: u16, name: &'static str) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let addr = listener.local_addr().expect("addr");
    thread::spawn(move || {
        for stream in listener.incoming() {
            let Ok(stream) = stream else { break };
            thread::spawn(move || respond(stream, status, name));
        }
    });
    addr
}

fn respond(mut stream: TcpStream, status: u16, name: &str) {
    let mut reader = BufReader::new(stream.try_clone().expect("clone"));
    let mut line = String::new();
    while reader.read_line(&mut line).unwrap_or(0) > 0 {
        if line == "\r\n" {
            break;
        }
        line.clear();
    }
    let body = format!("{{\"server\":\"{name}\"}}");
    let response = format!(
        "HTTP/1.1 {status} OK\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
        body.len()
    );
    let _ = stream.write_all(response.as_bytes());
}

/// Accepts connections and never answers.
fn spawn_silent_server() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let addr = listener.local_addr().expect("addr");
    thread::spawn(move || {
        let mut held = Vec::new();
        for stream in listener.incoming() {
            let Ok(stream) = stream else { break };
            held.push(stream);
        }
    });
    addr
}

fn refused_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    listener.local_addr().expect("addr")
}

fn target(addr: SocketAddr, position: usize) -> Target {
    Target::from_url(&format!("http://{addr}"), position).expect("target")
}

fn wait_for_completion(
    controller: &mut ReplayController<WorkerPool>,
    session_id: &str,
) -> Vec<CanonicalResult> {
    let started = Instant::now();
    while started.elapsed() < DEADLINE {
        match controller.next_update(Duration::from_millis(100)).expect("update") {
            Some(ReplayUpdate::Complete {
                session_id: done,
                results,
            }) if done == session_id => return results,
            Some(ReplayUpdate::UnitFailed { message, .. }) => panic!("unit failed: {message}"),
            _ => {}
        }
    }
    panic!("session {session_id} did not complete in time");
}

#[test]
fn replays_against_every_target_in_order() {
    let primary = spawn_server(200, "primary");
    let secondary = spawn_server(404, "secondary");
    let mut controller = ReplayController::with_worker_pool();

    let session_id = controller
        .dispatch(
            CanonicalRequest::new("GET", "/api/users"),
            vec![target(primary, 0), target(secondary, 1)],
            ReplayOptions::default(),
        )
        .expect("dispatch");
    let results = wait_for_completion(&mut controller, &session_id);

    assert_eq!(results.len(), 2);
    assert_eq!(results[0].target, format!("http://{primary}"));
    assert_eq!(results[0].status, 200);
    assert_eq!(results[0].body, "{\"server\":\"primary\"}");
    assert_eq!(results[1].status, 404);
    assert_eq!(controller.unit().spawned(), 1);
    controller.shutdown();
}

#[test]
fn refused_target_does_not_affect_siblings() {
    let healthy = spawn_server(200, "healthy");
    let refused = refused_addr();
    let mut controller = ReplayController::with_worker_pool();

    let session_id = controller
        .dispatch(
            CanonicalRequest::new("GET", "/"),
            vec![target(healthy, 0), target(refused, 1)],
            ReplayOptions::default(),
        )
        .expect("dispatch");
    let results = wait_for_completion(&mut controller, &session_id);

    assert_eq!(results[0].status, 200);
    assert_eq!(results[1].status, 0);
    assert_eq!(
        results[1].error.as_ref().map(|error| error.kind),
        Some(FailureKind::Connection)
    );
    controller.shutdown();
}

#[test]
fn cancelled_session_completes_with_cancelled_results() {
    let silent = spawn_silent_server();
    let mut controller = ReplayController::with_worker_pool();
    let options = ReplayOptions {
        timeout_ms: 0,
        ..Default::default()
    };

    let session_id = controller
        .dispatch(
            CanonicalRequest::new("GET", "/slow"),
            vec![target(silent, 0)],
            options,
        )
        .expect("dispatch");
    thread::sleep(Duration::from_millis(200));
    assert!(controller.cancel(&session_id).expect("cancel"));
    let results = wait_for_completion(&mut controller, &session_id);

    assert_eq!(
        results[0].error.as_ref().map(|error| error.kind),
        Some(FailureKind::Cancelled)
    );
    controller.shutdown();
}

#[test]
fn disposed_unit_is_replaced_on_next_dispatch() {
    let server = spawn_server(200, "server");
    let mut controller = ReplayController::with_worker_pool();

    let first = controller
        .dispatch(
            CanonicalRequest::new("GET", "/"),
            vec![target(server, 0)],
            ReplayOptions::default(),
        )
        .expect("dispatch");
    wait_for_completion(&mut controller, &first);

    let (sender, receiver) = crossbeam_channel::unbounded();
    let mut pool = WorkerPool::new(sender);
    pool.execute(
        "manual",
        CanonicalRequest::new("GET", "/"),
        vec![target(server, 0)],
        ReplayOptions::default(),
    )
    .expect("execute");
    assert!(pool.is_running());
    pool.dispose();
    assert!(!pool.is_running());

    pool.execute(
        "again",
        CanonicalRequest::new("GET", "/"),
        vec![target(server, 0)],
        ReplayOptions::default(),
    )
    .expect("execute after dispose");
    assert_eq!(pool.spawned(), 2);

    let started = Instant::now();
    let mut completed = false;
    while started.elapsed() < DEADLINE && !completed {
        if let Ok(parity_core::WorkerMessage::Result { session_id, result }) =
            receiver.recv_timeout(Duration::from_millis(100))
        {
            completed = session_id == "again" && result.status == 200;
        }
    }
    assert!(completed, "fresh unit should serve the new session");
    pool.dispose();
    controller.shutdown();
}
