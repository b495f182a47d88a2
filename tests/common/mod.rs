//! In-process relay for integration tests
//!
//! Speaks just enough HTTP/1.1 for the session endpoints and hands
//! `/player/connect` upgrades to tungstenite, recording what it saw.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::StreamExt;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio_tungstenite::accept_hdr_async;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::Message;

/// Host name the relay reports for validated sessions.
pub const RELAY_HOST_NAME: &str = "Relay Host";

/// How the relay answers `/player/connect`.
#[derive(Debug, Clone)]
pub enum Upgrade {
    Accept,
    Reject {
        status: u16,
        body: String,
        delivery: Delivery,
    },
}

/// How a refused upgrade's response travels on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Head and body in one write
    Whole,
    /// Head first, body in a later write
    Split,
    /// `Transfer-Encoding: chunked`, one chunk per write
    Chunked,
}

#[derive(Debug)]
struct State {
    upgrade: Upgrade,
    tokens: Mutex<HashSet<String>>,
    registrations: AtomicUsize,
    upgrades: AtomicUsize,
    closes: AtomicUsize,
    upgrade_headers: Mutex<Vec<HashMap<String, String>>>,
}

pub struct TestRelay {
    addr: SocketAddr,
    state: Arc<State>,
    task: JoinHandle<()>,
}

impl TestRelay {
    pub async fn start(upgrade: Upgrade) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let state = Arc::new(State {
            upgrade,
            tokens: Mutex::new(HashSet::new()),
            registrations: AtomicUsize::new(0),
            upgrades: AtomicUsize::new(0),
            closes: AtomicUsize::new(0),
            upgrade_headers: Mutex::new(Vec::new()),
        });

        let accept_state = state.clone();
        let task = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                tokio::spawn(handle(stream, accept_state.clone()));
            }
        });

        Self { addr, state, task }
    }

    /// Make `token` known to the relay as if it had been registered earlier.
    pub fn seed_token(&self, token: &str) {
        self.state.tokens.lock().unwrap().insert(token.to_string());
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn registrations(&self) -> usize {
        self.state.registrations.load(Ordering::SeqCst)
    }

    pub fn upgrades(&self) -> usize {
        self.state.upgrades.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.state.closes.load(Ordering::SeqCst)
    }

    /// Headers of every accepted upgrade, names lower-cased.
    pub fn upgrade_headers(&self) -> Vec<HashMap<String, String>> {
        self.state.upgrade_headers.lock().unwrap().clone()
    }

    /// Wait until the relay has seen `n` close frames.
    pub async fn wait_for_closes(&self, n: usize) {
        for _ in 0..100 {
            if self.closes() >= n {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("relay saw {} close frames, expected {}", self.closes(), n);
    }
}

impl Drop for TestRelay {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn handle(mut stream: TcpStream, state: Arc<State>) {
    let Some(head) = peek_head(&stream).await else {
        return;
    };

    let mut request_line = head.lines().next().unwrap_or_default().split_whitespace();
    let method = request_line.next().unwrap_or_default().to_string();
    let path = request_line.next().unwrap_or_default().to_string();

    if method == "GET" && path == "/player/connect" {
        state.upgrades.fetch_add(1, Ordering::SeqCst);
        match &state.upgrade {
            Upgrade::Accept => serve_socket(stream, state.clone()).await,
            Upgrade::Reject {
                status,
                body,
                delivery,
            } => {
                let mut consumed = vec![0u8; head.len()];
                if stream.read_exact(&mut consumed).await.is_err() {
                    return;
                }
                match delivery {
                    Delivery::Whole => respond(&mut stream, *status, body).await,
                    Delivery::Split => respond_split(&mut stream, *status, body).await,
                    Delivery::Chunked => respond_chunked(&mut stream, *status, body).await,
                }
            }
        }
        return;
    }

    let mut consumed = vec![0u8; head.len()];
    if stream.read_exact(&mut consumed).await.is_err() {
        return;
    }
    let headers = parse_headers(&head);
    let length = headers
        .get("content-length")
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(0);
    let mut body = vec![0u8; length];
    if stream.read_exact(&mut body).await.is_err() {
        return;
    }

    let bearer = headers
        .get("authorization")
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::to_string);

    match (method.as_str(), path.as_str()) {
        ("POST", "/player/register") => {
            let n = state.registrations.fetch_add(1, Ordering::SeqCst) + 1;
            let token = format!("tok-{}", n);
            state.tokens.lock().unwrap().insert(token.clone());
            let body = serde_json::json!({
                "client_url": format!("http://relay.test/c/{}", n),
                "session_token": token,
            });
            respond(&mut stream, 201, &body.to_string()).await;
        }
        ("GET", "/player/session") => {
            let known = bearer
                .map(|t| state.tokens.lock().unwrap().contains(&t))
                .unwrap_or(false);
            if known {
                let body = serde_json::json!({ "host_name": RELAY_HOST_NAME });
                respond(&mut stream, 200, &body.to_string()).await;
            } else {
                let body = serde_json::json!({
                    "code": "unknown",
                    "message": "unknown session",
                    "id": "test-relay"
                });
                respond(&mut stream, 401, &body.to_string()).await;
            }
        }
        ("DELETE", "/player/session") => {
            let removed = bearer
                .map(|t| state.tokens.lock().unwrap().remove(&t))
                .unwrap_or(false);
            respond(&mut stream, if removed { 204 } else { 404 }, "").await;
        }
        _ => respond(&mut stream, 404, "").await,
    }
}

async fn serve_socket(stream: TcpStream, state: Arc<State>) {
    let recorder = state.clone();
    let callback = move |req: &Request, resp: Response| -> Result<Response, ErrorResponse> {
        let headers = req
            .headers()
            .iter()
            .map(|(k, v)| {
                (
                    k.as_str().to_ascii_lowercase(),
                    v.to_str().unwrap_or_default().to_string(),
                )
            })
            .collect();
        recorder.upgrade_headers.lock().unwrap().push(headers);
        Ok(resp)
    };

    let Ok(mut ws) = accept_hdr_async(stream, callback).await else {
        return;
    };

    while let Some(msg) = ws.next().await {
        match msg {
            Ok(Message::Close(_)) => {
                state.closes.fetch_add(1, Ordering::SeqCst);
                break;
            }
            Ok(_) => continue,
            Err(_) => break,
        }
    }
}

/// Wait for a complete request head without consuming it.
async fn peek_head(stream: &TcpStream) -> Option<String> {
    let mut buf = vec![0u8; 16 * 1024];
    loop {
        let n = stream.peek(&mut buf).await.ok()?;
        if n == 0 {
            return None;
        }
        if let Some(end) = buf[..n].windows(4).position(|w| w == b"\r\n\r\n") {
            return Some(String::from_utf8_lossy(&buf[..end + 4]).into_owned());
        }
        if n == buf.len() {
            return None;
        }
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
}

fn parse_headers(head: &str) -> HashMap<String, String> {
    head.lines()
        .skip(1)
        .filter_map(|line| line.split_once(':'))
        .map(|(k, v)| (k.trim().to_ascii_lowercase(), v.trim().to_string()))
        .collect()
}

fn reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        201 => "Created",
        204 => "No Content",
        401 => "Unauthorized",
        404 => "Not Found",
        500 => "Internal Server Error",
        _ => "Status",
    }
}

/// Write a full response in a single write and close.
async fn respond(stream: &mut TcpStream, status: u16, body: &str) {
    let reason = reason(status);
    let response = if status == 204 {
        format!("HTTP/1.1 204 {}\r\nConnection: close\r\n\r\n", reason)
    } else {
        format!(
            "HTTP/1.1 {} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            status,
            reason,
            body.len(),
            body
        )
    };
    let _ = stream.write_all(response.as_bytes()).await;
    let _ = stream.shutdown().await;
}

/// Send the head, pause, then send the body.
async fn respond_split(stream: &mut TcpStream, status: u16, body: &str) {
    let head = format!(
        "HTTP/1.1 {} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        status,
        reason(status),
        body.len()
    );
    let _ = stream.write_all(head.as_bytes()).await;
    let _ = stream.flush().await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    let _ = stream.write_all(body.as_bytes()).await;
    let _ = stream.shutdown().await;
}

/// Send the body as two chunks, each in its own write.
async fn respond_chunked(stream: &mut TcpStream, status: u16, body: &str) {
    let head = format!(
        "HTTP/1.1 {} {}\r\nContent-Type: application/json\r\nTransfer-Encoding: chunked\r\nConnection: close\r\n\r\n",
        status,
        reason(status)
    );
    let _ = stream.write_all(head.as_bytes()).await;
    let _ = stream.flush().await;

    let (first, second) = body.split_at(body.len() / 2);
    for chunk in [first, second] {
        tokio::time::sleep(Duration::from_millis(20)).await;
        let frame = format!("{:x}\r\n{}\r\n", chunk.len(), chunk);
        let _ = stream.write_all(frame.as_bytes()).await;
        let _ = stream.flush().await;
    }
    let _ = stream.write_all(b"0\r\n\r\n").await;
    let _ = stream.shutdown().await;
}
