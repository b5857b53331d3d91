//! Shared helpers for registration integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use worker_core::registration::{ChannelKind, ChannelReply, RegistrationChannel, RegistrationRequest};
use worker_core::{Result, WorkerError};

/// What a [`MockChannel`] does when called.
#[derive(Debug, Clone)]
pub enum Behavior {
    Reply(ChannelReply),
    Fail(String),
    /// Reply after a delay, leaving room for concurrent callers.
    Slow(Duration, ChannelReply),
    Hang,
}

/// Scripted channel that records every request it receives.
#[derive(Clone)]
pub struct MockChannel {
    kind: ChannelKind,
    behavior: Behavior,
    calls: Arc<AtomicUsize>,
    requests: Arc<Mutex<Vec<RegistrationRequest>>>,
}

impl MockChannel {
    pub fn new(kind: ChannelKind, behavior: Behavior) -> Self {
        Self {
            kind,
            behavior,
            calls: Arc::new(AtomicUsize::new(0)),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn replying(kind: ChannelKind, ok: bool, worker_id: &str, poll_interval_ms: u64) -> Self {
        Self::new(
            kind,
            Behavior::Reply(ChannelReply {
                ok,
                worker_id: worker_id.to_string(),
                poll_interval_ms,
                message: None,
            }),
        )
    }

    pub fn failing(kind: ChannelKind, message: &str) -> Self {
        Self::new(kind, Behavior::Fail(message.to_string()))
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<RegistrationRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl RegistrationChannel for MockChannel {
    fn kind(&self) -> ChannelKind {
        self.kind
    }

    async fn register(&self, request: &RegistrationRequest) -> Result<ChannelReply> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());

        match &self.behavior {
            Behavior::Reply(reply) => Ok(reply.clone()),
            Behavior::Fail(message) => Err(WorkerError::call_failed(self.kind, message.clone())),
            Behavior::Slow(delay, reply) => {
                tokio::time::sleep(*delay).await;
                Ok(reply.clone())
            }
            Behavior::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Err(WorkerError::call_failed(self.kind, "hang finished"))
            }
        }
    }
}

/// One request captured by [`HttpStub`].
#[derive(Debug, Clone)]
pub struct CapturedRequest {
    pub request_line: String,
    pub body: String,
}

/// Minimal HTTP/1.1 server answering every request with the same response.
pub struct HttpStub {
    pub base_url: String,
    requests: Arc<Mutex<Vec<CapturedRequest>>>,
}

impl HttpStub {
    pub async fn spawn(status: u16, body: &'static str) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let requests = Arc::new(Mutex::new(Vec::new()));

        let captured = requests.clone();
        tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    break;
                };
                let captured = captured.clone();
                tokio::spawn(serve_one(stream, status, body, captured));
            }
        });

        Self {
            base_url: format!("http://{}", addr),
            requests,
        }
    }

    pub fn requests(&self) -> Vec<CapturedRequest> {
        self.requests.lock().unwrap().clone()
    }
}

async fn serve_one(
    mut stream: TcpStream,
    status: u16,
    body: &'static str,
    captured: Arc<Mutex<Vec<CapturedRequest>>>,
) -> Option<()> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];

    let request = loop {
        let n = stream.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);

        let Some(header_end) = buf.windows(4).position(|w| w == b"\r\n\r\n") else {
            continue;
        };
        let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
        let content_length = head
            .lines()
            .filter_map(|line| line.split_once(':'))
            .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
            .and_then(|(_, value)| value.trim().parse::<usize>().ok())
            .unwrap_or(0);

        let body_start = header_end + 4;
        if buf.len() >= body_start + content_length {
            break CapturedRequest {
                request_line: head.lines().next().unwrap_or_default().to_string(),
                body: String::from_utf8_lossy(&buf[body_start..body_start + content_length])
                    .to_string(),
            };
        }
    };

    // Record before answering so the test sees it once the client returns.
    captured.lock().unwrap().push(request);

    let reason = if (200..300).contains(&status) { "OK" } else { "Error" };
    let response = format!(
        "HTTP/1.1 {} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        reason,
        body.len(),
        body
    );
    stream.write_all(response.as_bytes()).await.ok()?;
    stream.shutdown().await.ok()?;
    Some(())
}

/// Address of a local port with nothing listening on it.
pub async fn closed_port_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}", addr)
}
