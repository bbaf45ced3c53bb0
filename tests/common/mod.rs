//! Scripted in-memory NVR used by the integration tests.
//!
//! Replies are queued per `METHOD /path?query`. The last reply of a route is
//! sticky, so a single scripted reply answers every later request too.
//! Unscripted routes answer `404`.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use tokio::time::Instant;

use nvrclip::config::Config;
use nvrclip::error::{NvrError, Result};
use nvrclip::transport::{Method, Request, Response, SharedTransport, Transport};

pub const BASE_URL: &str = "http://nvr:5000/api";

#[derive(Debug, Clone)]
pub enum Reply {
    Http { status: u16, body: Bytes, content_type: Option<String> },
    Fail(String),
}

impl Reply {
    pub fn ok(body: impl Into<Bytes>) -> Self {
        Reply::Http { status: 200, body: body.into(), content_type: None }
    }

    pub fn json(value: serde_json::Value) -> Self {
        Reply::Http {
            status: 200,
            body: Bytes::from(value.to_string()),
            content_type: Some("application/json".into()),
        }
    }

    pub fn status(status: u16) -> Self {
        Reply::Http { status, body: Bytes::new(), content_type: None }
    }

    pub fn empty() -> Self {
        Reply::ok(Bytes::new())
    }
}

#[derive(Debug, Clone)]
pub struct Call {
    pub method: Method,
    /// Path plus query, e.g. `/api/cam/recordings?after=1&before=2`.
    pub target: String,
    pub json: Option<serde_json::Value>,
    /// Tokio clock at send time, meaningful under paused time.
    pub at: Instant,
}

#[derive(Default)]
pub struct FakeNvr {
    routes: Mutex<HashMap<String, VecDeque<Reply>>>,
    calls: Mutex<Vec<Call>>,
}

fn key(method: Method, target: &str) -> String {
    format!("{method:?} {target}")
}

impl FakeNvr {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Queue `reply` for `GET target`.
    pub fn on_get(&self, target: &str, reply: Reply) {
        self.on(Method::Get, target, reply);
    }

    pub fn on(&self, method: Method, target: &str, reply: Reply) {
        self.routes.lock().entry(key(method, target)).or_default().push_back(reply);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    /// Number of requests (any method) whose target equals `target`.
    pub fn count(&self, target: &str) -> usize {
        self.calls.lock().iter().filter(|c| c.target == target).count()
    }

    pub fn targets(&self) -> Vec<String> {
        self.calls.lock().iter().map(|c| c.target.clone()).collect()
    }
}

#[async_trait]
impl Transport for FakeNvr {
    async fn send(&self, request: Request) -> Result<Response> {
        let target = match request.url.query() {
            Some(q) => format!("{}?{q}", request.url.path()),
            None => request.url.path().to_string(),
        };
        self.calls.lock().push(Call {
            method: request.method,
            target: target.clone(),
            json: request.json.clone(),
            at: Instant::now(),
        });

        let reply = {
            let mut routes = self.routes.lock();
            match routes.get_mut(&key(request.method, &target)) {
                Some(queue) if queue.len() > 1 => queue.pop_front(),
                Some(queue) => queue.front().cloned(),
                None => None,
            }
        };

        match reply.unwrap_or_else(|| Reply::status(404)) {
            Reply::Http { status, body, content_type } => Ok(Response {
                status,
                url: request.url.to_string(),
                content_type,
                body,
            }),
            Reply::Fail(reason) => Err(NvrError::transport(&request.url, reason)),
        }
    }
}

pub fn shared(fake: &Arc<FakeNvr>) -> SharedTransport {
    fake.clone()
}

/// Config for tests: offset -3h, fast retries, fast export polling.
pub fn config(extra: &str) -> Config {
    let text = format!(
        r#"
        [server]
        base_url = "{BASE_URL}"
        timezone_offset_hours = -3

        [retrieval]
        direct_attempts = 3
        direct_retry_delay_ms = 5
        {extra}

        [export]
        max_wait_ms = 5000
        poll_interval_ms = 2000
        "#
    );
    Config::from_toml(&text).expect("test config")
}

/// Fake MP4 payload: `ftyp` box header followed by filler.
pub fn mp4_payload(len: usize) -> Vec<u8> {
    let mut data = vec![0u8; len.max(16)];
    data[..4].copy_from_slice(&0x20u32.to_be_bytes());
    data[4..8].copy_from_slice(b"ftyp");
    data[8..12].copy_from_slice(b"isom");
    data
}

// Scenario constants: local 2023-11-14 22:13:20 .. 23:13:20 at offset -3h.
pub const CAMERA: &str = "front-door";
pub const LOCAL_START: i64 = 1_700_000_000;
pub const LOCAL_END: i64 = 1_700_003_600;
pub const SERVER_START: i64 = 1_700_010_800;
pub const SERVER_END: i64 = 1_700_014_400;
/// Server "now", comfortably after the scenario range.
pub const NOW: i64 = 1_700_100_000;

pub fn summary_target() -> String {
    format!("/api/{CAMERA}/recordings/summary?after={LOCAL_START}&before={LOCAL_END}")
}

pub fn direct_target() -> String {
    format!("/api/{CAMERA}/start/{SERVER_START}/end/{SERVER_END}/clip.mp4")
}

pub fn vod_dir() -> String {
    format!("/vod/{CAMERA}/start/{SERVER_START}/end/{SERVER_END}")
}

pub fn master_target() -> String {
    format!("{}/master.m3u8", vod_dir())
}

pub fn recordings_target() -> String {
    format!("/api/{CAMERA}/recordings?after={SERVER_START}&before={SERVER_END}")
}
