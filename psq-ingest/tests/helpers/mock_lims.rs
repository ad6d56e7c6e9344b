//! In-process LIMS mock
//!
//! Serves the token, batch and sample endpoints under a `/qbench` base path
//! on an ephemeral port. Scripted behaviors (revoked credential, throttling,
//! rejected client, slow response) are toggled through [`MockState`].
//!
//! [`spawn_dropping_api`] is a bare TCP responder that issues tokens but
//! closes every API connection without answering.

#![allow(dead_code)]

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use psq_ingest::config::LimsSettings;
use psq_ingest::lims::client::THROTTLE_TTL_HEADER;
use psq_ingest::lims::token::GRANT_TYPE;
use psq_ingest::lims::{LimsClient, RetryPolicy};

/// Stall applied to the first `sample/slow` request
pub const SLOW_RESPONSE: Duration = Duration::from_millis(400);

#[derive(Default)]
pub struct MockState {
    pub tokens_issued: AtomicUsize,
    pub token_requests: AtomicUsize,
    pub reject_auth: AtomicBool,
    /// Next request to `sample/revoked` answers 401
    pub revoke_once: AtomicBool,
    /// Next request to `sample/throttled` answers 429 with a TTL header
    pub throttle_once: AtomicBool,
    /// Next request to `sample/slow` stalls for [`SLOW_RESPONSE`]
    pub slow_once: AtomicBool,
    hits: Mutex<Vec<String>>,
}

impl MockState {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn hits(&self, path: &str) -> usize {
        self.hits
            .lock()
            .map(|hits| hits.iter().filter(|h| *h == path).count())
            .unwrap_or(0)
    }

    fn record(&self, path: String) {
        if let Ok(mut hits) = self.hits.lock() {
            hits.push(path);
        }
    }

    fn authorized(&self, headers: &HeaderMap) -> bool {
        let expected = format!("Bearer tok-{}", self.tokens_issued.load(Ordering::SeqCst));
        headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v == expected)
    }
}

async fn token(State(state): State<Arc<MockState>>, Form(form): Form<HashMap<String, String>>) -> Response {
    state.token_requests.fetch_add(1, Ordering::SeqCst);
    if state.reject_auth.load(Ordering::SeqCst) {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "invalid_client", "error_description": "bad secret"})),
        )
            .into_response();
    }

    let grant_ok = form.get("grant_type").map(String::as_str) == Some(GRANT_TYPE);
    let assertion_ok = form.get("assertion").is_some_and(|a| a.split('.').count() == 3);
    if !grant_ok || !assertion_ok {
        return StatusCode::BAD_REQUEST.into_response();
    }

    let issued = state.tokens_issued.fetch_add(1, Ordering::SeqCst) + 1;
    Json(json!({"access_token": format!("tok-{}", issued), "expires_in": 3300})).into_response()
}

fn batch_payload(id: &str) -> Option<Value> {
    match id {
        "B-1" => Some(json!({
            "data": {
                "id": "B-1",
                "sample_ids": [101, "102"],
                "samples": [{"id": "103"}],
                "relationships": {"samples": {"data": [{"id": 101, "type": "sample"}]}},
            }
        })),
        "B-2" => Some(json!({
            "data": {
                "included": [{"type": "sample", "id": "104"}, {"type": "test", "id": "9"}]
            }
        })),
        "EMPTY" => Some(json!({"data": {"id": "EMPTY"}})),
        _ => None,
    }
}

async fn batch(State(state): State<Arc<MockState>>, Path(id): Path<String>, headers: HeaderMap) -> Response {
    state.record(format!("batch/{}", id));
    if !state.authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    match batch_payload(&id) {
        Some(payload) => Json(payload).into_response(),
        None => (StatusCode::NOT_FOUND, "batch not found").into_response(),
    }
}

fn sample_payload(id: &str) -> Option<Value> {
    match id {
        "101" => Some(json!({
            "data": {
                "id": 101,
                "custom_formatted_id": "PS-0101",
                "sample_name": "Blue Dream",
                "state": "COMPLETED",
                "date_created": "2024-05-02",
                "custom_fields": {"Batch": "B-1", "Sample Weight": "502 mg"},
            }
        })),
        "102" => Some(json!({
            "data": [{
                "id": "102",
                "sample_name": "OG Kush",
                "tests": [
                    {"assay": {"title": "Moisture"}, "sample_weight": 3},
                    {"assay": {"title": "Pesticide Residue"}, "state": "COMPLETED", "sample_weight": 498},
                ],
            }]
        })),
        "104" => Some(json!({"id": 104, "sample_name": "Gelato", "sample_weight": "1,000 mg"})),
        "revoked" | "throttled" | "slow" => Some(json!({"data": {"id": id, "sample_name": "retry target"}})),
        _ => None,
    }
}

async fn sample(State(state): State<Arc<MockState>>, Path(id): Path<String>, headers: HeaderMap) -> Response {
    state.record(format!("sample/{}", id));
    if !state.authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    if id == "revoked" && state.revoke_once.swap(false, Ordering::SeqCst) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    if id == "throttled" && state.throttle_once.swap(false, Ordering::SeqCst) {
        return (StatusCode::TOO_MANY_REQUESTS, [(THROTTLE_TTL_HEADER, "0")], "slow down").into_response();
    }
    if id == "slow" && state.slow_once.swap(false, Ordering::SeqCst) {
        tokio::time::sleep(SLOW_RESPONSE).await;
    }
    if id == "always-throttled" {
        return (StatusCode::TOO_MANY_REQUESTS, "slow down").into_response();
    }
    if id == "103" {
        return (StatusCode::INTERNAL_SERVER_ERROR, "boom").into_response();
    }
    match sample_payload(&id) {
        Some(payload) => Json(payload).into_response(),
        None => (StatusCode::NOT_FOUND, "sample not found").into_response(),
    }
}

async fn sample_list(State(state): State<Arc<MockState>>, headers: HeaderMap) -> Response {
    state.record("sample".to_string());
    if !state.authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    Json(json!({
        "data": [
            {"id": 1, "custom_formatted_id": "PS-24-0001", "sample_name": "A", "batch_number": "B-77"},
            {"id": 2, "custom_formatted_id": "PS-24-0002", "sample_name": "B", "custom_fields": {"Lot": "B-78"}},
            {"id": 3, "custom_formatted_id": "PS-24-0003", "sample_name": "Batch B-77 retest"},
        ]
    }))
    .into_response()
}

/// Start the mock; returns its base URL (including the `/qbench` prefix)
pub async fn spawn(state: Arc<MockState>) -> String {
    let api = Router::new()
        .route("/oauth2/v1/token", post(token))
        .route("/api/v1/batch/:id", get(batch))
        .route("/api/v1/sample", get(sample_list))
        .route("/api/v1/sample/:id", get(sample))
        .with_state(state);
    let app = Router::new().nest("/qbench", api);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}/qbench", addr)
}

pub fn settings(base_url: &str) -> LimsSettings {
    LimsSettings {
        base_url: base_url.to_string(),
        client_id: "client-1".to_string(),
        client_secret: "s3cret".to_string(),
        jwt_leeway_s: 20,
        jwt_ttl_s: 3580,
        page_size: Some(100),
        reference_mass: 500.0,
    }
}

/// Retry policy with millisecond delays
pub fn fast_policy() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 3,
        initial_delay: Duration::from_millis(5),
        backoff_factor: 2.0,
        throttle_padding: Duration::from_millis(5),
        request_timeout: Duration::from_secs(5),
    }
}

pub fn client(settings: &LimsSettings) -> LimsClient {
    LimsClient::with_policy(settings, fast_policy()).unwrap()
}

/// Client whose per-request timeout is `timeout`
pub fn client_with_timeout(settings: &LimsSettings, timeout: Duration) -> LimsClient {
    let policy = RetryPolicy {
        request_timeout: timeout,
        ..fast_policy()
    };
    LimsClient::with_policy(settings, policy).unwrap()
}

/// Token endpoint that works, API endpoints that hang up
///
/// Returns the base URL and a counter of API connections dropped.
pub async fn spawn_dropping_api() -> (String, Arc<AtomicUsize>) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let dropped = Arc::new(AtomicUsize::new(0));

    let counter = dropped.clone();
    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let counter = counter.clone();
            tokio::spawn(async move {
                let Some(head) = read_request(&mut socket).await else {
                    return;
                };
                if head.starts_with("POST /qbench/oauth2/v1/token") {
                    let body = r#"{"access_token":"tok-1","expires_in":3300}"#;
                    let response = format!(
                        "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                        body.len(),
                        body
                    );
                    let _ = socket.write_all(response.as_bytes()).await;
                    let _ = socket.shutdown().await;
                } else {
                    counter.fetch_add(1, Ordering::SeqCst);
                }
            });
        }
    });

    (format!("http://{}/qbench", addr), dropped)
}

/// Read one request (head plus any content-length body); returns the head
async fn read_request(socket: &mut TcpStream) -> Option<String> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    loop {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);

        let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") else {
            continue;
        };
        let head = String::from_utf8_lossy(&buf[..end]).to_string();
        let content_length = head
            .lines()
            .filter_map(|line| line.split_once(':'))
            .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
            .and_then(|(_, value)| value.trim().parse::<usize>().ok())
            .unwrap_or(0);
        while buf.len() < end + 4 + content_length {
            let n = socket.read(&mut chunk).await.ok()?;
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);
        }
        return Some(head);
    }
}
