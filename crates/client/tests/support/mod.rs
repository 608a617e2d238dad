// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-process mock of the medilink backend: envelope REST endpoints, a
//! cookie-based session, and a broadcast-driven `/ws` endpoint.

// Each test binary uses a different slice of this module.
#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{delete, get, post, put};
use axum::Json;
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::sync::broadcast;

pub const SESSION_COOKIE: &str = "sid=mock-session";
pub const GOOD_PASSWORD: &str = "secret";
pub const LOGIN_REJECTION: &str = "Invalid email or password";
pub const SURFACE_TOTAL: usize = 120;

pub struct MockState {
    pub login_attempts: AtomicU32,
    pub doctors_hits: AtomicU32,
    pub history_hits: AtomicU32,
    pub notifications_hits: AtomicU32,
    pub ws_connections: AtomicU32,
    /// Frames every connected WS client receives.
    pub inbound_tx: broadcast::Sender<String>,
    /// Client → server frames, as parsed JSON.
    pub received: Mutex<Vec<serde_json::Value>>,
}

pub struct MockBackend {
    pub addr: SocketAddr,
    pub state: Arc<MockState>,
}

impl MockBackend {
    pub fn api_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Push one server→client frame to every connected WS client.
    pub fn push_frame(&self, frame: serde_json::Value) {
        let _ = self.state.inbound_tx.send(frame.to_string());
    }
}

/// Bind the mock backend on an ephemeral port.
pub async fn spawn_backend() -> anyhow::Result<MockBackend> {
    let (inbound_tx, _) = broadcast::channel(64);
    let state = Arc::new(MockState {
        login_attempts: AtomicU32::new(0),
        doctors_hits: AtomicU32::new(0),
        history_hits: AtomicU32::new(0),
        notifications_hits: AtomicU32::new(0),
        ws_connections: AtomicU32::new(0),
        inbound_tx,
        received: Mutex::new(Vec::new()),
    });

    let router = axum::Router::new()
        .route("/api/auth/login", post(login))
        .route("/api/auth/logout", post(logout))
        .route("/api/secure", get(always_unauthorized))
        .route("/api/forbidden", get(always_forbidden))
        .route("/api/broken", get(always_broken))
        .route("/api/doctors", get(doctors))
        .route("/api/appointments", get(list_appointments).post(book_appointment))
        .route("/api/appointments/{id}", delete(cancel_appointment))
        .route("/api/notifications", get(notifications))
        .route("/api/notifications/{id}/read", put(ok_empty))
        .route("/api/reports", post(upload_report))
        .route("/api/users/me", put(update_profile))
        .route("/api/chat/{kind}/{id}", get(history))
        .route("/ws", get(ws_upgrade))
        .with_state(Arc::clone(&state));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });

    Ok(MockBackend { addr, state })
}

fn envelope(data: serde_json::Value) -> Json<serde_json::Value> {
    Json(serde_json::json!({ "success": true, "data": data }))
}

fn failure(message: &str) -> serde_json::Value {
    serde_json::json!({ "success": false, "message": message })
}

fn has_session(headers: &HeaderMap) -> bool {
    headers
        .get(header::COOKIE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|cookies| cookies.contains(SESSION_COOKIE))
}

async fn login(
    State(state): State<Arc<MockState>>,
    Json(body): Json<serde_json::Value>,
) -> impl IntoResponse {
    state.login_attempts.fetch_add(1, Ordering::SeqCst);

    let password = body.get("password").and_then(|v| v.as_str()).unwrap_or_default();
    if password != GOOD_PASSWORD {
        return (StatusCode::UNAUTHORIZED, Json(failure(LOGIN_REJECTION))).into_response();
    }

    let email = body.get("email").and_then(|v| v.as_str()).unwrap_or("a@x.com");
    // The real backend leaks a token field next to the identity; the SDK
    // must drop it at the deserialization boundary.
    let data = serde_json::json!({
        "id": "u1",
        "name": "A",
        "email": email,
        "role": "PATIENT",
        "token": "leaked-bearer-token",
    });
    (
        [(header::SET_COOKIE, format!("{SESSION_COOKIE}; Path=/; HttpOnly"))],
        envelope(data),
    )
        .into_response()
}

async fn logout() -> impl IntoResponse {
    envelope(serde_json::Value::Null)
}

async fn always_unauthorized() -> impl IntoResponse {
    (StatusCode::UNAUTHORIZED, Json(failure("session invalid")))
}

async fn always_forbidden() -> impl IntoResponse {
    (StatusCode::FORBIDDEN, Json(failure("not allowed")))
}

async fn always_broken() -> impl IntoResponse {
    (StatusCode::INTERNAL_SERVER_ERROR, Json(failure("server exploded")))
}

async fn doctors(State(state): State<Arc<MockState>>) -> impl IntoResponse {
    state.doctors_hits.fetch_add(1, Ordering::SeqCst);
    envelope(serde_json::json!([
        { "id": "d1", "name": "Dr. Ayesha", "specialty": "cardiology", "city": "lahore" },
        { "id": "d2", "name": "Dr. Bilal", "specialty": "dermatology", "city": "karachi" },
    ]))
}

async fn list_appointments() -> impl IntoResponse {
    envelope(serde_json::json!([
        {
            "id": "apt1",
            "doctor_id": "d1",
            "patient_id": "u1",
            "starts_at_ms": 1_700_000_000_000u64,
            "status": "confirmed",
        },
    ]))
}

async fn book_appointment(Json(body): Json<serde_json::Value>) -> impl IntoResponse {
    let doctor_id = body.get("doctorId").and_then(|v| v.as_str()).unwrap_or_default();
    envelope(serde_json::json!({
        "id": "apt1",
        "doctor_id": doctor_id,
        "patient_id": "u1",
        "starts_at_ms": 1_700_000_000_000u64,
        "status": "pending",
    }))
}

async fn cancel_appointment(Path(id): Path<String>) -> impl IntoResponse {
    envelope(serde_json::json!({
        "id": id,
        "doctor_id": "d1",
        "patient_id": "u1",
        "starts_at_ms": 1_700_000_000_000u64,
        "status": "cancelled",
    }))
}

async fn ok_empty() -> impl IntoResponse {
    envelope(serde_json::Value::Null)
}

async fn notifications(State(state): State<Arc<MockState>>) -> impl IntoResponse {
    state.notifications_hits.fetch_add(1, Ordering::SeqCst);
    envelope(serde_json::json!([
        { "id": "n1", "message": "Appointment confirmed", "read": false, "createdAt": 1_700_000_000_000u64 },
        { "id": "n2", "message": "New message from Dr. Ayesha", "read": true, "createdAt": 1_700_000_100_000u64 },
    ]))
}

async fn upload_report() -> impl IntoResponse {
    envelope(serde_json::json!({
        "id": "r1",
        "fileName": "scan.pdf",
        "url": "/files/r1/scan.pdf",
    }))
}

async fn update_profile(
    headers: HeaderMap,
    Json(body): Json<serde_json::Value>,
) -> impl IntoResponse {
    if !has_session(&headers) {
        return (StatusCode::UNAUTHORIZED, Json(failure("session invalid"))).into_response();
    }
    let name = body.get("name").and_then(|v| v.as_str()).unwrap_or("A");
    envelope(serde_json::json!({
        "id": "u1",
        "name": name,
        "email": "a@x.com",
        "role": "PATIENT",
    }))
    .into_response()
}

/// Paginated history in the backend's snake_case shape. Requires the
/// ambient session cookie, like every authenticated endpoint.
async fn history(
    State(state): State<Arc<MockState>>,
    Path((kind, id)): Path<(String, String)>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> impl IntoResponse {
    if !has_session(&headers) {
        return (StatusCode::UNAUTHORIZED, Json(failure("session invalid"))).into_response();
    }
    state.history_hits.fetch_add(1, Ordering::SeqCst);

    let page: usize = query.get("page").and_then(|p| p.parse().ok()).unwrap_or(1);
    let limit: usize = query.get("limit").and_then(|l| l.parse().ok()).unwrap_or(20);
    let start = page.saturating_sub(1) * limit;
    let end = (start + limit).min(SURFACE_TOTAL);

    let messages: Vec<serde_json::Value> = (start..end)
        .map(|i| {
            serde_json::json!({
                "id": format!("m{}", i + 1),
                "room": format!("{kind}_{id}"),
                "sender_id": format!("u{}", i % 5),
                "sender_name": format!("User {}", i % 5),
                "body": format!("message {}", i + 1),
                "sent_at": 1_700_000_000_000u64 + i as u64,
            })
        })
        .collect();

    envelope(serde_json::json!({
        "messages": messages,
        "page": page,
        "limit": limit,
        "total": SURFACE_TOTAL,
    }))
    .into_response()
}

async fn ws_upgrade(
    State(state): State<Arc<MockState>>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_ws(state, socket))
}

async fn handle_ws(state: Arc<MockState>, socket: WebSocket) {
    state.ws_connections.fetch_add(1, Ordering::SeqCst);
    let (mut tx, mut rx) = socket.split();
    let mut inbound_rx = state.inbound_tx.subscribe();

    loop {
        tokio::select! {
            frame = inbound_rx.recv() => {
                let frame = match frame {
                    Ok(f) => f,
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => break,
                };
                if tx.send(Message::Text(frame.into())).await.is_err() {
                    break;
                }
            }
            msg = rx.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        if let Ok(value) = serde_json::from_str(&text) {
                            state.received.lock().push(value);
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(_)) => break,
                }
            }
        }
    }
}
