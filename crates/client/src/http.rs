// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Single outbound HTTP gateway.
//!
//! Every REST call goes through [`ApiClient`]. The session credential is
//! carried by the cookie jar only — no stored token is ever read or attached
//! as a header. Responses are unwrapped from the backend's
//! `{success, data?, message?}` envelope, and error statuses are intercepted:
//! a 401 on an authenticated call triggers the global recovery sequence at
//! most once per burst.

use std::time::Duration;

use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::ApiError;
use crate::event::{ClientEvent, EventBus, SessionBus, SessionSignal};
use crate::storage::epoch_ms;

/// Burst deduplication for session-expiry recovery.
///
/// State machine: Idle --(401 observed)--> Handling --(cooldown elapses)-->
/// Idle. While Handling, further triggers are observed but produce no side
/// effects. The reset is by clock comparison on the next trigger attempt.
pub struct RecoveryGuard {
    cooldown: Duration,
    last: Mutex<Option<tokio::time::Instant>>,
}

impl RecoveryGuard {
    pub fn new(cooldown: Duration) -> Self {
        Self { cooldown, last: Mutex::new(None) }
    }

    /// Attempt to enter Handling. Returns true for the first trigger of a
    /// burst, false while the cooldown window is still open.
    pub fn try_begin(&self) -> bool {
        let now = tokio::time::Instant::now();
        let mut last = self.last.lock();
        match *last {
            Some(at) if now.duration_since(at) < self.cooldown => false,
            _ => {
                *last = Some(now);
                true
            }
        }
    }
}

/// Backend response envelope. Every endpoint wraps its payload in this.
#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    data: Option<serde_json::Value>,
    #[serde(default)]
    message: Option<String>,
}

/// HTTP gateway for the medilink backend.
pub struct ApiClient {
    base_url: String,
    http: reqwest::Client,
    events: EventBus,
    session_bus: SessionBus,
    guard: RecoveryGuard,
}

impl ApiClient {
    pub fn new(config: &Config, events: EventBus, session_bus: SessionBus) -> anyhow::Result<Self> {
        // reqwest is built with `rustls-no-provider`, so a crypto provider
        // must be installed before any Client is constructed. Idempotent:
        // subsequent calls return Err once a provider is set, which we ignore.
        let _ = rustls::crypto::ring::default_provider().install_default();

        let http = reqwest::Client::builder()
            .cookie_store(true)
            .timeout(config.http_timeout())
            .build()?;
        Ok(Self {
            base_url: config.api_url.trim_end_matches('/').to_owned(),
            http,
            events,
            session_bus,
            guard: RecoveryGuard::new(config.recovery_cooldown()),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.execute(self.http.get(self.url(path)), false).await
    }

    pub async fn get_with_query<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, ApiError> {
        self.execute(self.http.get(self.url(path)).query(query), false).await
    }

    pub async fn post<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        self.execute(self.http.post(self.url(path)).json(body), false).await
    }

    /// POST for credential submission. A 401 here is a login rejection, not
    /// an expired session, so the recovery interceptor is bypassed.
    pub async fn post_auth<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        self.execute(self.http.post(self.url(path)).json(body), true).await
    }

    pub async fn put<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        self.execute(self.http.put(self.url(path)).json(body), false).await
    }

    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.execute(self.http.delete(self.url(path)), false).await
    }

    pub async fn post_multipart<T: DeserializeOwned>(
        &self,
        path: &str,
        form: reqwest::multipart::Form,
    ) -> Result<T, ApiError> {
        self.execute(self.http.post(self.url(path)).multipart(form), false).await
    }

    async fn execute<T: DeserializeOwned>(
        &self,
        req: reqwest::RequestBuilder,
        auth_attempt: bool,
    ) -> Result<T, ApiError> {
        let resp = req.send().await.map_err(|e| ApiError::Network(e.to_string()))?;
        let status = resp.status().as_u16();
        let body = resp.text().await.unwrap_or_default();

        if !(200..300).contains(&status) {
            let err = classify_failure(status, extract_message(&body, status), auth_attempt);
            match &err {
                ApiError::SessionExpired => self.trigger_recovery("unauthorized response"),
                ApiError::Forbidden(message) | ApiError::Server(message) => {
                    self.events.emit(ClientEvent::Notice { message: message.clone() });
                }
                _ => {}
            }
            return Err(err);
        }

        unwrap_envelope(&body, status, auth_attempt)
    }

    /// Run the recovery sequence for a 401 burst: one user notice, one
    /// redirect intent, one session-bus signal for store cleanup.
    fn trigger_recovery(&self, reason: &str) {
        if !self.guard.try_begin() {
            debug!(reason, "recovery already handling this burst");
            return;
        }
        warn!(reason, "session expired, triggering recovery");
        self.events.emit(ClientEvent::SessionExpired { reason: reason.to_owned() });
        self.events.emit(ClientEvent::NavigateLogin);
        self.session_bus.send(SessionSignal::Logout {
            reason: reason.to_owned(),
            origin: None,
            at_ms: epoch_ms(),
        });
    }
}

/// Map an error status to its [`ApiError`] category. Side effects (recovery,
/// notices) are the caller's job.
fn classify_failure(status: u16, message: String, auth_attempt: bool) -> ApiError {
    match status {
        401 if auth_attempt => ApiError::Credential(message),
        401 => ApiError::SessionExpired,
        403 => ApiError::Forbidden(message),
        500..=599 => ApiError::Server(message),
        _ => ApiError::Rejected { status, message },
    }
}

/// Unwrap a 2xx envelope body into the payload type.
fn unwrap_envelope<T: DeserializeOwned>(
    body: &str,
    status: u16,
    auth_attempt: bool,
) -> Result<T, ApiError> {
    let envelope: Envelope = serde_json::from_str(body)
        .map_err(|e| ApiError::Network(format!("invalid response body: {e}")))?;
    if !envelope.success {
        let message = envelope.message.unwrap_or_else(|| "request failed".to_owned());
        return Err(if auth_attempt {
            ApiError::Credential(message)
        } else {
            ApiError::Rejected { status, message }
        });
    }
    let data = envelope.data.unwrap_or(serde_json::Value::Null);
    serde_json::from_value(data).map_err(|e| ApiError::Network(format!("invalid response data: {e}")))
}

/// Best-effort human message from an error body: the envelope `message` when
/// parseable, else a status fallback.
fn extract_message(body: &str, status: u16) -> String {
    serde_json::from_str::<Envelope>(body)
        .ok()
        .and_then(|e| e.message)
        .unwrap_or_else(|| format!("HTTP {status}"))
}

#[cfg(test)]
#[path = "http_tests.rs"]
mod tests;
