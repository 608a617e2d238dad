// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Auth store: session identity state machine.
//!
//! Owns the current [`Session`] exclusively. Transitions are login, logout,
//! and session expiry; expiry additionally broadcasts a logout signal so
//! every other store instance of this session scope converges. Rehydration
//! from the durable record is synchronous at [`AuthStore::open`] — no
//! network round-trip.
//!
//! No credential material ever enters this module's state: the login
//! response is deserialized into identity fields only, and the durable
//! record is `{"user": Session | null}`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::ApiError;
use crate::event::{ClientEvent, EventBus, SessionBus, SessionSignal};
use crate::http::ApiClient;
use crate::socket::SocketManager;
use crate::storage::{epoch_ms, Scope, Storage};
use crate::sync;

/// Fixed durable key for the persisted session record.
pub const AUTH_KEY: &str = "medilink_auth";

/// Closed role set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    Patient,
    Doctor,
    Admin,
}

/// The authenticated identity in this client scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub name: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    pub role: Role,
}

/// Auth store states. Expiry is transient: after cleanup the store is
/// `Unauthenticated`, with the moment recorded via [`AuthStore::last_expiry`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthState {
    Unauthenticated,
    Authenticating,
    Authenticated(Session),
}

/// Durable record shape. Identity only, never token material.
#[derive(Debug, Default, Serialize, Deserialize)]
struct PersistedAuth {
    user: Option<Session>,
}

/// Login/profile response boundary: identity fields only. Any token or
/// credential field the backend includes is dropped here by construction.
#[derive(Debug, Deserialize)]
struct Identity {
    #[serde(alias = "_id")]
    id: String,
    name: String,
    email: String,
    #[serde(default, alias = "profileImage")]
    avatar: Option<String>,
    role: Role,
}

impl Identity {
    fn into_session(self) -> Session {
        Session {
            id: self.id,
            name: self.name,
            email: self.email,
            avatar: self.avatar,
            role: self.role,
        }
    }
}

/// Process-wide session store. One instance per running frontend; tests
/// construct several sharing one storage dir and bus to exercise
/// cross-instance convergence.
pub struct AuthStore {
    origin: Uuid,
    api: Arc<ApiClient>,
    storage: Arc<Storage>,
    socket: Arc<SocketManager>,
    events: EventBus,
    bus: SessionBus,
    state: RwLock<AuthState>,
    /// Serializes login/logout/expiry so rapid repeated calls queue in
    /// order instead of racing.
    gate: tokio::sync::Mutex<()>,
    last_expiry_ms: parking_lot::Mutex<Option<u64>>,
    ready: AtomicBool,
}

impl AuthStore {
    /// Open the store, synchronously rehydrating the session from the
    /// durable record if present.
    pub fn open(
        api: Arc<ApiClient>,
        storage: Arc<Storage>,
        socket: Arc<SocketManager>,
        events: EventBus,
        bus: SessionBus,
    ) -> Arc<Self> {
        let state = match load_persisted(&storage) {
            Some(session) => {
                debug!(user = %session.id, "session rehydrated");
                AuthState::Authenticated(session)
            }
            None => AuthState::Unauthenticated,
        };
        Arc::new(Self {
            origin: Uuid::new_v4(),
            api,
            storage,
            socket,
            events,
            bus,
            state: RwLock::new(state),
            gate: tokio::sync::Mutex::new(()),
            last_expiry_ms: parking_lot::Mutex::new(None),
            ready: AtomicBool::new(true),
        })
    }

    /// True once rehydration has completed. Consumers gate rendering on
    /// this, never assuming the session is populated earlier.
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    pub fn current(&self) -> Option<Session> {
        match &*self.state.read() {
            AuthState::Authenticated(session) => Some(session.clone()),
            _ => None,
        }
    }

    pub fn state(&self) -> AuthState {
        self.state.read().clone()
    }

    /// Epoch ms of the most recent session expiry in this instance, if any.
    pub fn last_expiry(&self) -> Option<u64> {
        *self.last_expiry_ms.lock()
    }

    /// Instance id used to stamp outgoing session signals.
    pub fn origin(&self) -> Uuid {
        self.origin
    }

    /// Authenticate against the backend. On success the session is held in
    /// memory and persisted durably; on failure the state returns to
    /// `Unauthenticated` and the error distinguishes a backend rejection
    /// (`Credential`, message verbatim) from a transport failure (`Network`).
    pub async fn login(&self, email: &str, password: &str) -> Result<Session, ApiError> {
        let _gate = self.gate.lock().await;
        *self.state.write() = AuthState::Authenticating;

        let body = serde_json::json!({ "email": email, "password": password });
        match self.api.post_auth::<Identity, _>("/api/auth/login", &body).await {
            Ok(identity) => {
                let session = identity.into_session();
                *self.state.write() = AuthState::Authenticated(session.clone());
                self.persist(Some(&session));
                info!(user = %session.id, role = ?session.role, "logged in");
                Ok(session)
            }
            Err(e) => {
                *self.state.write() = AuthState::Unauthenticated;
                debug!(category = e.category(), "login failed");
                Err(e)
            }
        }
    }

    /// End the session. Idempotent: a logout with no active session is a
    /// no-op. The backend call is best-effort; local cleanup always runs.
    pub async fn logout(&self) {
        let _gate = self.gate.lock().await;
        if !matches!(*self.state.read(), AuthState::Authenticated(_)) {
            return;
        }
        if let Err(e) = self
            .api
            .post::<Option<serde_json::Value>, _>("/api/auth/logout", &serde_json::json!({}))
            .await
        {
            debug!("logout endpoint failed: {e}");
        }
        self.clear_local().await;
        info!("logged out");
    }

    /// Remote session invalidation: same cleanup as logout, plus the expiry
    /// timestamp is recorded and a logout signal reaches every other
    /// instance (session bus, with the storage signal file as fallback).
    pub async fn handle_session_expiry(&self, reason: &str) {
        let _gate = self.gate.lock().await;
        let had_session = self.clear_local().await;
        *self.last_expiry_ms.lock() = Some(epoch_ms());
        if had_session {
            warn!(reason, "session expired");
            self.bus.send(SessionSignal::Logout {
                reason: reason.to_owned(),
                origin: Some(self.origin),
                at_ms: epoch_ms(),
            });
            sync::write_logout_signal(&self.storage, reason, self.origin);
        }
    }

    /// Update mutable profile fields. A response landing after logout is
    /// tolerated by skipping the local mutation.
    pub async fn update_profile(
        &self,
        name: Option<&str>,
        avatar: Option<&str>,
    ) -> Result<Session, ApiError> {
        let body = serde_json::json!({ "name": name, "avatar": avatar });
        let identity: Identity = self.api.put("/api/users/me", &body).await?;
        let session = identity.into_session();
        {
            let mut state = self.state.write();
            if !matches!(*state, AuthState::Authenticated(_)) {
                debug!("profile response after logout, ignoring");
                return Ok(session);
            }
            *state = AuthState::Authenticated(session.clone());
        }
        self.persist(Some(&session));
        Ok(session)
    }

    /// Converge after a logout that originated elsewhere. No re-broadcast.
    pub(crate) async fn converge_remote(&self, reason: &str) {
        let _gate = self.gate.lock().await;
        if !matches!(*self.state.read(), AuthState::Authenticated(_)) {
            return;
        }
        info!(reason, "remote logout observed, clearing session");
        self.clear_local().await;
        *self.last_expiry_ms.lock() = Some(epoch_ms());
        self.events.emit(ClientEvent::NavigateLogin);
    }

    /// Fallback-path check: the durable record is authoritative, and another
    /// process may have cleared it at any time.
    pub(crate) async fn converge_if_cleared(&self) {
        if !matches!(*self.state.read(), AuthState::Authenticated(_)) {
            return;
        }
        if load_persisted(&self.storage).is_none() {
            self.converge_remote("signed out in another window").await;
        }
    }

    pub(crate) fn storage(&self) -> &Arc<Storage> {
        &self.storage
    }

    /// Clear in-memory session, close the real-time connection, and remove
    /// the durable record. Returns whether a session was present.
    async fn clear_local(&self) -> bool {
        let had_session = {
            let mut state = self.state.write();
            let had = matches!(*state, AuthState::Authenticated(_));
            *state = AuthState::Unauthenticated;
            had
        };
        self.socket.disconnect().await;
        self.storage.remove(AUTH_KEY, Scope::Durable);
        had_session
    }

    fn persist(&self, user: Option<&Session>) {
        let record = PersistedAuth { user: user.cloned() };
        match serde_json::to_string(&record) {
            Ok(json) => self.storage.set(AUTH_KEY, &json, Scope::Durable),
            Err(e) => warn!("session persist failed: {e}"),
        }
    }
}

/// Spawn the session-signal intake task for `store`. Signals stamped with
/// the store's own origin are echoes and ignored; foreign signals converge
/// the instance; unstamped signals (HTTP interceptor) run the full expiry
/// path so the logout also reaches other instances.
pub fn spawn_signal_task(store: Arc<AuthStore>, shutdown: CancellationToken) {
    tokio::spawn(async move {
        let mut rx = store.bus.subscribe();
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                signal = rx.recv() => {
                    match signal {
                        Ok(SessionSignal::Logout { reason, origin, .. }) => {
                            if origin == Some(store.origin) {
                                continue;
                            }
                            match origin {
                                Some(_) => store.converge_remote(&reason).await,
                                None => store.handle_session_expiry(&reason).await,
                            }
                        }
                        Err(broadcast::error::RecvError::Lagged(n)) => {
                            warn!("session signal listener lagged {n} events");
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    }
                }
            }
        }
    });
}

/// Read the durable session record, defending against it having been
/// cleared or corrupted externally.
fn load_persisted(storage: &Storage) -> Option<Session> {
    let raw = storage.get(AUTH_KEY, Scope::Durable)?;
    match serde_json::from_str::<PersistedAuth>(&raw) {
        Ok(record) => record.user,
        Err(e) => {
            warn!("session record unparseable, treating as signed out: {e}");
            None
        }
    }
}

#[cfg(test)]
#[path = "auth_tests.rs"]
mod tests;
