// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Process-wide event buses.
//!
//! [`EventBus`] carries user-facing notices (session expiry, forbidden/server
//! failures, redirect intent) to whatever frontend is listening. The
//! [`SessionBus`] is the primary cross-instance delivery path for logout
//! convergence: every auth store of one session scope subscribes, and the
//! HTTP interceptor publishes unstamped signals when recovery fires.

use tokio::sync::broadcast;
use uuid::Uuid;

/// Events the UI layer renders from. Emitted at most once per trigger; the
/// session-expiry notice is additionally deduplicated per burst by the
/// interceptor's recovery guard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    /// The session was invalidated remotely. Shown once per burst.
    SessionExpired { reason: String },
    /// The frontend should route to its login entry point.
    NavigateLogin,
    /// A user-visible failure notice (forbidden or server error).
    Notice { message: String },
}

/// Broadcast hub for [`ClientEvent`]s.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<ClientEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(64);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ClientEvent> {
        self.tx.subscribe()
    }

    /// Emit an event. Dropped silently when no frontend is subscribed.
    pub fn emit(&self, event: ClientEvent) {
        let _ = self.tx.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Cross-instance session signal.
///
/// `origin` is the emitting store's instance id; stores ignore their own
/// signals. Unstamped signals (`origin: None`) come from the HTTP
/// interceptor, which has no store identity of its own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionSignal {
    Logout { reason: String, origin: Option<Uuid>, at_ms: u64 },
}

/// Broadcast hub for [`SessionSignal`]s, shared by all store instances of
/// one session scope.
#[derive(Debug, Clone)]
pub struct SessionBus {
    tx: broadcast::Sender<SessionSignal>,
}

impl SessionBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(16);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionSignal> {
        self.tx.subscribe()
    }

    pub fn send(&self, signal: SessionSignal) {
        let _ = self.tx.send(signal);
    }
}

impl Default for SessionBus {
    fn default() -> Self {
        Self::new()
    }
}
