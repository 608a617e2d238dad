// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test infrastructure: store builders and wait helpers.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::auth::{AuthStore, Role, Session, AUTH_KEY};
use crate::config::Config;
use crate::event::{EventBus, SessionBus};
use crate::http::ApiClient;
use crate::socket::SocketManager;
use crate::storage::{Scope, Storage};

/// A fully wired store instance for tests. Several handles sharing one
/// storage dir and session bus model sibling windows of one session scope.
pub struct StoreHandle {
    pub store: Arc<AuthStore>,
    pub events: EventBus,
    pub bus: SessionBus,
    pub storage: Arc<Storage>,
    pub socket: Arc<SocketManager>,
    pub api: Arc<ApiClient>,
}

/// Open a store instance rooted at `dir`, joined to `bus`.
pub fn open_store(config: &Config, dir: &Path, bus: SessionBus) -> anyhow::Result<StoreHandle> {
    let events = EventBus::new();
    let api = Arc::new(ApiClient::new(config, events.clone(), bus.clone())?);
    let storage = Arc::new(Storage::open(dir));
    let socket = Arc::new(SocketManager::new(config.ws_endpoint()));
    let store = AuthStore::open(
        Arc::clone(&api),
        Arc::clone(&storage),
        Arc::clone(&socket),
        events.clone(),
        bus.clone(),
    );
    Ok(StoreHandle { store, events, bus, storage, socket, api })
}

/// Sample patient identity.
pub fn sample_session() -> Session {
    Session {
        id: "u1".to_owned(),
        name: "A".to_owned(),
        email: "a@x.com".to_owned(),
        avatar: None,
        role: Role::Patient,
    }
}

/// Write a session record directly into durable storage, the shape a prior
/// login would have left behind.
pub fn seed_session(storage: &Storage, session: &Session) {
    let record = serde_json::json!({ "user": session });
    storage.set(AUTH_KEY, &record.to_string(), Scope::Durable);
}

/// Poll `cond` until it holds or `deadline` passes; returns the final state.
pub async fn wait_until(deadline: Duration, cond: impl Fn() -> bool) -> bool {
    let start = std::time::Instant::now();
    while start.elapsed() < deadline {
        if cond() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    cond()
}
