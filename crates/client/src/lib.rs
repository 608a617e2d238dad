// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Medilink client SDK: session and real-time connection lifecycle for the
//! healthcare-appointment platform. Frontends call into [`Client`] and
//! render from the events it emits; REST and WebSocket backends are
//! consumed as black-box contracts.

pub mod api;
pub mod auth;
pub mod cache;
pub mod chat;
pub mod config;
pub mod error;
pub mod event;
pub mod http;
pub mod socket;
pub mod storage;
pub mod sync;
pub mod test_support;

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::api::{Appointments, DoctorDirectory, Notifications, Reports};
use crate::auth::AuthStore;
use crate::cache::Cache;
use crate::chat::ChatHistory;
use crate::config::Config;
use crate::event::{EventBus, SessionBus};
use crate::http::ApiClient;
use crate::socket::SocketManager;
use crate::storage::Storage;

/// Composition root: one instance per running application, wired at start
/// and torn down explicitly. Must be built inside a tokio runtime (it
/// spawns the signal intake and storage watcher tasks).
pub struct Client {
    pub config: Config,
    pub events: EventBus,
    pub storage: Arc<Storage>,
    pub cache: Arc<Cache>,
    pub api: Arc<ApiClient>,
    pub auth: Arc<AuthStore>,
    pub socket: Arc<SocketManager>,
    pub chat: ChatHistory,
    pub doctors: DoctorDirectory,
    pub appointments: Appointments,
    pub notifications: Notifications,
    pub reports: Reports,
    shutdown: CancellationToken,
}

impl Client {
    pub fn build(config: Config) -> anyhow::Result<Self> {
        config.validate().map_err(|e| anyhow::anyhow!(e))?;

        let events = EventBus::new();
        let bus = SessionBus::new();
        let api = Arc::new(ApiClient::new(&config, events.clone(), bus.clone())?);
        let storage = Arc::new(Storage::open(config.state_dir()));
        let cache = Arc::new(Cache::new(Arc::clone(&storage)));
        let socket = Arc::new(SocketManager::new(config.ws_endpoint()));
        let auth = AuthStore::open(
            Arc::clone(&api),
            Arc::clone(&storage),
            Arc::clone(&socket),
            events.clone(),
            bus,
        );

        let shutdown = CancellationToken::new();
        crate::auth::spawn_signal_task(Arc::clone(&auth), shutdown.clone());
        sync::spawn_logout_watcher(Arc::clone(&auth), shutdown.clone());

        Ok(Self {
            chat: ChatHistory::new(Arc::clone(&api), Arc::clone(&cache)),
            doctors: DoctorDirectory::new(Arc::clone(&api), Arc::clone(&cache)),
            appointments: Appointments::new(Arc::clone(&api), Arc::clone(&cache)),
            notifications: Notifications::new(Arc::clone(&api), Arc::clone(&cache)),
            reports: Reports::new(Arc::clone(&api)),
            config,
            events,
            storage,
            cache,
            api,
            auth,
            socket,
            shutdown,
        })
    }

    /// Stop background tasks and close the real-time connection. Safe to
    /// call more than once.
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        self.socket.disconnect().await;
    }
}
