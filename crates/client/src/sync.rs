// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fallback delivery path for cross-instance logout.
//!
//! The session bus covers instances in one process. Instances in sibling
//! processes share only the durable storage dir, so the expiring store
//! writes a signal record there and immediately clears it; a `notify`
//! watcher (with a polling fallback) wakes on any change and re-reads the
//! auth record. The record itself is authoritative — the watcher never
//! depends on catching the signal file's content before removal.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::auth::AuthStore;
use crate::storage::{epoch_ms, Scope, Storage};

/// Ephemeral durable key: written then immediately removed.
pub const LOGOUT_SIGNAL_KEY: &str = "medilink_logout_signal";

/// Fallback polling interval when filesystem events are unavailable.
const POLL_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Debug, Serialize, Deserialize)]
struct LogoutSignal {
    reason: String,
    origin: String,
    at_ms: u64,
}

/// Emit the write-then-clear fallback signal. Observers react to the change
/// itself, not the content, so the immediate removal is safe.
pub(crate) fn write_logout_signal(storage: &Storage, reason: &str, origin: Uuid) {
    let signal =
        LogoutSignal { reason: reason.to_owned(), origin: origin.to_string(), at_ms: epoch_ms() };
    if let Ok(json) = serde_json::to_string(&signal) {
        storage.set(LOGOUT_SIGNAL_KEY, &json, Scope::Durable);
    }
    storage.remove(LOGOUT_SIGNAL_KEY, Scope::Durable);
}

/// Watch the storage dir and converge the store whenever the durable auth
/// record turns out to have been cleared externally.
pub fn spawn_logout_watcher(store: Arc<AuthStore>, shutdown: CancellationToken) {
    tokio::spawn(async move {
        let (wake_tx, mut wake_rx) = mpsc::channel::<()>(1);
        let _watcher = setup_notify_watcher(store.storage().dir(), wake_tx);

        let mut poll = tokio::time::interval(POLL_INTERVAL);
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = wake_rx.recv() => {}
                _ = poll.tick() => {}
            }
            store.converge_if_cleared().await;
        }
    });
}

/// Filesystem watcher on the storage dir. Returns the handle (must be kept
/// alive); `None` leaves the polling fallback as the only wake source.
fn setup_notify_watcher(dir: &Path, wake_tx: mpsc::Sender<()>) -> Option<notify::RecommendedWatcher> {
    use notify::{RecursiveMode, Watcher};

    let mut watcher = notify::recommended_watcher(move |_: notify::Result<notify::Event>| {
        let _ = wake_tx.try_send(());
    })
    .ok()?;
    watcher.watch(dir, RecursiveMode::NonRecursive).ok()?;
    Some(watcher)
}

#[cfg(test)]
#[path = "sync_tests.rs"]
mod tests;
