// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! TTL cache over [`Storage`].
//!
//! Entries are JSON envelopes `{created_at_ms, ttl_ms?, value}`. Expiry is
//! lazy: the read that finds a stale entry deletes it and reports a miss.
//! Like the storage layer underneath, cache failures degrade to misses and
//! never surface as errors.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::ApiError;
use crate::storage::{epoch_ms, Scope, Storage};

/// Per-entry cache directives.
#[derive(Debug, Clone, Copy, Default)]
pub struct CacheOptions {
    /// Maximum entry age; `None` means the entry never expires.
    pub ttl: Option<Duration>,
    pub scope: Scope,
}

impl CacheOptions {
    pub fn ttl(ttl: Duration) -> Self {
        Self { ttl: Some(ttl), scope: Scope::Durable }
    }

    pub fn session_ttl(ttl: Duration) -> Self {
        Self { ttl: Some(ttl), scope: Scope::Session }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Entry {
    created_at_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    ttl_ms: Option<u64>,
    value: serde_json::Value,
}

impl Entry {
    fn expired_at(&self, now_ms: u64) -> bool {
        match self.ttl_ms {
            Some(ttl) => now_ms.saturating_sub(self.created_at_ms) > ttl,
            None => false,
        }
    }
}

/// TTL-bounded snapshot cache for previously fetched server responses.
pub struct Cache {
    storage: Arc<Storage>,
}

impl Cache {
    pub fn new(storage: Arc<Storage>) -> Self {
        Self { storage }
    }

    /// Store `value` under `key`. Serialization or storage failure makes the
    /// whole operation a logged no-op.
    pub fn set<T: Serialize>(&self, key: &str, value: &T, opts: CacheOptions) {
        self.set_at(key, value, opts, epoch_ms());
    }

    /// Clock-explicit write; `set` passes wall-clock time.
    pub(crate) fn set_at<T: Serialize>(&self, key: &str, value: &T, opts: CacheOptions, now_ms: u64) {
        let value = match serde_json::to_value(value) {
            Ok(v) => v,
            Err(e) => {
                warn!(key, "cache serialize failed: {e}");
                return;
            }
        };
        let entry = Entry {
            created_at_ms: now_ms,
            ttl_ms: opts.ttl.map(|t| t.as_millis() as u64),
            value,
        };
        match serde_json::to_string(&entry) {
            Ok(json) => self.storage.set(key, &json, opts.scope),
            Err(e) => warn!(key, "cache serialize failed: {e}"),
        }
    }

    /// Fresh value for `key`, or `None` on a miss. A stale or unparseable
    /// entry is deleted as a side effect of the read.
    pub fn get<T: DeserializeOwned>(&self, key: &str, scope: Scope) -> Option<T> {
        self.get_at(key, scope, epoch_ms())
    }

    /// Clock-explicit read; `get` passes wall-clock time.
    pub(crate) fn get_at<T: DeserializeOwned>(&self, key: &str, scope: Scope, now_ms: u64) -> Option<T> {
        let raw = self.storage.get(key, scope)?;
        let entry: Entry = match serde_json::from_str(&raw) {
            Ok(e) => e,
            Err(e) => {
                warn!(key, "cache entry unparseable, dropping: {e}");
                self.storage.remove(key, scope);
                return None;
            }
        };
        if entry.expired_at(now_ms) {
            debug!(key, "cache entry expired");
            self.storage.remove(key, scope);
            return None;
        }
        match serde_json::from_value(entry.value) {
            Ok(v) => Some(v),
            Err(e) => {
                warn!(key, "cache payload unparseable, dropping: {e}");
                self.storage.remove(key, scope);
                None
            }
        }
    }

    pub fn remove(&self, key: &str, scope: Scope) {
        self.storage.remove(key, scope);
    }

    pub fn clear(&self, scope: Scope) {
        self.storage.clear(scope);
    }

    /// Drop every entry whose key starts with `prefix`, in both scopes.
    pub fn invalidate_prefix(&self, prefix: &str) {
        for scope in [Scope::Durable, Scope::Session] {
            for key in self.storage.keys(scope) {
                if key.starts_with(prefix) {
                    self.storage.remove(&key, scope);
                }
            }
        }
    }

    /// Return the cached value if present and fresh; otherwise run `fetch`
    /// exactly once, store its result under `opts`, and return it. Fetch
    /// errors propagate; store failures do not.
    pub async fn get_or_fetch<T, F, Fut>(
        &self,
        key: &str,
        opts: CacheOptions,
        fetch: F,
    ) -> Result<T, ApiError>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, ApiError>>,
    {
        if let Some(hit) = self.get::<T>(key, opts.scope) {
            return Ok(hit);
        }
        let value = fetch().await?;
        self.set(key, &value, opts);
        Ok(value)
    }
}

#[cfg(test)]
#[path = "cache_tests.rs"]
mod tests;
