// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Key/value storage backends for client state.
//!
//! Two scopes: `Durable` persists one JSON file per key under the state dir
//! and survives restarts; `Session` is an in-memory map that dies with the
//! process. Storage failures never propagate — writes degrade to no-ops and
//! reads to misses, with a `warn` log.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use tracing::warn;

/// Which backend a record lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Scope {
    /// Survives restarts; shared by all instances using the same state dir.
    #[default]
    Durable,
    /// Lives only as long as this process.
    Session,
}

/// Key/value store over the durable and session-scoped backends.
pub struct Storage {
    dir: PathBuf,
    session: Mutex<HashMap<String, String>>,
}

impl Storage {
    /// Open storage rooted at `dir`, creating it if needed. A dir that
    /// cannot be created is tolerated; durable operations become no-ops.
    pub fn open(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        if let Err(e) = std::fs::create_dir_all(&dir) {
            warn!(dir = %dir.display(), "state dir unavailable: {e}");
        }
        Self { dir, session: Mutex::new(HashMap::new()) }
    }

    /// Directory backing the durable scope.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn set(&self, key: &str, value: &str, scope: Scope) {
        match scope {
            Scope::Session => {
                self.session.lock().insert(key.to_owned(), value.to_owned());
            }
            Scope::Durable => {
                if let Err(e) = write_atomic(&self.key_path(key), value) {
                    warn!(key, "durable write failed: {e}");
                }
            }
        }
    }

    pub fn get(&self, key: &str, scope: Scope) -> Option<String> {
        match scope {
            Scope::Session => self.session.lock().get(key).cloned(),
            Scope::Durable => match std::fs::read_to_string(self.key_path(key)) {
                Ok(contents) => Some(contents),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
                Err(e) => {
                    warn!(key, "durable read failed: {e}");
                    None
                }
            },
        }
    }

    pub fn remove(&self, key: &str, scope: Scope) {
        match scope {
            Scope::Session => {
                self.session.lock().remove(key);
            }
            Scope::Durable => {
                if let Err(e) = std::fs::remove_file(self.key_path(key)) {
                    if e.kind() != std::io::ErrorKind::NotFound {
                        warn!(key, "durable remove failed: {e}");
                    }
                }
            }
        }
    }

    pub fn clear(&self, scope: Scope) {
        match scope {
            Scope::Session => self.session.lock().clear(),
            Scope::Durable => {
                for key in self.keys(Scope::Durable) {
                    self.remove(&key, Scope::Durable);
                }
            }
        }
    }

    /// All keys currently present in `scope`.
    pub fn keys(&self, scope: Scope) -> Vec<String> {
        match scope {
            Scope::Session => self.session.lock().keys().cloned().collect(),
            Scope::Durable => {
                let entries = match std::fs::read_dir(&self.dir) {
                    Ok(entries) => entries,
                    Err(_) => return vec![],
                };
                entries
                    .filter_map(|e| e.ok())
                    .filter_map(|e| {
                        let name = e.file_name().to_string_lossy().into_owned();
                        name.strip_suffix(".json").map(str::to_owned)
                    })
                    .collect()
            }
        }
    }

    fn key_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", sanitize_key(key)))
    }
}

/// Restrict keys to a filesystem-safe alphabet. Callers use flat namespaced
/// keys (`doctors_list`, `chat_history_dm_u2_p1_l50`), so collisions from
/// mapping odd characters to `_` are not a practical concern.
fn sanitize_key(key: &str) -> String {
    key.chars().map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '-' { c } else { '_' }).collect()
}

/// Atomic write (unique tmp + rename) so concurrent writers from sibling
/// processes never interleave partial content.
fn write_atomic(path: &Path, contents: &str) -> std::io::Result<()> {
    use std::sync::atomic::{AtomicU32, Ordering};
    static COUNTER: AtomicU32 = AtomicU32::new(0);

    let seq = COUNTER.fetch_add(1, Ordering::Relaxed);
    let tmp_name = format!(
        "{}.{}.{}.tmp",
        path.file_name().unwrap_or_default().to_string_lossy(),
        std::process::id(),
        seq,
    );
    let tmp_path = path.with_file_name(tmp_name);
    std::fs::write(&tmp_path, contents)?;
    std::fs::rename(&tmp_path, path)
}

/// Current epoch millis.
pub fn epoch_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[cfg(test)]
#[path = "storage_tests.rs"]
mod tests;
