// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::{sanitize_key, Scope, Storage};

fn tmp_storage() -> (tempfile::TempDir, Storage) {
    let dir = tempfile::tempdir().unwrap();
    let storage = Storage::open(dir.path());
    (dir, storage)
}

#[test]
fn durable_round_trip() {
    let (_dir, storage) = tmp_storage();
    storage.set("profile", r#"{"name":"A"}"#, Scope::Durable);
    assert_eq!(storage.get("profile", Scope::Durable).as_deref(), Some(r#"{"name":"A"}"#));

    storage.remove("profile", Scope::Durable);
    assert_eq!(storage.get("profile", Scope::Durable), None);
}

#[test]
fn session_round_trip() {
    let (_dir, storage) = tmp_storage();
    storage.set("draft", "hello", Scope::Session);
    assert_eq!(storage.get("draft", Scope::Session).as_deref(), Some("hello"));

    // Scopes do not bleed into each other.
    assert_eq!(storage.get("draft", Scope::Durable), None);

    storage.clear(Scope::Session);
    assert_eq!(storage.get("draft", Scope::Session), None);
}

#[test]
fn durable_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    {
        let storage = Storage::open(dir.path());
        storage.set("k", "v", Scope::Durable);
    }
    let storage = Storage::open(dir.path());
    assert_eq!(storage.get("k", Scope::Durable).as_deref(), Some("v"));
}

#[test]
fn keys_lists_durable_entries() {
    let (_dir, storage) = tmp_storage();
    storage.set("a_one", "1", Scope::Durable);
    storage.set("a_two", "2", Scope::Durable);
    storage.set("b_one", "3", Scope::Durable);

    let mut keys = storage.keys(Scope::Durable);
    keys.sort();
    assert_eq!(keys, vec!["a_one", "a_two", "b_one"]);

    storage.clear(Scope::Durable);
    assert!(storage.keys(Scope::Durable).is_empty());
}

#[test]
fn missing_key_is_a_miss() {
    let (_dir, storage) = tmp_storage();
    assert_eq!(storage.get("nope", Scope::Durable), None);
    assert_eq!(storage.get("nope", Scope::Session), None);
    // Removing something absent is a no-op, not an error.
    storage.remove("nope", Scope::Durable);
}

#[test]
fn unwritable_dir_degrades_to_noop() {
    // A path under a file (not a dir) cannot be created; every durable
    // operation must silently degrade.
    let file = tempfile::NamedTempFile::new().unwrap();
    let storage = Storage::open(file.path().join("sub"));
    storage.set("k", "v", Scope::Durable);
    assert_eq!(storage.get("k", Scope::Durable), None);
    storage.clear(Scope::Durable);
}

#[test]
fn sanitize_key_maps_unsafe_chars() {
    assert_eq!(sanitize_key("chat_history_dm_u2_p1_l50"), "chat_history_dm_u2_p1_l50");
    assert_eq!(sanitize_key("weird/../key"), "weird____key");
}
