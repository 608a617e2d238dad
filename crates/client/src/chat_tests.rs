// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::{dm_room, ChatMessage, HistoryPage, Surface, WireMessage};

#[yare::parameterized(
    first_of_three = { 1, 50, 120, true },
    second_of_three = { 2, 50, 120, true },
    last_partial = { 3, 50, 120, false },
    exact_boundary = { 2, 60, 120, false },
    empty_surface = { 1, 50, 0, false },
)]
fn has_more(page: u32, limit: u32, total: u64, expected: bool) {
    let page = HistoryPage { messages: vec![], page, limit, total };
    assert_eq!(page.has_more(), expected);
}

#[test]
fn surface_paths_and_keys() {
    let dm = Surface::Direct { peer_id: "u2".into() };
    assert_eq!(dm.kind(), "dm");
    assert_eq!(dm.identifier(), "u2");
    assert_eq!(dm.cache_key(2, 50), "chat_history_dm_u2_p2_l50");

    let city = Surface::City { city: "lahore".into() };
    assert_eq!(city.cache_key(1, 20), "chat_history_city_lahore_p1_l20");

    let room = Surface::Community { room_id: "cardio".into() };
    assert_eq!(room.kind(), "room");
}

#[test]
fn dm_room_is_order_independent() {
    assert_eq!(dm_room("u1", "u9"), "dm_u1_u9");
    assert_eq!(dm_room("u9", "u1"), "dm_u1_u9");
}

#[test]
fn wire_message_camel_case_shape() {
    let raw = r#"{
        "id": "m1",
        "roomId": "city_lahore",
        "senderId": "u1",
        "senderName": "Dr. Ayesha",
        "message": "hello"
    }"#;
    let wire: WireMessage = serde_json::from_str(raw).unwrap();
    let msg = wire.into_message();
    assert_eq!(msg.id, "m1");
    assert_eq!(msg.room, "city_lahore");
    assert_eq!(msg.sender_id, "u1");
    assert_eq!(msg.sender_name, "Dr. Ayesha");
    assert_eq!(msg.body, "hello");
}

#[test]
fn wire_message_drifted_shape_normalizes_identically() {
    // Same logical message from the other code path: `from`/`to`/`text`.
    let raw = r#"{
        "_id": "m1",
        "from": "u1",
        "to": "u2",
        "text": "hello",
        "timestamp": 1700000000000
    }"#;
    let wire: WireMessage = serde_json::from_str(raw).unwrap();
    let msg = wire.into_message();
    assert_eq!(msg.id, "m1");
    assert_eq!(msg.sender_id, "u1");
    assert_eq!(msg.recipient_id.as_deref(), Some("u2"));
    assert_eq!(msg.body, "hello");
    assert_eq!(msg.sent_at_ms, 1_700_000_000_000);
    // Name falls back to the sender id rather than leaking an empty field.
    assert_eq!(msg.sender_name, "u1");
}

#[test]
fn wire_message_without_id_gets_one() {
    let raw = r#"{"senderId": "u1", "content": "hi"}"#;
    let wire: WireMessage = serde_json::from_str(raw).unwrap();
    let msg = wire.into_message();
    assert!(!msg.id.is_empty());
    assert_eq!(msg.body, "hi");
}

#[test]
fn canonical_message_round_trips() {
    let msg = ChatMessage {
        id: "m7".into(),
        room: "room_cardio".into(),
        sender_id: "u3".into(),
        sender_name: "B".into(),
        recipient_id: None,
        body: "report attached".into(),
        sent_at_ms: 42,
    };
    let json = serde_json::to_string(&msg).unwrap();
    let back: ChatMessage = serde_json::from_str(&json).unwrap();
    assert_eq!(back, msg);
}
