// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use super::*;
use crate::op::{OpId, OperationDraft};
use chrono::Utc;
use serde_json::json;
use yare::parameterized;

fn test_op() -> PendingOperation {
    PendingOperation::from_draft(
        OpId::new("op-1"),
        OperationDraft::create("posts/p1", json!({"title": "hi"})),
        Utc::now(),
    )
}

#[test]
fn test_client_message_json_shape() {
    let json = ClientMessage::ping(7).to_json().unwrap();
    assert_eq!(json, r#"{"type":"ping","id":7}"#);

    let json = ClientMessage::write(3, test_op()).to_json().unwrap();
    assert!(json.contains("\"type\":\"write\""));
    assert!(json.contains("\"request_id\":3"));
    assert!(json.contains("\"target_path\":\"posts/p1\""));

    let json = ClientMessage::listen(Query::collection("posts"))
        .to_json()
        .unwrap();
    assert!(json.contains("\"type\":\"listen\""));
}

#[test]
fn test_client_write_parses_back() {
    let msg = ClientMessage::write(9, test_op());
    let parsed = ClientMessage::from_json(&msg.to_json().unwrap()).unwrap();
    assert_eq!(msg, parsed);
}

#[parameterized(
    pong = { ServerMessage::pong(5), Some(5) },
    ack = { ServerMessage::ack(6), Some(6) },
    rejected = { ServerMessage::rejected(7, "bad"), Some(7) },
    error = { ServerMessage::error(8, "busy"), Some(8) },
    query_error = { ServerMessage::query_error("denied"), None },
)]
fn test_server_reply_to(msg: ServerMessage, expected: Option<u64>) {
    assert_eq!(msg.reply_to(), expected);
}

#[test]
fn test_server_snapshot_parses() {
    let text = r#"{
        "type": "snapshot",
        "snapshot": {
            "query": {"collection": "leaderboard/event1"},
            "documents": [{"path": "leaderboard/event1/u1", "data": {"score": 10}}],
            "revision": 4,
            "received_at": "2026-01-01T00:00:00Z"
        }
    }"#;
    let msg = ServerMessage::from_json(text).unwrap();
    match msg {
        ServerMessage::Snapshot { snapshot } => {
            assert_eq!(snapshot.revision, 4);
            assert_eq!(snapshot.len(), 1);
            assert!(!snapshot.from_cache);
        }
        other => panic!("expected snapshot, got {:?}", other),
    }
}

#[test]
fn test_server_message_rejects_unknown_type() {
    assert!(ServerMessage::from_json(r#"{"type":"bogus"}"#).is_err());
}
