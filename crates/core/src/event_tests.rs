// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::clock::{FakeClock, SystemClock};

#[test]
fn user_message_serializes_with_type_tag() {
    let event = Event::user_message("do the thing", 1, MessageSemantic::Append, &SystemClock);
    let json = serde_json::to_value(&event).unwrap();
    assert_eq!(json["type"], "user:message");
    assert_eq!(json["content"], "do the thing");
    assert_eq!(json["actor"], "user");
    assert!(json["id"].as_str().unwrap().starts_with("evt_"));
}

#[test]
fn event_round_trips() {
    let event = Event::new(
        Actor::Llm,
        "gol_1",
        EventPayload::LlmResponse {
            model: "test-model".into(),
            content: "hi".into(),
            tool_calls: vec![ToolCall {
                id: "call_1".into(),
                name: "task_complete".into(),
                arguments: "{}".into(),
            }],
            usage: Usage::default(),
        },
        &FakeClock::default(),
    );
    let line = serde_json::to_string(&event).unwrap();
    let back: Event = serde_json::from_str(&line).unwrap();
    assert_eq!(back, event);
}

#[test]
fn unknown_type_degrades_to_base_event() {
    let line = r#"{"id":"evt_1","timestamp":"2026-01-01T00:00:00Z","actor":"system","type":"future:thing","payload_field":42}"#;
    let event: Event = serde_json::from_str(line).unwrap();
    assert_eq!(event.payload, EventPayload::Unknown);
    assert_eq!(event.id, "evt_1");
    assert_eq!(event.actor, Actor::System);
}

#[test]
fn default_semantic_is_append() {
    let line = r#"{"id":"evt_2","timestamp":"2026-01-01T00:00:00Z","actor":"user","type":"user:message","content":"hi"}"#;
    let event: Event = serde_json::from_str(line).unwrap();
    match event.payload {
        EventPayload::UserMessage {
            semantic, priority, ..
        } => {
            assert_eq!(semantic, MessageSemantic::Append);
            assert_eq!(priority, 0);
        }
        other => panic!("unexpected payload: {other:?}"),
    }
}

#[test]
fn permission_response_omits_always_when_false() {
    let event = Event::new(
        Actor::User,
        "",
        EventPayload::PermissionResponse {
            request_id: RequestId::new("perm_1"),
            approved: true,
            always: false,
        },
        &FakeClock::default(),
    );
    let json = serde_json::to_value(&event).unwrap();
    assert!(json.get("always").is_none());
}

#[test]
fn log_summary_names_the_variant() {
    let event = Event::user_message("hello", 7, MessageSemantic::Preempt, &SystemClock);
    assert_eq!(event.name(), "user:message");
    assert!(event.log_summary().contains("priority=7"));
}

#[test]
fn empty_subject_is_omitted() {
    let event = Event::system_prompt("be helpful", &SystemClock);
    let json = serde_json::to_value(&event).unwrap();
    assert!(json.get("subject").is_none());
}
