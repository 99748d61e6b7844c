//! Event stream specs: connected frame, live token streaming, cursors,
//! and per-session isolation.

use crate::prelude::*;
use gm_engine::SecurityConfig;
use gm_provider::{ScriptedProvider, ScriptedResponse};
use serde_json::json;

fn auto_approve() -> SecurityConfig {
    SecurityConfig {
        auto_approve: true,
        ..Default::default()
    }
}

#[tokio::test]
async fn stream_starts_with_connected_and_ends_with_session_ended() {
    let provider = ScriptedProvider::new().on("hello", ScriptedResponse::text("hi there"));
    let server = spawn_server(provider, auto_approve()).await;

    let id = server.create_session("hello").await;
    let frames = server.collect_stream(&id, None).await;
    let names = event_names(&frames);

    assert_eq!(names.first(), Some(&"connected"));
    assert_eq!(names.last(), Some(&"session_ended"));
}

#[tokio::test]
async fn tokens_stream_before_the_response() {
    let provider = ScriptedProvider::new()
        .on("stream", ScriptedResponse::text("a moderately long streamed answer"));
    let server = spawn_server(provider, auto_approve()).await;

    let id = server.create_session("stream").await;
    let frames = server.collect_stream(&id, None).await;
    let names = event_names(&frames);

    let token_count = names.iter().filter(|n| **n == "llm:token").count();
    assert!(token_count > 1, "expected several token frames");

    // Tokens precede the terminal response, and the deltas reassemble it.
    let first_token = names.iter().position(|n| *n == "llm:token").unwrap();
    let response = names.iter().position(|n| *n == "llm:response").unwrap();
    assert!(first_token < response);

    let reassembled: String = frames
        .iter()
        .filter(|(name, _)| name == "llm:token")
        .filter_map(|(_, data)| data["delta"].as_str().map(str::to_string))
        .collect();
    assert_eq!(reassembled, "a moderately long streamed answer");
}

#[tokio::test]
async fn cursor_skips_already_seen_events() {
    let provider = ScriptedProvider::new().on("hello", ScriptedResponse::text("hi"));
    let server = spawn_server(provider, auto_approve()).await;

    let id = server.create_session("hello").await;
    let frames = server.collect_stream(&id, None).await;

    // Use the user message's event ID as the cursor; the replayed stream
    // must not contain it again.
    let (_, user_event) = frames
        .iter()
        .find(|(name, _)| name == "user:message")
        .unwrap();
    let cursor = user_event["id"].as_str().unwrap();

    let replayed = server.collect_stream(&id, Some(cursor)).await;
    assert!(replayed
        .iter()
        .all(|(_, data)| data["id"].as_str() != Some(cursor)));
    assert!(event_names(&replayed).contains(&"llm:response"));
}

#[tokio::test]
async fn streams_are_isolated_between_sessions() {
    let provider = ScriptedProvider::new()
        .on("alpha", ScriptedResponse::text("from alpha"))
        .on("beta", ScriptedResponse::text("from beta"));
    let server = spawn_server(provider, auto_approve()).await;

    let a = server.create_session("alpha").await;
    let b = server.create_session("beta").await;

    let frames_a = server.collect_stream(&a, None).await;
    let frames_b = server.collect_stream(&b, None).await;

    let texts = |frames: &[(String, serde_json::Value)]| -> Vec<String> {
        frames
            .iter()
            .filter(|(name, _)| name == "llm:response")
            .filter_map(|(_, data)| data["content"].as_str().map(str::to_string))
            .collect()
    };
    assert_eq!(texts(&frames_a), vec!["from alpha"]);
    assert_eq!(texts(&frames_b), vec!["from beta"]);
}

#[tokio::test]
async fn shutdown_checkpoint_is_at_least_the_streamed_version() {
    let provider = ScriptedProvider::new().on("work", ScriptedResponse::text("done"));
    let server = spawn_server(provider, auto_approve()).await;

    let id = server.create_session("work").await;
    let frames = server.collect_stream(&id, None).await;

    // Highest state version a checkpoint frame reported.
    let streamed_version = frames
        .iter()
        .filter(|(name, _)| name == "checkpoint:saved")
        .filter_map(|(_, data)| data["state_version"].as_u64())
        .max()
        .unwrap_or(0);

    let info = server.get(&format!("/session/{id}")).await;
    let final_version = info["state_version"].as_u64().unwrap();

    let checkpoints = server.get(&format!("/session/{id}/checkpoints")).await;
    let latest = checkpoints["checkpoints"][0]["state_version"]
        .as_u64()
        .unwrap();
    assert!(latest >= streamed_version);
    assert_eq!(latest, final_version);
}

#[tokio::test]
async fn message_accepts_preempt_semantic() {
    let provider = ScriptedProvider::new().fallback(ScriptedResponse::text("ok"));
    let server = spawn_server(provider, auto_approve()).await;

    let created = server.post("/session", json!({})).await;
    let id = created["id"].as_str().unwrap().to_string();

    server
        .post(
            &format!("/session/{id}/message"),
            json!({ "content": "urgent", "semantic": "preempt" }),
        )
        .await;
    server.collect_stream(&id, None).await;

    let info = server.get(&format!("/session/{id}")).await;
    assert_eq!(info["goals"][0]["priority"], 100);
}
