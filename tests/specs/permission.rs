//! Permission rendezvous specs: the executor suspends on `Confirm`, the
//! client answers over HTTP, and `always=true` persists a rule that
//! short-circuits the next identical call.

use crate::prelude::*;
use gm_engine::SecurityConfig;
use gm_provider::{ScriptedProvider, ScriptedResponse};
use serde_json::{json, Value};
use std::sync::Arc;

fn confirm_everything() -> SecurityConfig {
    // auto_approve off: every allowed tool call needs confirmation.
    SecurityConfig::default()
}

fn provider() -> ScriptedProvider {
    ScriptedProvider::new()
        .on("finish", ScriptedResponse::tool_call("task_complete", "{}"))
}

#[tokio::test]
async fn approval_unblocks_the_tool_and_always_persists_a_rule() {
    let server = Arc::new(spawn_server(provider(), confirm_everything()).await);
    let id = server.create_session("finish").await;

    // Answer the permission request as soon as it streams by.
    let responder = {
        let server = Arc::clone(&server);
        let id = id.clone();
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<String>();
        let handle = tokio::spawn(async move {
            while let Some(request_id) = rx.recv().await {
                server
                    .post(
                        &format!("/session/{id}/permission"),
                        json!({ "request_id": request_id, "approved": true, "always": true }),
                    )
                    .await;
            }
        });
        (tx, handle)
    };

    let frames = server
        .collect_stream_with(&id, None, |event, data| {
            if event == "permission:request" {
                if let Some(request_id) = data["request_id"].as_str() {
                    let _ = responder.0.send(request_id.to_string());
                }
            }
        })
        .await;

    let names = event_names(&frames);
    assert!(names.contains(&"permission:request"));
    assert!(names.contains(&"permission:response"));
    let (_, ended) = frames.last().unwrap();
    assert_eq!(ended["status"], "completed");

    // The rule persisted: an identical call runs without a new prompt.
    server
        .post(
            &format!("/session/{id}/message"),
            json!({ "content": "finish" }),
        )
        .await;
    let frames = server.collect_stream(&id, None).await;
    let prompts = frames
        .iter()
        .filter(|(name, _)| name == "permission:request")
        .count();
    assert_eq!(prompts, 1, "second identical call must not prompt again");

    let info = server.get(&format!("/session/{id}")).await;
    let goals = info["goals"].as_array().unwrap();
    assert_eq!(goals.len(), 2);
    assert!(goals.iter().all(|g| g["status"] == "completed"));
}

#[tokio::test]
async fn denial_becomes_a_failed_tool_result() {
    let server = Arc::new(spawn_server(provider(), confirm_everything()).await);
    let id = server.create_session("finish").await;

    let responder = {
        let server = Arc::clone(&server);
        let id = id.clone();
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<String>();
        let handle = tokio::spawn(async move {
            while let Some(request_id) = rx.recv().await {
                server
                    .post(
                        &format!("/session/{id}/permission"),
                        json!({ "request_id": request_id, "approved": false }),
                    )
                    .await;
            }
        });
        (tx, handle)
    };

    let frames = server
        .collect_stream_with(&id, None, |event, data| {
            if event == "permission:request" {
                if let Some(request_id) = data["request_id"].as_str() {
                    let _ = responder.0.send(request_id.to_string());
                }
            }
        })
        .await;

    // The denial comes back as a failed tool result, not a dead session.
    let denial = frames
        .iter()
        .find(|(name, _)| name == "tool:result")
        .map(|(_, data)| data.clone())
        .unwrap();
    assert_eq!(denial["success"], false);
    assert_eq!(denial["error"], "Permission denied by user");

    // The agent keeps retrying until the step budget trips, which is the
    // circuit breaker, not a completion.
    let (_, ended) = frames.last().unwrap();
    assert_eq!(ended["status"], "error");

    // No rule was stored.
    let rules = rules_for(&server, &id);
    assert!(rules.is_empty());
}

#[tokio::test]
async fn stray_permission_response_is_rejected() {
    let server = spawn_server(provider(), confirm_everything()).await;
    let id = server.create_session("finish").await;

    let status = server
        .http
        .post(format!("{}/session/{id}/permission", server.base_url))
        .json(&json!({ "request_id": "perm_stray", "approved": true }))
        .send()
        .await
        .unwrap()
        .status();
    assert_eq!(status, reqwest::StatusCode::NOT_FOUND);

    // Drain the session so the spawned loop doesn't outlive the test
    // holding a pending prompt.
    server
        .manager
        .cancel(&gm_core::SessionId::new(id))
        .unwrap();
}

fn rules_for(server: &TestServer, id: &str) -> Vec<Value> {
    let handle = server
        .manager
        .get(&gm_core::SessionId::new(id))
        .unwrap();
    handle
        .store
        .get_permission_rules()
        .unwrap()
        .into_iter()
        .map(|r| serde_json::to_value(r).unwrap())
        .collect()
}
