//! Rewind specs: checkpoints record file changes, and rewinding to a
//! checkpoint reverses everything recorded after it.
//!
//! File edits are staged through the session's patch engine directly
//! (concrete editing tools live outside the core); the checkpoint and
//! rewind surfaces are driven over HTTP.

use crate::prelude::*;
use gm_core::SessionId;
use gm_engine::SecurityConfig;
use gm_patch::{generate_diff, ApplyRequest};
use gm_provider::ScriptedProvider;
use serde_json::json;

fn edit(server: &TestServer, id: &str, file: &str, old: &str, new: &str) {
    let handle = server.manager.get(&SessionId::new(id)).unwrap();
    let result = handle
        .patcher
        .apply(&ApplyRequest {
            file_path: file.to_string(),
            diff: generate_diff(file, old, new).unwrap(),
            dry_run: false,
        })
        .unwrap();
    assert!(result.success);
    handle.runtime.checkpoint().unwrap();
}

fn workspace_file(server: &TestServer, id: &str, file: &str) -> Option<String> {
    let handle = server.manager.get(&SessionId::new(id)).unwrap();
    let root = handle.store.root().to_path_buf();
    // The workspace sits next to the sessions directory.
    let workspace = root
        .parent()
        .and_then(|sessions| sessions.parent())
        .map(|data| data.join("workspace"))?;
    std::fs::read_to_string(workspace.join(file)).ok()
}

#[tokio::test]
async fn rewind_code_restores_checkpoint_era_files() {
    let server = spawn_server(
        ScriptedProvider::new(),
        SecurityConfig {
            auto_approve: true,
            ..Default::default()
        },
    )
    .await;

    let created = server.post("/session", json!({})).await;
    let id = created["id"].as_str().unwrap().to_string();

    // Three turns, each editing a distinct file with its own checkpoint.
    edit(&server, &id, "a.txt", "", "alpha v1\n");
    edit(&server, &id, "b.txt", "", "bravo v1\n");
    edit(&server, &id, "c.txt", "", "charlie v1\n");

    let checkpoints = server.get(&format!("/session/{id}/checkpoints")).await;
    let listed = checkpoints["checkpoints"].as_array().unwrap();
    assert!(listed.len() >= 3);
    // Newest first; every staged checkpoint carries exactly one change.
    assert_eq!(listed[0]["file_changes"], 1);

    // The rewind target is the oldest of the three (a.txt's checkpoint).
    let target = listed[listed.len() - 1]["id"].as_str().unwrap().to_string();

    let report = server
        .post(
            &format!("/session/{id}/rewind"),
            json!({ "checkpoint_id": target, "rewind_code": true }),
        )
        .await;
    assert_eq!(report["success"], true);
    assert_eq!(report["rolled_back"], 2);

    // cp1-era content: a.txt survives, the later files are gone.
    assert_eq!(
        workspace_file(&server, &id, "a.txt").as_deref(),
        Some("alpha v1\n")
    );
    assert!(workspace_file(&server, &id, "b.txt").is_none());
    assert!(workspace_file(&server, &id, "c.txt").is_none());
}

#[tokio::test]
async fn rewind_conversation_restores_state_version() {
    let provider = ScriptedProvider::new();
    let server = spawn_server(
        provider,
        SecurityConfig {
            auto_approve: true,
            ..Default::default()
        },
    )
    .await;

    let created = server.post("/session", json!({})).await;
    let id = created["id"].as_str().unwrap().to_string();
    let handle = server.manager.get(&SessionId::new(&id)).unwrap();

    handle.runtime.checkpoint().unwrap();
    let target_version = handle.runtime.get_state().version;
    let checkpoints = server.get(&format!("/session/{id}/checkpoints")).await;
    let target = checkpoints["checkpoints"][0]["id"]
        .as_str()
        .unwrap()
        .to_string();

    // Grow the conversation past the checkpoint.
    server
        .post(
            &format!("/session/{id}/message"),
            json!({ "content": "grow" }),
        )
        .await;
    server.collect_stream(&id, None).await;
    assert!(handle.runtime.get_state().version > target_version);

    let report = server
        .post(
            &format!("/session/{id}/rewind"),
            json!({ "checkpoint_id": target, "rewind_conversation": true }),
        )
        .await;
    assert_eq!(report["success"], true);
    assert_eq!(handle.runtime.get_state().version, target_version);
}

#[tokio::test]
async fn rewind_to_unknown_checkpoint_is_404() {
    let server = spawn_server(ScriptedProvider::new(), SecurityConfig::default()).await;
    let created = server.post("/session", json!({})).await;
    let id = created["id"].as_str().unwrap();

    let status = server
        .http
        .post(format!("{}/session/{id}/rewind", server.base_url))
        .json(&json!({ "checkpoint_id": "ckpt_missing", "rewind_code": true }))
        .send()
        .await
        .unwrap()
        .status();
    assert_eq!(status, reqwest::StatusCode::NOT_FOUND);
}
