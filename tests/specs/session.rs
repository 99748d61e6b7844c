//! Session lifecycle specs: creation, the happy path through
//! `task_complete`, direct text answers, and deletion.

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
async fn happy_path_tool_completion() {
    let provider =
        ScriptedProvider::new().on("finish", ScriptedResponse::tool_call("task_complete", "{}"));
    let server = spawn_server(provider, auto_approve()).await;

    let id = server.create_session("finish").await;
    let frames = server.collect_stream(&id, None).await;
    let names = event_names(&frames);

    assert_eq!(names.first(), Some(&"connected"));
    assert_eq!(names.last(), Some(&"session_ended"));
    assert!(names.contains(&"user:message"));
    assert!(names.contains(&"llm:response"));
    assert!(names.contains(&"tool:result"));
    assert!(names.contains(&"checkpoint:saved"));

    let (_, ended) = frames.last().unwrap();
    assert_eq!(ended["status"], "completed");

    // Exactly one goal, completed.
    let info = server.get(&format!("/session/{id}")).await;
    assert_eq!(info["goals"].as_array().unwrap().len(), 1);
    assert_eq!(info["goals"][0]["status"], "completed");

    // A checkpoint exists.
    let checkpoints = server.get(&format!("/session/{id}/checkpoints")).await;
    assert!(!checkpoints["checkpoints"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn direct_text_answer_completes_the_goal() {
    let provider = ScriptedProvider::new().on("answer", ScriptedResponse::text("42"));
    let server = spawn_server(provider, auto_approve()).await;

    let id = server.create_session("what is the answer").await;
    let frames = server.collect_stream(&id, None).await;
    let names = event_names(&frames);

    // One LLM response, no tool traffic.
    assert_eq!(names.iter().filter(|n| **n == "llm:response").count(), 1);
    assert!(!names.contains(&"tool:result"));

    let info = server.get(&format!("/session/{id}")).await;
    assert_eq!(info["status"], "completed");
    assert_eq!(info["goals"][0]["status"], "completed");
}

#[tokio::test]
async fn sessions_list_and_delete() {
    let server = spawn_server(ScriptedProvider::new(), auto_approve()).await;

    let created = server.post("/session", json!({})).await;
    let id = created["id"].as_str().unwrap().to_string();
    assert_eq!(created["status"], "idle");

    let listed = server.get("/session").await;
    assert_eq!(listed["sessions"].as_array().unwrap().len(), 1);

    assert_eq!(
        server.delete(&format!("/session/{id}")).await,
        reqwest::StatusCode::OK
    );
    let listed = server.get("/session").await;
    assert!(listed["sessions"].as_array().unwrap().is_empty());

    // Deleting again is a 404.
    assert_eq!(
        server.delete(&format!("/session/{id}")).await,
        reqwest::StatusCode::NOT_FOUND
    );
}

#[tokio::test]
async fn message_relaunches_a_completed_session() {
    let provider = ScriptedProvider::new()
        .on("first", ScriptedResponse::text("done one"))
        .on("again", ScriptedResponse::text("done two"));
    let server = spawn_server(provider, auto_approve()).await;

    let id = server.create_session("first").await;
    server.collect_stream(&id, None).await;

    server
        .post(
            &format!("/session/{id}/message"),
            json!({ "content": "again" }),
        )
        .await;
    let frames = server.collect_stream(&id, None).await;
    let (_, ended) = frames.last().unwrap();
    assert_eq!(ended["status"], "completed");

    let info = server.get(&format!("/session/{id}")).await;
    assert_eq!(info["goals"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn unknown_session_is_404() {
    let server = spawn_server(ScriptedProvider::new(), auto_approve()).await;
    let status = server
        .http
        .get(format!("{}/session/ses_missing", server.base_url))
        .send()
        .await
        .unwrap()
        .status();
    assert_eq!(status, reqwest::StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn health_reports_version() {
    let server = spawn_server(ScriptedProvider::new(), auto_approve()).await;
    for path in ["/health", "/healthz"] {
        let health = server.get(path).await;
        assert_eq!(health["status"], "healthy");
        assert_eq!(health["version"], "test");
    }
}
