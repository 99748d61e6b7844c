//! Shared-key middleware specs.

use crate::prelude::*;
use gm_engine::SecurityConfig;
use gm_provider::ScriptedProvider;
use serde_json::json;

#[tokio::test]
async fn requests_without_the_key_are_rejected() {
    let server = spawn_server_with_key(
        ScriptedProvider::new(),
        SecurityConfig::default(),
        Some("sekrit".into()),
    )
    .await;

    // Bare client without the header.
    let status = reqwest::Client::new()
        .post(format!("{}/session", server.base_url))
        .json(&json!({}))
        .send()
        .await
        .unwrap()
        .status();
    assert_eq!(status, reqwest::StatusCode::UNAUTHORIZED);

    let status = reqwest::Client::new()
        .post(format!("{}/session", server.base_url))
        .header("x-gm-key", "wrong")
        .json(&json!({}))
        .send()
        .await
        .unwrap()
        .status();
    assert_eq!(status, reqwest::StatusCode::UNAUTHORIZED);

    // The test client carries the key.
    let created = server.post("/session", json!({})).await;
    assert!(created["id"].as_str().unwrap().starts_with("ses_"));
}

#[tokio::test]
async fn health_stays_open_without_the_key() {
    let server = spawn_server_with_key(
        ScriptedProvider::new(),
        SecurityConfig::default(),
        Some("sekrit".into()),
    )
    .await;

    let health: serde_json::Value = reqwest::Client::new()
        .get(format!("{}/health", server.base_url))
        .send()
        .await
        .unwrap()
        .error_for_status()
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["status"], "healthy");
}

#[tokio::test]
async fn api_is_open_when_no_key_is_configured() {
    let server = spawn_server(ScriptedProvider::new(), SecurityConfig::default()).await;
    let created = reqwest::Client::new()
        .post(format!("{}/session", server.base_url))
        .json(&json!({}))
        .send()
        .await
        .unwrap();
    assert_eq!(created.status(), reqwest::StatusCode::OK);
}
