//! Test helpers for behavioral specifications.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic, dead_code)]

use gm_engine::{SecurityConfig, ToolRegistry};
use gm_provider::ScriptedProvider;
use gm_server::{router, AppState, SessionFactory, SessionManager};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

/// Overall bound on one spec's wire interactions.
///
/// Generous: the permission-denial spec walks the whole step budget with a
/// stream round trip per prompt.
pub const SPEC_TIMEOUT: Duration = Duration::from_secs(30);

/// One server instance on an ephemeral port.
pub struct TestServer {
    pub base_url: String,
    pub manager: Arc<SessionManager>,
    pub http: reqwest::Client,
    pub shared_key: Option<String>,
    _data_dir: tempfile::TempDir,
}

/// Boot a server with the given provider and security settings.
pub async fn spawn_server(provider: ScriptedProvider, security: SecurityConfig) -> TestServer {
    spawn_server_with_key(provider, security, None).await
}

pub async fn spawn_server_with_key(
    provider: ScriptedProvider,
    security: SecurityConfig,
    shared_key: Option<String>,
) -> TestServer {
    let data_dir = tempfile::tempdir().unwrap();
    let workspace_root = data_dir.path().join("workspace");
    std::fs::create_dir_all(&workspace_root).unwrap();

    let manager = Arc::new(SessionManager::new(SessionFactory {
        data_dir: data_dir.path().to_path_buf(),
        provider: Arc::new(provider),
        registry: Arc::new(ToolRegistry::with_builtins()),
        security,
        workspace_root,
        runtime_config: Default::default(),
    }));

    let state = AppState {
        manager: Arc::clone(&manager),
        shared_key: shared_key.clone(),
        version: "test",
    };

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router(state)).await.unwrap();
    });

    TestServer {
        base_url: format!("http://{addr}"),
        manager,
        http: reqwest::Client::new(),
        shared_key,
        _data_dir: data_dir,
    }
}

impl TestServer {
    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let mut builder = self
            .http
            .request(method, format!("{}{path}", self.base_url));
        if let Some(key) = &self.shared_key {
            builder = builder.header("x-gm-key", key);
        }
        builder
    }

    pub async fn post(&self, path: &str, body: Value) -> Value {
        self.request(reqwest::Method::POST, path)
            .json(&body)
            .send()
            .await
            .unwrap()
            .error_for_status()
            .unwrap()
            .json()
            .await
            .unwrap()
    }

    pub async fn get(&self, path: &str) -> Value {
        self.request(reqwest::Method::GET, path)
            .send()
            .await
            .unwrap()
            .error_for_status()
            .unwrap()
            .json()
            .await
            .unwrap()
    }

    pub async fn delete(&self, path: &str) -> reqwest::StatusCode {
        self.request(reqwest::Method::DELETE, path)
            .send()
            .await
            .unwrap()
            .status()
    }

    /// Create a session with a prompt; returns its ID.
    pub async fn create_session(&self, prompt: &str) -> String {
        let response = self
            .post("/session", serde_json::json!({ "prompt": prompt }))
            .await;
        response["id"].as_str().unwrap().to_string()
    }

    /// Collect stream frames until `session_ended`, invoking the callback
    /// on each frame as it arrives.
    pub async fn collect_stream_with(
        &self,
        session_id: &str,
        after: Option<&str>,
        mut on_frame: impl FnMut(&str, &Value),
    ) -> Vec<(String, Value)> {
        let path = match after {
            Some(cursor) => format!("/session/{session_id}/event?after={cursor}"),
            None => format!("/session/{session_id}/event"),
        };

        let collect = async {
            let response = self
                .request(reqwest::Method::GET, &path)
                .send()
                .await
                .unwrap()
                .error_for_status()
                .unwrap();

            use futures::StreamExt;
            let mut body = response.bytes_stream();
            let mut buffer = String::new();
            let mut frames = Vec::new();

            'outer: while let Some(chunk) = body.next().await {
                buffer.push_str(&String::from_utf8_lossy(&chunk.unwrap()));
                while let Some(end) = buffer.find("\n\n") {
                    let block: String = buffer.drain(..end + 2).collect();
                    let Some((event, data)) = parse_sse_block(&block) else {
                        continue;
                    };
                    on_frame(&event, &data);
                    let ended = event == "session_ended";
                    frames.push((event, data));
                    if ended {
                        break 'outer;
                    }
                }
            }
            frames
        };

        tokio::time::timeout(SPEC_TIMEOUT, collect)
            .await
            .expect("stream did not end within the spec timeout")
    }

    pub async fn collect_stream(
        &self,
        session_id: &str,
        after: Option<&str>,
    ) -> Vec<(String, Value)> {
        self.collect_stream_with(session_id, after, |_, _| {}).await
    }
}

fn parse_sse_block(block: &str) -> Option<(String, Value)> {
    let mut event = None;
    let mut data = String::new();
    for line in block.lines() {
        if let Some(rest) = line.strip_prefix("event:") {
            event = Some(rest.trim().to_string());
        } else if let Some(rest) = line.strip_prefix("data:") {
            data.push_str(rest.trim_start());
        }
    }
    Some((event?, serde_json::from_str(&data).unwrap_or(Value::Null)))
}

/// Names of the events in a frame list.
pub fn event_names(frames: &[(String, Value)]) -> Vec<&str> {
    frames.iter().map(|(name, _)| name.as_str()).collect()
}
