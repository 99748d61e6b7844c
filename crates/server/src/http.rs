// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP API and per-session event stream
//!
//! Thin axum handlers over the session manager. The event stream is SSE:
//! a `connected` frame, then every event since the client's cursor on a
//! fast poll, and a terminal `session_ended` frame once the session's loop
//! has finished.

use crate::session::{SessionError, SessionManager, SessionStatus};
use axum::extract::{Path, Query, State};
use axum::http::{Request, StatusCode};
use axum::middleware::{self, Next};
use axum::response::sse::{Event as SseEvent, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use gm_core::{ArtifactId, CheckpointId, MessageSemantic, RequestId, SessionId};
use gm_storage::{ArtifactFilter, StoreError};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::VecDeque;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

/// Poll interval of the event stream.
const STREAM_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Header carrying the shared API key.
const SHARED_KEY_HEADER: &str = "x-gm-key";

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub manager: Arc<SessionManager>,
    pub shared_key: Option<String>,
    pub version: &'static str,
}

/// Build the API router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/session", post(create_session).get(list_sessions))
        .route("/session/:id", get(get_session).delete(delete_session))
        .route("/session/:id/message", post(post_message))
        .route("/session/:id/cancel", post(cancel_session))
        .route("/session/:id/permission", post(respond_permission))
        .route("/session/:id/event", get(stream_events))
        .route("/session/:id/checkpoints", get(list_checkpoints))
        .route("/session/:id/rewind", post(rewind_session))
        .route("/session/:id/artifact", get(list_artifacts))
        .route("/session/:id/artifact/:art_id", get(get_artifact))
        .route("/health", get(health))
        .route("/healthz", get(health))
        .layer(middleware::from_fn_with_state(state.clone(), check_shared_key))
        .with_state(state)
}

/// Shared-key middleware; the API is open when no key is configured.
async fn check_shared_key(
    State(state): State<AppState>,
    request: Request<axum::body::Body>,
    next: Next,
) -> Response {
    let Some(expected) = &state.shared_key else {
        return next.run(request).await;
    };

    // Health stays open for probes.
    let path = request.uri().path();
    if path == "/health" || path == "/healthz" {
        return next.run(request).await;
    }

    let provided = request
        .headers()
        .get(SHARED_KEY_HEADER)
        .and_then(|v| v.to_str().ok());
    if provided == Some(expected.as_str()) {
        next.run(request).await
    } else {
        ApiError {
            status: StatusCode::UNAUTHORIZED,
            message: "missing or invalid shared key".to_string(),
        }
        .into_response()
    }
}

/// JSON error envelope.
struct ApiError {
    status: StatusCode,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

impl From<SessionError> for ApiError {
    fn from(e: SessionError) -> Self {
        let status = match &e {
            SessionError::NotFound => StatusCode::NOT_FOUND,
            SessionError::Store(StoreError::NotFound(_)) => StatusCode::NOT_FOUND,
            SessionError::Permission(_) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        ApiError {
            status,
            message: e.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct CreateSessionBody {
    #[serde(default)]
    prompt: Option<String>,
    #[serde(default)]
    system_prompt: Option<String>,
    #[serde(default = "default_priority")]
    priority: i32,
    /// Reserved for goal constraints; accepted and currently unused.
    #[serde(default)]
    #[allow(dead_code)]
    constraints: Option<serde_json::Value>,
}

fn default_priority() -> i32 {
    1
}

#[derive(Debug, Serialize)]
struct CreateSessionResponse {
    id: SessionId,
    status: SessionStatus,
    created_at: chrono::DateTime<chrono::Utc>,
}

async fn create_session(
    State(state): State<AppState>,
    Json(body): Json<CreateSessionBody>,
) -> Result<Json<CreateSessionResponse>, ApiError> {
    let handle = state
        .manager
        .create(body.prompt, body.system_prompt, body.priority)?;
    Ok(Json(CreateSessionResponse {
        id: handle.id.clone(),
        status: handle.status(),
        created_at: handle.created_at,
    }))
}

async fn list_sessions(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({ "sessions": state.manager.list() }))
}

async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let handle = state.manager.get(&SessionId::new(id))?;
    let info = handle.info();
    let state_snapshot = handle.runtime.get_state();
    Ok(Json(json!({
        "id": info.id,
        "status": info.status,
        "created_at": info.created_at,
        "last_error": info.last_error,
        "state_version": state_snapshot.version,
        "goals": state_snapshot.goals,
    })))
}

async fn delete_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state.manager.delete(&SessionId::new(id))?;
    Ok(Json(json!({ "deleted": true })))
}

#[derive(Debug, Deserialize)]
struct MessageBody {
    content: String,
    #[serde(default)]
    semantic: MessageSemantic,
}

async fn post_message(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<MessageBody>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state
        .manager
        .message(&SessionId::new(id), body.content, body.semantic)?;
    Ok(Json(json!({ "accepted": true })))
}

async fn cancel_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state.manager.cancel(&SessionId::new(id))?;
    Ok(Json(json!({ "cancelled": true })))
}

#[derive(Debug, Deserialize)]
struct PermissionBody {
    request_id: String,
    approved: bool,
    #[serde(default)]
    always: bool,
}

async fn respond_permission(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<PermissionBody>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state.manager.respond_permission(
        &SessionId::new(id),
        &RequestId::new(body.request_id),
        body.approved,
        body.always,
    )?;
    Ok(Json(json!({ "accepted": true })))
}

#[derive(Debug, Serialize)]
struct CheckpointSummary {
    id: CheckpointId,
    state_version: u64,
    timestamp: chrono::DateTime<chrono::Utc>,
    file_changes: usize,
}

async fn list_checkpoints(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let checkpoints = state.manager.list_checkpoints(&SessionId::new(id))?;
    let summaries: Vec<CheckpointSummary> = checkpoints
        .into_iter()
        .map(|cp| CheckpointSummary {
            id: cp.id,
            state_version: cp.state_version,
            timestamp: cp.timestamp,
            file_changes: cp.file_changes.len(),
        })
        .collect();
    Ok(Json(json!({ "checkpoints": summaries })))
}

#[derive(Debug, Deserialize)]
struct RewindBody {
    checkpoint_id: String,
    #[serde(default)]
    rewind_code: bool,
    #[serde(default)]
    rewind_conversation: bool,
}

async fn rewind_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<RewindBody>,
) -> Result<Json<crate::session::RewindReport>, ApiError> {
    let report = state.manager.rewind(
        &SessionId::new(id),
        &CheckpointId::new(body.checkpoint_id),
        body.rewind_code,
        body.rewind_conversation,
    )?;
    Ok(Json(report))
}

#[derive(Debug, Deserialize)]
struct ArtifactQuery {
    #[serde(default)]
    artifact_type: Option<String>,
}

async fn list_artifacts(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<ArtifactQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let filter = ArtifactFilter {
        artifact_type: query.artifact_type,
        ..Default::default()
    };
    let artifacts = state.manager.list_artifacts(&SessionId::new(id), &filter)?;
    Ok(Json(json!({ "artifacts": artifacts })))
}

async fn get_artifact(
    State(state): State<AppState>,
    Path((id, art_id)): Path<(String, String)>,
) -> Result<Response, ApiError> {
    let artifact = state
        .manager
        .get_artifact(&SessionId::new(id), &ArtifactId::new(art_id))?;

    // Binary passthrough when the artifact points at a real file.
    if let Some(path) = artifact.path.as_deref() {
        if let Ok(bytes) = tokio::fs::read(path).await {
            return Ok((
                [(axum::http::header::CONTENT_TYPE, "application/octet-stream")],
                bytes,
            )
                .into_response());
        }
    }
    Ok(Json(artifact).into_response())
}

#[derive(Debug, Deserialize)]
struct EventQuery {
    #[serde(default)]
    after: Option<String>,
}

enum StreamPhase {
    Connected,
    Polling,
    Ended,
}

struct StreamState {
    handle: Arc<crate::session::SessionHandle>,
    cursor: String,
    buffer: VecDeque<SseEvent>,
    phase: StreamPhase,
}

async fn stream_events(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<EventQuery>,
) -> Result<Sse<impl futures::Stream<Item = Result<SseEvent, Infallible>>>, ApiError> {
    let handle = state.manager.get(&SessionId::new(id))?;

    let stream_state = StreamState {
        handle,
        cursor: query.after.unwrap_or_default(),
        buffer: VecDeque::new(),
        phase: StreamPhase::Connected,
    };

    let stream = futures::stream::unfold(stream_state, |mut s| async move {
        loop {
            match s.phase {
                StreamPhase::Connected => {
                    s.phase = StreamPhase::Polling;
                    let frame = SseEvent::default().event("connected").data("{}");
                    return Some((Ok(frame), s));
                }
                StreamPhase::Polling => {
                    if let Some(frame) = s.buffer.pop_front() {
                        return Some((Ok(frame), s));
                    }

                    let events = s.handle.store.get_events_since(&s.cursor).unwrap_or_default();
                    if !events.is_empty() {
                        if let Some(last) = events.last() {
                            s.cursor = last.id.to_string();
                        }
                        for event in events {
                            let data = serde_json::to_string(&event).unwrap_or_default();
                            s.buffer
                                .push_back(SseEvent::default().event(event.name()).data(data));
                        }
                        continue;
                    }

                    // Terminal status only ends the stream once the log is
                    // drained.
                    if s.handle.status().is_terminal() {
                        s.phase = StreamPhase::Ended;
                        let data = json!({ "status": s.handle.status() }).to_string();
                        let frame = SseEvent::default().event("session_ended").data(data);
                        return Some((Ok(frame), s));
                    }

                    tokio::time::sleep(STREAM_POLL_INTERVAL).await;
                }
                StreamPhase::Ended => return None,
            }
        }
    });

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({ "status": "healthy", "version": state.version }))
}
