// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session manager
//!
//! Multiplexes independent runtimes under stable session IDs. Each session
//! owns its store directory, permission rendezvous, patch engine, runtime,
//! and cancel token; the factory wires them together and hooks the
//! executor's permission requests into the session's event stream.

use chrono::{DateTime, Utc};
use gm_core::{
    Actor, AgentState, ArtifactId, Checkpoint, CheckpointId, Event, EventPayload, FileChange,
    MessageSemantic, RequestId, SessionId, SystemClock,
};
use gm_engine::{
    Executor, Gateway, PermissionManager, Policy, RespondError, Runtime, RuntimeConfig,
    RuntimeDeps, RuntimeError, SecurityConfig, ToolRegistry,
};
use gm_patch::{PatchConfig, PatchEngine};
use gm_provider::Provider;
use gm_storage::{ArtifactFilter, Store, StoreError};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Errors from session operations
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("session not found")]
    NotFound,
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("runtime error: {0}")]
    Runtime(#[from] RuntimeError),
    #[error("permission error: {0}")]
    Permission(#[from] RespondError),
}

/// Session lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Idle,
    Running,
    Completed,
    Cancelled,
    Error,
}

impl SessionStatus {
    /// True once the session's loop has ended for good (until relaunch).
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            SessionStatus::Completed | SessionStatus::Cancelled | SessionStatus::Error
        )
    }
}

/// Client-facing session summary.
#[derive(Debug, Clone, Serialize)]
pub struct SessionInfo {
    pub id: SessionId,
    pub status: SessionStatus,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

/// Result of a rewind.
#[derive(Debug, Clone, Serialize)]
pub struct RewindReport {
    pub success: bool,
    pub checkpoint_id: CheckpointId,
    pub rolled_back: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<String>,
}

/// Everything one session owns.
pub struct SessionHandle {
    pub id: SessionId,
    pub runtime: Arc<Runtime<SystemClock>>,
    pub permissions: Arc<PermissionManager>,
    pub store: Arc<Store>,
    pub patcher: Arc<PatchEngine>,
    pub cancel: CancellationToken,
    pub created_at: DateTime<Utc>,
    status_tx: watch::Sender<SessionStatus>,
    last_error: Mutex<Option<String>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl SessionHandle {
    pub fn status(&self) -> SessionStatus {
        *self.status_tx.borrow()
    }

    /// Watch the status; used by the event stream to detect the end of the
    /// session.
    pub fn subscribe_status(&self) -> watch::Receiver<SessionStatus> {
        self.status_tx.subscribe()
    }

    pub fn last_error(&self) -> Option<String> {
        self.last_error.lock().clone()
    }

    pub fn info(&self) -> SessionInfo {
        SessionInfo {
            id: self.id.clone(),
            status: self.status(),
            created_at: self.created_at,
            last_error: self.last_error(),
        }
    }
}

/// Builds one session's resource bundle.
///
/// Explicit capability record instead of closures: the factory owns the
/// read-mostly singletons (provider, registry, security config) and stamps
/// out per-session stores, patch engines, and runtimes.
pub struct SessionFactory {
    pub data_dir: PathBuf,
    pub provider: Arc<dyn Provider>,
    pub registry: Arc<ToolRegistry>,
    pub security: SecurityConfig,
    pub workspace_root: PathBuf,
    pub runtime_config: RuntimeConfig,
}

impl SessionFactory {
    fn build(&self, id: &SessionId) -> Result<SessionHandle, SessionError> {
        let root = self.data_dir.join("sessions").join(id.as_str());
        let store = Arc::new(Store::open(&root)?);

        let permissions = Arc::new(PermissionManager::new());
        let patcher = Arc::new(PatchEngine::new(PatchConfig::new(&self.workspace_root)));

        let executor = Executor::new(
            Arc::clone(&self.registry),
            Policy::new(self.security.clone()),
            Arc::clone(&permissions),
            Arc::clone(&store),
            SystemClock,
        )
        .with_handler_timeout(self.runtime_config.dispatch_timeout);

        // Permission requests surface through the session's own log so the
        // event stream delivers them to the client.
        let emitter_store = Arc::clone(&store);
        executor.set_permission_emitter(Arc::new(move |event| {
            if let Err(e) = emitter_store.append_event(&event) {
                warn!(error = %e, "failed to surface permission request");
            }
        }));

        let runtime = Arc::new(Runtime::new(
            RuntimeDeps {
                store: Arc::clone(&store),
                gateway: Gateway::new(Arc::clone(&self.provider)),
                executor,
                registry: Arc::clone(&self.registry),
                patcher: Some(Arc::clone(&patcher)),
            },
            SystemClock,
            self.runtime_config.clone(),
        ));
        runtime.set_file_change_tracker(patcher.tracker());

        let (status_tx, _) = watch::channel(SessionStatus::Idle);
        Ok(SessionHandle {
            id: id.clone(),
            runtime,
            permissions,
            store,
            patcher,
            cancel: CancellationToken::new(),
            created_at: Utc::now(),
            status_tx,
            last_error: Mutex::new(None),
            task: Mutex::new(None),
        })
    }
}

/// Registry of live sessions.
pub struct SessionManager {
    factory: SessionFactory,
    sessions: RwLock<HashMap<SessionId, Arc<SessionHandle>>>,
}

impl SessionManager {
    pub fn new(factory: SessionFactory) -> Self {
        Self {
            factory,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Create a session; an initial prompt starts the loop immediately.
    pub fn create(
        &self,
        prompt: Option<String>,
        system_prompt: Option<String>,
        priority: i32,
    ) -> Result<Arc<SessionHandle>, SessionError> {
        let id = SessionId::generate();
        let handle = Arc::new(self.factory.build(&id)?);
        self.sessions.write().insert(id.clone(), Arc::clone(&handle));
        info!(session = %id, "created session");

        if let Some(system_prompt) = system_prompt {
            handle
                .runtime
                .ingest(Event::system_prompt(system_prompt, &SystemClock))?;
        }
        if let Some(prompt) = prompt {
            handle.runtime.ingest(Event::user_message(
                prompt,
                priority,
                MessageSemantic::Append,
                &SystemClock,
            ))?;
            self.launch(&handle);
        }
        Ok(handle)
    }

    pub fn get(&self, id: &SessionId) -> Result<Arc<SessionHandle>, SessionError> {
        self.sessions
            .read()
            .get(id)
            .cloned()
            .ok_or(SessionError::NotFound)
    }

    pub fn list(&self) -> Vec<SessionInfo> {
        let mut infos: Vec<SessionInfo> = self
            .sessions
            .read()
            .values()
            .map(|handle| handle.info())
            .collect();
        infos.sort_by(|a, b| a.id.cmp(&b.id));
        infos
    }

    /// Cancel the session's loop; a pending permission wait observes the
    /// token and unblocks.
    pub fn cancel(&self, id: &SessionId) -> Result<(), SessionError> {
        let handle = self.get(id)?;
        handle.cancel.cancel();
        info!(session = %id, "cancelled session");
        Ok(())
    }

    /// Cancel and remove the session.
    pub fn delete(&self, id: &SessionId) -> Result<(), SessionError> {
        let handle = self
            .sessions
            .write()
            .remove(id)
            .ok_or(SessionError::NotFound)?;
        handle.cancel.cancel();
        if let Some(task) = handle.task.lock().take() {
            task.abort();
        }
        info!(session = %id, "deleted session");
        Ok(())
    }

    /// Ingest a user message; relaunches the loop when the session is
    /// idle or completed.
    pub fn message(
        &self,
        id: &SessionId,
        content: String,
        semantic: MessageSemantic,
    ) -> Result<(), SessionError> {
        let handle = self.get(id)?;
        // Preempt jumps the ingestion priority ahead of normal chatter.
        let priority = if semantic == MessageSemantic::Preempt {
            100
        } else {
            1
        };
        handle
            .runtime
            .ingest(Event::user_message(content, priority, semantic, &SystemClock))?;

        if matches!(
            handle.status(),
            SessionStatus::Idle | SessionStatus::Completed
        ) {
            self.launch(&handle);
        }
        Ok(())
    }

    /// Deposit a permission decision and record it in the session's log.
    pub fn respond_permission(
        &self,
        id: &SessionId,
        request_id: &RequestId,
        approved: bool,
        always: bool,
    ) -> Result<(), SessionError> {
        let handle = self.get(id)?;

        let event = Event::new(
            Actor::User,
            request_id.as_str(),
            EventPayload::PermissionResponse {
                request_id: request_id.clone(),
                approved,
                always,
            },
            &SystemClock,
        );
        if let Err(e) = handle.store.append_event(&event) {
            warn!(error = %e, "failed to record permission response");
        }

        handle.permissions.respond(request_id, approved, always)?;
        Ok(())
    }

    pub fn list_checkpoints(&self, id: &SessionId) -> Result<Vec<Checkpoint>, SessionError> {
        Ok(self.get(id)?.store.list_checkpoints()?)
    }

    /// Rewind code and/or conversation to a checkpoint.
    ///
    /// Code rewind reverses every file change recorded after the target,
    /// newest first; individual rollback failures are recorded and the
    /// rest proceed. Conversation rewind swaps the target's state in.
    pub fn rewind(
        &self,
        id: &SessionId,
        checkpoint_id: &CheckpointId,
        rewind_code: bool,
        rewind_conversation: bool,
    ) -> Result<RewindReport, SessionError> {
        let handle = self.get(id)?;
        let target = handle.store.load_checkpoint(checkpoint_id)?;

        let mut rolled_back = 0;
        let mut failures = Vec::new();

        if rewind_code {
            // list_checkpoints is newest-first; collect the ones after the
            // target in creation order, concatenate their changes, then
            // undo in reverse.
            let mut newer: Vec<Checkpoint> = handle
                .store
                .list_checkpoints()?
                .into_iter()
                .filter(|cp| cp.timestamp > target.timestamp && cp.id != target.id)
                .collect();
            newer.reverse();

            let changes: Vec<FileChange> =
                newer.into_iter().flat_map(|cp| cp.file_changes).collect();
            for change in changes.iter().rev() {
                match handle.patcher.rollback(&change.patch_id) {
                    Ok(()) => rolled_back += 1,
                    Err(e) => {
                        warn!(
                            patch = %change.patch_id,
                            file = %change.file_path,
                            error = %e,
                            "rollback failed, continuing",
                        );
                        failures.push(format!("{}: {e}", change.file_path));
                    }
                }
            }
        }

        if rewind_conversation {
            handle.runtime.restore_state(target.state.clone())?;
        }

        info!(
            session = %id,
            checkpoint = %checkpoint_id,
            rolled_back,
            failures = failures.len(),
            "rewind complete",
        );
        Ok(RewindReport {
            success: failures.is_empty(),
            checkpoint_id: checkpoint_id.clone(),
            rolled_back,
            failures,
        })
    }

    pub fn list_artifacts(
        &self,
        id: &SessionId,
        filter: &ArtifactFilter,
    ) -> Result<Vec<gm_core::Artifact>, SessionError> {
        Ok(self.get(id)?.store.list_artifacts(filter)?)
    }

    pub fn get_artifact(
        &self,
        id: &SessionId,
        artifact_id: &ArtifactId,
    ) -> Result<gm_core::Artifact, SessionError> {
        Ok(self.get(id)?.store.get_artifact(artifact_id)?)
    }

    /// Current state of a session (deep clone).
    pub fn get_state(&self, id: &SessionId) -> Result<AgentState, SessionError> {
        Ok(self.get(id)?.runtime.get_state())
    }

    /// Spawn the session's run loop.
    fn launch(&self, handle: &Arc<SessionHandle>) {
        let mut task = handle.task.lock();
        let _ = handle.status_tx.send(SessionStatus::Running);

        let runtime = Arc::clone(&handle.runtime);
        let cancel = handle.cancel.clone();
        let status_tx = handle.status_tx.clone();
        let session_id = handle.id.clone();
        let handle_for_error = Arc::clone(handle);

        *task = Some(tokio::spawn(async move {
            match runtime.run(cancel).await {
                Ok(gm_engine::RunOutcome::Completed) => {
                    info!(session = %session_id, "session run completed");
                    let _ = status_tx.send(SessionStatus::Completed);
                }
                Ok(gm_engine::RunOutcome::Cancelled) => {
                    info!(session = %session_id, "session run cancelled");
                    let _ = status_tx.send(SessionStatus::Cancelled);
                }
                Err(e) => {
                    error!(session = %session_id, error = %e, "session run failed");
                    *handle_for_error.last_error.lock() = Some(e.to_string());
                    let _ = status_tx.send(SessionStatus::Error);
                }
            }
        }));
    }

    /// Cancel every session (graceful server shutdown).
    pub fn shutdown(&self) {
        for handle in self.sessions.read().values() {
            handle.cancel.cancel();
        }
    }
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
