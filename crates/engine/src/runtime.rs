// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-session runtime
//!
//! Owns one session's state and drives the decide → act → observe loop.
//! State is only mutated through the reducer while the write lock is held;
//! `ingest` persists the event before applying it, so the log is always a
//! prefix of what any reader sees in state.

use crate::error::RuntimeError;
use crate::executor::{Executor, ToolInvocation};
use crate::gateway::Gateway;
use crate::reducer::reduce_guarded;
use crate::tools::ToolRegistry;
use futures::StreamExt;
use gm_core::{
    Actor, AgentState, Checkpoint, CheckpointId, Clock, Command, CommandKind, ContextMessage,
    ErrorSeverity, Event, EventPayload, Goal, Role, ToolCall, Usage,
};
use gm_patch::{ApplyRequest, FileChangeTracker, PatchEngine};
use gm_storage::{Store, StoreError};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Runtime loop configuration.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Step budget; exceeding it is a distinct error, not completion.
    pub max_steps: u32,
    /// Checkpoint every N steps.
    pub checkpoint_interval: u32,
    /// Bound on building one decision.
    pub decision_timeout: Duration,
    /// Bound on dispatching one command (LLM call or tool handler).
    pub dispatch_timeout: Duration,
    /// Model requested in `CallLlm` commands.
    pub model: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            max_steps: 50,
            checkpoint_interval: 5,
            decision_timeout: Duration::from_secs(30),
            dispatch_timeout: Duration::from_secs(120),
            model: "gm-default".to_string(),
        }
    }
}

/// Runtime dependencies.
pub struct RuntimeDeps<C: Clock> {
    pub store: Arc<Store>,
    pub gateway: Gateway,
    pub executor: Executor<C>,
    pub registry: Arc<ToolRegistry>,
    pub patcher: Option<Arc<PatchEngine>>,
}

/// How a run loop ended (when it did not fail).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// No schedulable goal remained.
    Completed,
    /// The cancel token fired.
    Cancelled,
}

/// Per-session orchestrator.
pub struct Runtime<C: Clock> {
    config: RuntimeConfig,
    store: Arc<Store>,
    gateway: Gateway,
    executor: Executor<C>,
    registry: Arc<ToolRegistry>,
    patcher: Option<Arc<PatchEngine>>,
    clock: C,
    state: Mutex<AgentState>,
    pending: Mutex<VecDeque<Command>>,
    tracker: Mutex<Option<Arc<FileChangeTracker>>>,
    last_event_id: Mutex<String>,
}

impl<C: Clock> Runtime<C> {
    /// Create a runtime, recovering the latest snapshot when one exists.
    pub fn new(deps: RuntimeDeps<C>, clock: C, config: RuntimeConfig) -> Self {
        let state = match deps.store.load_latest_state() {
            Ok(state) => {
                info!(version = state.version, "recovered state from snapshot");
                state
            }
            Err(StoreError::NotFound(_)) => AgentState::new(clock.now()),
            Err(e) => {
                warn!(error = %e, "failed to load snapshot, starting fresh");
                AgentState::new(clock.now())
            }
        };

        Self {
            config,
            store: deps.store,
            gateway: deps.gateway,
            executor: deps.executor,
            registry: deps.registry,
            patcher: deps.patcher,
            clock,
            state: Mutex::new(state),
            pending: Mutex::new(VecDeque::new()),
            tracker: Mutex::new(None),
            last_event_id: Mutex::new(String::new()),
        }
    }

    /// Install the tracker whose changes get attached to checkpoints.
    pub fn set_file_change_tracker(&self, tracker: Arc<FileChangeTracker>) {
        *self.tracker.lock() = Some(tracker);
    }

    /// Deep clone of the current state.
    pub fn get_state(&self) -> AgentState {
        self.state.lock().clone()
    }

    /// Replace the in-memory and persisted state (conversation rewind).
    pub fn restore_state(&self, state: AgentState) -> Result<(), RuntimeError> {
        let mut guard = self.state.lock();
        self.store.save_state(&state)?;
        *guard = state;
        Ok(())
    }

    /// Persist and apply one externally-produced event.
    ///
    /// The write lock is held across persist + apply + snapshot so readers
    /// never observe state ahead of the log.
    pub fn ingest(&self, event: Event) -> Result<(), RuntimeError> {
        let mut state = self.state.lock();
        self.store.append_event(&event)?;

        let (next, commands) = reduce_guarded(&state, &event)?;
        *state = next;
        if !commands.is_empty() {
            self.pending.lock().extend(commands);
        }
        *self.last_event_id.lock() = event.id.to_string();

        self.store.save_state(&state)?;
        debug!(event = event.name(), version = state.version, "ingested event");
        Ok(())
    }

    /// Drive the loop until no work remains, the budget runs out, or the
    /// token cancels. The final checkpoint is attempted on every exit path.
    pub async fn run(&self, cancel: CancellationToken) -> Result<RunOutcome, RuntimeError> {
        let result = self.run_inner(&cancel).await;
        if result.is_err() {
            // Fatal exits still try to leave a checkpoint behind.
            if let Err(e) = self.checkpoint() {
                warn!(error = %e, "failed to write final checkpoint after error");
            }
        }
        result
    }

    async fn run_inner(&self, cancel: &CancellationToken) -> Result<RunOutcome, RuntimeError> {
        let mut step: u32 = 0;

        loop {
            if cancel.is_cancelled() {
                // Graceful shutdown: the checkpoint path does not observe
                // the cancel token, so shutdown writes always complete.
                self.checkpoint()?;
                info!(step, "run cancelled");
                return Ok(RunOutcome::Cancelled);
            }

            if step >= self.config.max_steps {
                return Err(RuntimeError::MaxStepsExceeded(self.config.max_steps));
            }

            // Drain commands the reducer produced on a previous step.
            let drained: Vec<Command> = {
                let mut pending = self.pending.lock();
                pending.drain(..).collect()
            };
            if !drained.is_empty() {
                for command in drained {
                    let events = self.dispatch(command, cancel).await;
                    self.apply_events(&events)?;
                }
                self.maybe_checkpoint(step)?;
                step += 1;
                continue;
            }

            // Select the oldest schedulable goal.
            let goal = self.state.lock().active_goal().cloned();
            let Some(goal) = goal else {
                self.checkpoint()?;
                info!(step, "no pending goals, run complete");
                return Ok(RunOutcome::Completed);
            };

            // Decide.
            let decision =
                tokio::time::timeout(self.config.decision_timeout, self.decide(&goal)).await;
            let command = match decision {
                Ok(command) => command,
                Err(_) => {
                    let event = self.error_event("", "decision timed out");
                    self.apply_events(&[event])?;
                    step += 1;
                    continue;
                }
            };

            // Dispatch and observe.
            let events = self.dispatch(command, cancel).await;
            self.apply_events(&events)?;

            self.maybe_checkpoint(step)?;
            step += 1;
        }
    }

    /// Build the `CallLlm` command for the active goal.
    async fn decide(&self, goal: &Goal) -> Command {
        let state = self.state.lock();

        let system_prompt = if state.system_prompt.is_empty() {
            format!(
                "You are an autonomous agent working towards a goal. Current goal: {}. Use the \
                 available tools; call task_complete when the goal is done.",
                goal.description
            )
        } else {
            state.system_prompt.clone()
        };

        let mut messages = Vec::with_capacity(state.context.messages.len() + 1);
        messages.push(ContextMessage {
            id: "msg_system".to_string(),
            role: Role::System,
            content: system_prompt,
            tool_calls: Vec::new(),
            tool_call_id: None,
            tool_name: None,
            token_count: 0,
            timestamp: state.updated_at,
        });
        messages.extend(state.context.messages.iter().cloned());

        Command::new(CommandKind::CallLlm {
            model: self.config.model.clone(),
            messages,
            tools: self.registry.descriptors(),
        })
    }

    /// Execute one command, persist its events as one batch, and return
    /// the events to apply. Per-command failures become recoverable
    /// `runtime:error` events; only store failures are fatal (surfaced by
    /// `apply_events`).
    async fn dispatch(&self, command: Command, cancel: &CancellationToken) -> Vec<Event> {
        debug!(
            command = command.name(),
            fields = ?command.fields(),
            "dispatching",
        );

        let command_id = command.id.to_string();
        match command.kind {
            CommandKind::CallLlm {
                model,
                messages,
                tools,
            } => {
                let outcome = tokio::time::timeout(
                    self.config.dispatch_timeout,
                    self.dispatch_llm(&model, messages, tools),
                )
                .await;
                match outcome {
                    Ok(Ok(event)) => vec![event],
                    Ok(Err(e)) => {
                        error!(error = %e, "LLM call failed");
                        vec![self.error_event(&command_id, &format!("LLM call failed: {e}"))]
                    }
                    Err(_) => {
                        vec![self.error_event(&command_id, "LLM call timed out")]
                    }
                }
            }

            CommandKind::CallTool {
                tool_call_id,
                tool_name,
                arguments,
            } => {
                let invocation = ToolInvocation {
                    tool_call_id,
                    tool_name,
                    arguments,
                };
                let mode = self.state.lock().mode;
                // The executor bounds the handler itself; the permission
                // rendezvous has its own, longer timeout.
                vec![self.executor.execute(mode, &invocation, cancel).await]
            }

            CommandKind::ApplyPatch {
                file_path,
                diff,
                dry_run,
            } => match &self.patcher {
                Some(patcher) => {
                    let request = ApplyRequest {
                        file_path,
                        diff,
                        dry_run,
                    };
                    match patcher.apply(&request) {
                        Ok(result) if result.success => Vec::new(),
                        Ok(result) => vec![self.error_event(
                            &command_id,
                            &format!(
                                "patch failed: {}",
                                result.error.as_deref().unwrap_or("unknown")
                            ),
                        )],
                        Err(e) => {
                            vec![self.error_event(&command_id, &format!("patch error: {e}"))]
                        }
                    }
                }
                None => vec![self.error_event(&command_id, "no patch engine configured")],
            },

            CommandKind::SaveCheckpoint => match self.checkpoint() {
                Ok(()) => Vec::new(),
                Err(e) => vec![self.error_event(&command_id, &format!("checkpoint failed: {e}"))],
            },

            CommandKind::RestoreBackup { patch_id } => match &self.patcher {
                Some(patcher) => match patcher.rollback(&patch_id) {
                    Ok(()) => Vec::new(),
                    Err(e) => {
                        vec![self.error_event(&command_id, &format!("rollback failed: {e}"))]
                    }
                },
                None => vec![self.error_event(&command_id, "no patch engine configured")],
            },
        }
    }

    /// Streaming LLM dispatch: emit a live `llm:token` event per content
    /// delta, then return the terminal `llm:response`. Falls back to the
    /// synchronous call when streaming fails.
    async fn dispatch_llm(
        &self,
        model: &str,
        messages: Vec<ContextMessage>,
        tools: Vec<gm_core::command::ToolDescriptor>,
    ) -> Result<Event, gm_provider::ProviderError> {
        match self
            .gateway
            .call_stream(model, messages.clone(), tools.clone())
            .await
        {
            Ok(mut stream) => {
                let mut content = String::new();
                let mut tool_calls: Vec<ToolCall> = Vec::new();
                let mut stream_error = None;

                while let Some(chunk) = stream.next().await {
                    match chunk {
                        Ok(chunk) => {
                            if let Some(delta) = chunk.content {
                                if !delta.is_empty() {
                                    content.push_str(&delta);
                                    let token = Event::new(
                                        Actor::Llm,
                                        "",
                                        EventPayload::LlmToken { delta },
                                        &self.clock,
                                    );
                                    // Persisted immediately so the event
                                    // stream surfaces it live.
                                    if let Err(e) = self.store.append_event(&token) {
                                        warn!(error = %e, "failed to persist token event");
                                    }
                                }
                            }
                            tool_calls.extend(chunk.tool_calls);
                        }
                        Err(e) => {
                            stream_error = Some(e);
                            break;
                        }
                    }
                }

                if let Some(e) = stream_error {
                    warn!(error = %e, "stream broke mid-response, falling back to sync call");
                    return self.sync_llm(model, messages, tools).await;
                }

                Ok(self.response_event(model, content, tool_calls, Usage::default()))
            }
            Err(e) => {
                debug!(error = %e, "streaming unavailable, using sync call");
                self.sync_llm(model, messages, tools).await
            }
        }
    }

    async fn sync_llm(
        &self,
        model: &str,
        messages: Vec<ContextMessage>,
        tools: Vec<gm_core::command::ToolDescriptor>,
    ) -> Result<Event, gm_provider::ProviderError> {
        let response = self.gateway.call(model, messages, tools).await?;
        Ok(self.response_event(
            &response.model,
            response.content,
            response.tool_calls,
            response.usage,
        ))
    }

    fn response_event(
        &self,
        model: &str,
        content: String,
        tool_calls: Vec<ToolCall>,
        usage: Usage,
    ) -> Event {
        Event::new(
            Actor::Llm,
            "",
            EventPayload::LlmResponse {
                model: model.to_string(),
                content,
                tool_calls,
                usage,
            },
            &self.clock,
        )
    }

    fn error_event(&self, command_id: &str, message: &str) -> Event {
        Event::new(
            Actor::Runtime,
            command_id,
            EventPayload::Error {
                command_id: command_id.to_string(),
                error: message.to_string(),
                severity: ErrorSeverity::Recoverable,
            },
            &self.clock,
        )
    }

    /// Persist a batch of events atomically, then apply each through the
    /// reducer under the write lock.
    fn apply_events(&self, events: &[Event]) -> Result<(), RuntimeError> {
        if events.is_empty() {
            return Ok(());
        }

        let mut state = self.state.lock();
        self.store.append_events(events)?;

        for event in events {
            let (next, commands) = reduce_guarded(&state, event)?;
            *state = next;
            if !commands.is_empty() {
                self.pending.lock().extend(commands);
            }
            *self.last_event_id.lock() = event.id.to_string();
        }

        self.store.save_state(&state)?;
        Ok(())
    }

    fn maybe_checkpoint(&self, step: u32) -> Result<(), RuntimeError> {
        if step % self.config.checkpoint_interval == 0 {
            self.checkpoint()?;
        }
        Ok(())
    }

    /// Write the latest state and a checkpoint carrying the file changes
    /// recorded since the previous one.
    pub fn checkpoint(&self) -> Result<(), RuntimeError> {
        let state = self.state.lock().clone();
        self.store.save_state(&state)?;

        let file_changes = self
            .tracker
            .lock()
            .as_ref()
            .map(|t| t.flush())
            .unwrap_or_default();

        let checkpoint = Checkpoint {
            id: CheckpointId::generate(),
            state_version: state.version,
            last_event_id: self.last_event_id.lock().clone(),
            timestamp: self.clock.now(),
            state,
            file_changes,
        };
        self.store.save_checkpoint(&checkpoint)?;

        // Surface the checkpoint to clients; not applied through the
        // reducer.
        let event = Event::new(
            Actor::Runtime,
            checkpoint.id.as_str(),
            EventPayload::Checkpoint {
                checkpoint_id: checkpoint.id.clone(),
                state_version: checkpoint.state_version,
            },
            &self.clock,
        );
        if let Err(e) = self.store.append_event(&event) {
            warn!(error = %e, "failed to record checkpoint event");
        }

        debug!(
            checkpoint = %checkpoint.id,
            version = checkpoint.state_version,
            changes = checkpoint.file_changes.len(),
            "checkpoint saved",
        );
        Ok(())
    }
}

#[cfg(test)]
#[path = "runtime_tests.rs"]
mod tests;
