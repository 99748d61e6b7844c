// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The reducer: pure state transitions
//!
//! `reduce(state, event)` clones the input, applies one event, and returns
//! the next state plus any side-effect commands. The input state is never
//! mutated, and every ID the reducer mints is derived from the event ID so
//! replaying the same log always produces the same state.
//!
//! `llm:token`, `checkpoint:saved`, `permission:*`, and unknown events are
//! surfaced to clients through the log but pass through the reducer without
//! a version bump; applying a full log therefore reproduces exactly the
//! state of the run that wrote it.

use gm_core::{
    estimate_tokens, Artifact, ArtifactId, Command, CommandKind, ContextMessage, Event,
    EventPayload, Goal, GoalId, GoalStatus, GoalType, Role, ToolCall,
};
use serde_json::Value;
use std::panic::{catch_unwind, AssertUnwindSafe};
use thiserror::Error;
use tracing::warn;

use gm_core::AgentState;

/// Default per-goal step allowance.
const DEFAULT_GOAL_MAX_STEPS: u32 = 50;

/// Errors surfaced by the guarded reducer entry point
#[derive(Debug, Error)]
pub enum ReducerError {
    #[error("reducer panicked applying {event}: {message}")]
    Panic { event: String, message: String },
}

/// Apply one event, capturing any panic as a fatal error.
///
/// The reducer itself must not panic; this guard turns a bug into a
/// reportable failure instead of poisoning the session task.
pub fn reduce_guarded(
    state: &AgentState,
    event: &Event,
) -> Result<(AgentState, Vec<Command>), ReducerError> {
    catch_unwind(AssertUnwindSafe(|| reduce(state, event))).map_err(|payload| {
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| (*s).to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string());
        ReducerError::Panic {
            event: event.name().to_string(),
            message,
        }
    })
}

/// Pure transition: `(state, event) -> (state', commands)`.
pub fn reduce(state: &AgentState, event: &Event) -> (AgentState, Vec<Command>) {
    // Pass-through events: surfaced to clients, no state transition.
    if matches!(
        event.payload,
        EventPayload::LlmToken { .. }
            | EventPayload::Checkpoint { .. }
            | EventPayload::PermissionRequest { .. }
            | EventPayload::PermissionResponse { .. }
            | EventPayload::Unknown
    ) {
        return (state.clone(), Vec::new());
    }

    let mut next = state.clone();
    next.version += 1;
    next.updated_at = event.timestamp;
    let mut commands = Vec::new();

    match &event.payload {
        EventPayload::SystemPrompt { prompt } => {
            next.system_prompt = prompt.clone();
        }

        EventPayload::UserMessage {
            content, priority, ..
        } => {
            let token_count = estimate_tokens(content);
            next.push_message(ContextMessage {
                id: gm_core::id::derive("msg", event.id.as_str()),
                role: Role::User,
                content: content.clone(),
                tool_calls: Vec::new(),
                tool_call_id: None,
                tool_name: None,
                token_count,
                timestamp: event.timestamp,
            });

            if next.active_goal().is_none() {
                next.goals.push(Goal {
                    id: GoalId::derived_from(event.id.as_str()),
                    goal_type: GoalType::UserRequest,
                    description: content.clone(),
                    priority: *priority,
                    status: GoalStatus::Pending,
                    source_event_id: event.id.to_string(),
                    deadline: None,
                    max_steps: DEFAULT_GOAL_MAX_STEPS,
                    steps_used: 0,
                    created_at: event.timestamp,
                    updated_at: event.timestamp,
                });
            }
        }

        EventPayload::LlmResponse {
            content,
            tool_calls,
            ..
        } => {
            // Some providers reject empty assistant content on replay, so
            // store a single space instead.
            let stored = if content.is_empty() {
                " ".to_string()
            } else {
                content.clone()
            };
            let token_count = estimate_tokens(&stored);
            next.push_message(ContextMessage {
                id: gm_core::id::derive("msg", event.id.as_str()),
                role: Role::Assistant,
                content: stored,
                tool_calls: tool_calls.clone(),
                tool_call_id: None,
                tool_name: None,
                token_count,
                timestamp: event.timestamp,
            });

            for call in tool_calls {
                commands.push(Command::new(CommandKind::CallTool {
                    tool_call_id: call.id.clone(),
                    tool_name: call.name.clone(),
                    arguments: parse_arguments(call),
                }));
            }

            if tool_calls.is_empty() && !content.is_empty() {
                complete_active_goal(&mut next, event);
            }
        }

        EventPayload::ToolResult {
            tool_call_id,
            tool_name,
            success,
            output,
            error,
            ..
        } => {
            let content = if *success {
                output.clone()
            } else {
                format!("Error: {}", error.as_deref().unwrap_or("tool failed"))
            };
            let token_count = estimate_tokens(&content);
            next.push_message(ContextMessage {
                id: gm_core::id::derive("msg", event.id.as_str()),
                role: Role::Tool,
                content,
                tool_calls: Vec::new(),
                tool_call_id: Some(tool_call_id.clone()),
                tool_name: Some(tool_name.clone()),
                token_count,
                timestamp: event.timestamp,
            });

            if tool_name == "task_complete" && *success {
                complete_active_goal(&mut next, event);
            }

            if tool_name == "create_file" && *success {
                register_file_artifact(&mut next, event, tool_call_id);
            }
        }

        EventPayload::Error { .. } => {
            // Version bump only; the dispatcher already recorded the error
            // and decides whether the loop continues.
        }

        // Handled by the pass-through match above.
        EventPayload::LlmToken { .. }
        | EventPayload::Checkpoint { .. }
        | EventPayload::PermissionRequest { .. }
        | EventPayload::PermissionResponse { .. }
        | EventPayload::Unknown => {}
    }

    (next, commands)
}

/// Parse tool-call arguments, degrading to an empty object on bad JSON.
fn parse_arguments(call: &ToolCall) -> Value {
    if call.arguments.trim().is_empty() {
        return Value::Object(Default::default());
    }
    match serde_json::from_str(&call.arguments) {
        Ok(value) => value,
        Err(e) => {
            warn!(
                tool = %call.name,
                call_id = %call.id,
                error = %e,
                "unparseable tool-call arguments, defaulting to empty object",
            );
            Value::Object(Default::default())
        }
    }
}

fn complete_active_goal(state: &mut AgentState, event: &Event) {
    if let Some(goal) = state.active_goal_mut() {
        goal.status = GoalStatus::Completed;
        goal.updated_at = event.timestamp;
    }
}

/// Register a file artifact for a successful `create_file` call.
///
/// The path comes from the assistant tool call that requested the write,
/// which is still in context because compaction is not in play here.
fn register_file_artifact(state: &mut AgentState, event: &Event, tool_call_id: &str) {
    let Some(arguments) = state.context.messages.iter().rev().find_map(|m| {
        if m.role != Role::Assistant {
            return None;
        }
        m.tool_calls
            .iter()
            .find(|c| c.id == tool_call_id)
            .map(|c| c.arguments.clone())
    }) else {
        warn!(tool_call_id, "create_file result without a matching tool call");
        return;
    };

    let parsed: Value = match serde_json::from_str(&arguments) {
        Ok(value) => value,
        Err(_) => return,
    };
    let Some(path) = parsed.get("path").and_then(Value::as_str) else {
        warn!(tool_call_id, "create_file arguments missing path");
        return;
    };

    let name = std::path::Path::new(path)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string());
    let size = parsed
        .get("content")
        .and_then(Value::as_str)
        .map(|c| c.len() as u64)
        .unwrap_or_default();

    let goal_id = state.active_goal().map(|g| g.id.clone());
    let id = ArtifactId::derived_from(event.id.as_str());
    let artifact = Artifact {
        id: id.clone(),
        artifact_type: "file".to_string(),
        name,
        path: Some(path.to_string()),
        content: None,
        metadata: Default::default(),
        size,
        task_id: None,
        goal_id,
        created_at: event.timestamp,
    };
    state.artifacts.insert(id, artifact);
}

#[cfg(test)]
#[path = "reducer_tests.rs"]
mod tests;
