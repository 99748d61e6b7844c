// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Event types for the gm runtime
//!
//! Events are the source of truth: immutable facts appended to a session's
//! log. State is derived by replaying them through the reducer.
//!
//! On the wire each event is one JSON object carrying the common header
//! (`id`, `timestamp`, `actor`, `subject`) plus the payload fields, tagged
//! with `{"type": "domain:name", ...}`. Unknown type tags deserialize to
//! `Unknown` so old binaries can scan logs written by newer ones.

use crate::clock::Clock;
use crate::message::{ToolCall, Usage};
use crate::{define_id, CheckpointId, RequestId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

define_id! {
    /// Unique identifier for an event.
    pub struct EventId, "evt";
}

/// Who produced an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Actor {
    User,
    Llm,
    Tool,
    Runtime,
    System,
}

/// How an incoming user message relates to the conversation in progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageSemantic {
    #[default]
    Append,
    Fork,
    Preempt,
    Cancel,
}

/// Severity attached to `runtime:error` events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorSeverity {
    /// Transient failure; a retry policy may re-attempt the command.
    Retryable,
    /// Failure the agent can observe and react to.
    Recoverable,
    /// Failure that terminates the session loop.
    Fatal,
}

/// An immutable fact in a session's log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub timestamp: DateTime<Utc>,
    pub actor: Actor,
    /// Entity the event is about (goal, command, tool call), when known.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub subject: String,
    #[serde(flatten)]
    pub payload: EventPayload,
}

/// Event payload variants.
///
/// Serializes with `{"type": "domain:name", ...fields}` format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum EventPayload {
    #[serde(rename = "user:message")]
    UserMessage {
        content: String,
        #[serde(default)]
        priority: i32,
        #[serde(default)]
        semantic: MessageSemantic,
    },

    #[serde(rename = "system:prompt")]
    SystemPrompt { prompt: String },

    #[serde(rename = "llm:response")]
    LlmResponse {
        model: String,
        content: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        tool_calls: Vec<ToolCall>,
        #[serde(default)]
        usage: Usage,
    },

    /// Streaming content delta, surfaced live to clients.
    ///
    /// Token events are persisted for the event stream but never applied
    /// through the reducer; the terminal `llm:response` carries the full
    /// content.
    #[serde(rename = "llm:token")]
    LlmToken { delta: String },

    #[serde(rename = "tool:result")]
    ToolResult {
        tool_call_id: String,
        tool_name: String,
        success: bool,
        #[serde(default, skip_serializing_if = "String::is_empty")]
        output: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
        #[serde(default)]
        duration_ms: u64,
    },

    #[serde(rename = "runtime:error")]
    Error {
        #[serde(default, skip_serializing_if = "String::is_empty")]
        command_id: String,
        error: String,
        severity: ErrorSeverity,
    },

    #[serde(rename = "permission:request")]
    PermissionRequest {
        request_id: RequestId,
        tool_name: String,
        permission: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        patterns: Vec<String>,
        #[serde(default, skip_serializing_if = "HashMap::is_empty")]
        metadata: HashMap<String, Value>,
    },

    #[serde(rename = "permission:response")]
    PermissionResponse {
        request_id: RequestId,
        approved: bool,
        #[serde(default, skip_serializing_if = "std::ops::Not::not")]
        always: bool,
    },

    #[serde(rename = "checkpoint:saved")]
    Checkpoint {
        checkpoint_id: CheckpointId,
        state_version: u64,
    },

    /// Catch-all for unknown event types (forward compatibility)
    #[serde(other, skip_serializing)]
    Unknown,
}

impl Event {
    /// Build an event with a fresh ID and the clock's current time.
    pub fn new(actor: Actor, subject: impl Into<String>, payload: EventPayload, clock: &impl Clock) -> Self {
        Self {
            id: EventId::generate(),
            timestamp: clock.now(),
            actor,
            subject: subject.into(),
            payload,
        }
    }

    pub fn user_message(
        content: impl Into<String>,
        priority: i32,
        semantic: MessageSemantic,
        clock: &impl Clock,
    ) -> Self {
        Self::new(
            Actor::User,
            "",
            EventPayload::UserMessage {
                content: content.into(),
                priority,
                semantic,
            },
            clock,
        )
    }

    pub fn system_prompt(prompt: impl Into<String>, clock: &impl Clock) -> Self {
        Self::new(
            Actor::System,
            "",
            EventPayload::SystemPrompt {
                prompt: prompt.into(),
            },
            clock,
        )
    }

    pub fn name(&self) -> &'static str {
        self.payload.name()
    }

    /// One-line summary for log output.
    pub fn log_summary(&self) -> String {
        let t = self.name();
        match &self.payload {
            EventPayload::UserMessage {
                content, priority, ..
            } => format!("{t} priority={priority} len={}", content.len()),
            EventPayload::SystemPrompt { prompt } => format!("{t} len={}", prompt.len()),
            EventPayload::LlmResponse {
                model, tool_calls, ..
            } => format!("{t} model={model} tool_calls={}", tool_calls.len()),
            EventPayload::LlmToken { delta } => format!("{t} len={}", delta.len()),
            EventPayload::ToolResult {
                tool_name, success, ..
            } => format!("{t} tool={tool_name} success={success}"),
            EventPayload::Error {
                severity, error, ..
            } => format!("{t} severity={severity:?} error={error}"),
            EventPayload::PermissionRequest {
                request_id,
                tool_name,
                ..
            } => format!("{t} request={request_id} tool={tool_name}"),
            EventPayload::PermissionResponse {
                request_id,
                approved,
                always,
            } => format!("{t} request={request_id} approved={approved} always={always}"),
            EventPayload::Checkpoint {
                checkpoint_id,
                state_version,
            } => format!("{t} id={checkpoint_id} version={state_version}"),
            EventPayload::Unknown => t.to_string(),
        }
    }
}

impl EventPayload {
    pub fn name(&self) -> &'static str {
        match self {
            EventPayload::UserMessage { .. } => "user:message",
            EventPayload::SystemPrompt { .. } => "system:prompt",
            EventPayload::LlmResponse { .. } => "llm:response",
            EventPayload::LlmToken { .. } => "llm:token",
            EventPayload::ToolResult { .. } => "tool:result",
            EventPayload::Error { .. } => "runtime:error",
            EventPayload::PermissionRequest { .. } => "permission:request",
            EventPayload::PermissionResponse { .. } => "permission:response",
            EventPayload::Checkpoint { .. } => "checkpoint:saved",
            EventPayload::Unknown => "unknown",
        }
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
