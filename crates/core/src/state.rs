// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Reducible session state
//!
//! [`AgentState`] is derived from the event log: the reducer applies one
//! event at a time and bumps `version`. Everything here is owned data, so
//! `Clone` is the deep clone the reducer contract requires.

use crate::define_id;
use crate::message::ContextMessage;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

define_id! {
    /// Unique identifier for a goal.
    pub struct GoalId, "gol";
}

define_id! {
    /// Unique identifier for a task (execution unit under a goal).
    pub struct TaskId, "tsk";
}

define_id! {
    /// Unique identifier for an artifact.
    pub struct ArtifactId, "art";
}

/// Agent operating mode.
///
/// `Planning` restricts the policy to read-only tools; `Executing` is the
/// normal mode. Mode transitions are reserved for the planning scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    Planning,
    #[default]
    Executing,
}

/// Where a goal came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GoalType {
    UserRequest,
    SubTask,
    Recovery,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GoalStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
    Cancelled,
}

impl GoalStatus {
    /// True for pending or in-progress goals.
    pub fn is_schedulable(self) -> bool {
        matches!(self, GoalStatus::Pending | GoalStatus::InProgress)
    }
}

/// A unit of intent the loop works towards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Goal {
    pub id: GoalId,
    pub goal_type: GoalType,
    pub description: String,
    pub priority: i32,
    pub status: GoalStatus,
    /// Event that created this goal.
    pub source_event_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deadline: Option<DateTime<Utc>>,
    pub max_steps: u32,
    pub steps_used: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Task status (reserved for the sub-task scheduler).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

/// Execution-unit granularity under a goal.
///
/// Carried in the data model for the future sub-task scheduler; the MVP
/// loop does not create tasks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub goal_id: GoalId,
    pub description: String,
    pub status: TaskStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Output produced during a session (files, reports, data).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artifact {
    pub id: ArtifactId,
    pub artifact_type: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, Value>,
    #[serde(default)]
    pub size: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<TaskId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub goal_id: Option<GoalId>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LockType {
    Read,
    Write,
}

/// Logical lock on a workspace resource (reserved for the sub-task
/// scheduler; not used by the MVP loop).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceLock {
    pub owner: String,
    pub lock_type: LockType,
    pub acquired_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

/// Conversation context with token budgeting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Context {
    pub messages: Vec<ContextMessage>,
    pub total_tokens: u32,
    pub max_tokens: u32,
    pub reserve_output: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_compaction_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub compaction_count: u32,
}

impl Default for Context {
    fn default() -> Self {
        Self {
            messages: Vec::new(),
            total_tokens: 0,
            max_tokens: 128_000,
            reserve_output: 4_096,
            last_compaction_at: None,
            compaction_count: 0,
        }
    }
}

/// The complete reducible state of one session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentState {
    /// Strictly increases by 1 per applied event.
    pub version: u64,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub system_prompt: String,
    #[serde(default)]
    pub mode: Mode,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub plan_content: String,
    pub goals: Vec<Goal>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub tasks: HashMap<TaskId, Task>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub artifacts: HashMap<ArtifactId, Artifact>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub locks: HashMap<String, ResourceLock>,
    pub context: Context,
}

impl AgentState {
    /// Fresh state at version 0.
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            version: 0,
            updated_at: now,
            system_prompt: String::new(),
            mode: Mode::default(),
            plan_content: String::new(),
            goals: Vec::new(),
            tasks: HashMap::new(),
            artifacts: HashMap::new(),
            locks: HashMap::new(),
            context: Context::default(),
        }
    }

    /// First goal that is pending or in progress, in creation order.
    pub fn active_goal(&self) -> Option<&Goal> {
        self.goals.iter().find(|g| g.status.is_schedulable())
    }

    /// Mutable variant of [`active_goal`](Self::active_goal).
    pub fn active_goal_mut(&mut self) -> Option<&mut Goal> {
        self.goals.iter_mut().find(|g| g.status.is_schedulable())
    }

    /// Append a message to the context and update the token tally.
    pub fn push_message(&mut self, message: ContextMessage) {
        self.context.total_tokens = self.context.total_tokens.saturating_add(message.token_count);
        self.context.messages.push(message);
    }
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;
