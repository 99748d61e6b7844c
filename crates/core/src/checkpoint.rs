// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Checkpoints: state snapshots plus the file changes since the previous one
//!
//! A checkpoint is the unit of time travel. Conversation rewind restores
//! `state`; code rewind replays `file_changes` in reverse through the patch
//! engine's rollback.

use crate::define_id;
use crate::state::AgentState;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

define_id! {
    /// Unique identifier for a checkpoint.
    pub struct CheckpointId, "ckpt";
}

define_id! {
    /// Unique identifier tying an applied diff to its backup.
    pub struct PatchId, "pch";
}

/// Kind of filesystem change a patch made.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileOperation {
    Create,
    Modify,
    Delete,
}

/// One recorded file mutation, reversible via its backup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileChange {
    pub patch_id: PatchId,
    pub file_path: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub backup_path: String,
    pub operation: FileOperation,
}

/// A snapshot of state plus the file changes since the previous checkpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub id: CheckpointId,
    pub state_version: u64,
    /// Last event applied before this checkpoint was taken.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub last_event_id: String,
    pub timestamp: DateTime<Utc>,
    pub state: AgentState,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub file_changes: Vec<FileChange>,
}
