// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Commands represent side effects the runtime needs to perform
//!
//! The reducer returns commands; the dispatcher consumes them. Unlike
//! events, commands are ephemeral: they are never persisted and are lost
//! on crash (the events that produced them are replayed instead).

use crate::define_id;
use crate::message::ContextMessage;
use crate::PatchId;
use serde::{Deserialize, Serialize};
use serde_json::Value;

define_id! {
    /// Unique identifier for a command.
    pub struct CommandId, "cmd";
}

/// Tool descriptor carried in a `CallLlm` command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// An ephemeral intent produced by the reducer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Command {
    pub id: CommandId,
    #[serde(flatten)]
    pub kind: CommandKind,
}

/// Command variants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CommandKind {
    /// Ask the model for the next decision.
    CallLlm {
        model: String,
        messages: Vec<ContextMessage>,
        tools: Vec<ToolDescriptor>,
    },

    /// Execute one tool call requested by the model.
    CallTool {
        tool_call_id: String,
        tool_name: String,
        arguments: Value,
    },

    /// Apply a unified diff to a workspace file.
    ApplyPatch {
        file_path: String,
        diff: String,
        #[serde(default, skip_serializing_if = "std::ops::Not::not")]
        dry_run: bool,
    },

    /// Persist a checkpoint of the current state.
    SaveCheckpoint,

    /// Restore a file from the backup taken for a patch.
    RestoreBackup { patch_id: PatchId },
}

impl Command {
    pub fn new(kind: CommandKind) -> Self {
        Self {
            id: CommandId::generate(),
            kind,
        }
    }

    /// Command name for log spans (e.g., "call_llm", "call_tool")
    pub fn name(&self) -> &'static str {
        match &self.kind {
            CommandKind::CallLlm { .. } => "call_llm",
            CommandKind::CallTool { .. } => "call_tool",
            CommandKind::ApplyPatch { .. } => "apply_patch",
            CommandKind::SaveCheckpoint => "save_checkpoint",
            CommandKind::RestoreBackup { .. } => "restore_backup",
        }
    }

    /// Key-value pairs for structured logging
    pub fn fields(&self) -> Vec<(&'static str, String)> {
        match &self.kind {
            CommandKind::CallLlm {
                model,
                messages,
                tools,
            } => vec![
                ("model", model.clone()),
                ("messages", messages.len().to_string()),
                ("tools", tools.len().to_string()),
            ],
            CommandKind::CallTool {
                tool_call_id,
                tool_name,
                ..
            } => vec![
                ("tool_call_id", tool_call_id.clone()),
                ("tool_name", tool_name.clone()),
            ],
            CommandKind::ApplyPatch {
                file_path, dry_run, ..
            } => vec![
                ("file_path", file_path.clone()),
                ("dry_run", dry_run.to_string()),
            ],
            CommandKind::SaveCheckpoint => vec![],
            CommandKind::RestoreBackup { patch_id } => {
                vec![("patch_id", patch_id.to_string())]
            }
        }
    }
}

#[cfg(test)]
#[path = "command_tests.rs"]
mod tests;
