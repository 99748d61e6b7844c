// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tool catalog and handler capability
//!
//! The registry is populated once at startup and read-only afterwards.
//! Handlers are pure value-in/value-out: they never touch session state;
//! the reducer integrates their results.

use async_trait::async_trait;
use gm_core::command::ToolDescriptor;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

/// Errors from registry operations
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("tool already registered: {0}")]
    Duplicate(String),
}

/// Coarse capability class used by the policy's category gates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolCategory {
    #[default]
    General,
    Filesystem,
    Internet,
}

/// Catalog entry for one tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tool {
    pub name: String,
    pub description: String,
    /// JSON schema of the arguments object.
    pub parameters: Value,
    #[serde(default)]
    pub category: ToolCategory,
    /// Read-only tools stay usable in planning mode.
    #[serde(default)]
    pub read_only: bool,
}

/// Result of one handler invocation.
#[derive(Debug, Clone, Default)]
pub struct HandlerOutcome {
    pub output: String,
    pub error: Option<String>,
}

impl HandlerOutcome {
    pub fn ok(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            output: String::new(),
            error: Some(message.into()),
        }
    }
}

/// Capability implementing a tool.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    async fn call(&self, arguments: &Value) -> HandlerOutcome;
}

struct Registered {
    tool: Tool,
    handler: Arc<dyn ToolHandler>,
}

/// Concurrency-safe tool catalog.
#[derive(Default)]
pub struct ToolRegistry {
    tools: RwLock<HashMap<String, Registered>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry pre-populated with the built-in `task_complete` tool.
    pub fn with_builtins() -> Self {
        let registry = Self::new();
        // The loop's goal-completion signal; the reducer special-cases its
        // result.
        let registered = registry.register(
            Tool {
                name: "task_complete".to_string(),
                description: "Signal that the current goal is complete. Call this when the task \
                              is done."
                    .to_string(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "summary": {
                            "type": "string",
                            "description": "Short summary of what was accomplished"
                        }
                    }
                }),
                category: ToolCategory::General,
                read_only: true,
            },
            Arc::new(TaskCompleteHandler),
        );
        debug_assert!(registered.is_ok());
        registry
    }

    /// Register a tool; duplicate names fail.
    pub fn register(
        &self,
        tool: Tool,
        handler: Arc<dyn ToolHandler>,
    ) -> Result<(), RegistryError> {
        let mut tools = self.tools.write();
        if tools.contains_key(&tool.name) {
            return Err(RegistryError::Duplicate(tool.name.clone()));
        }
        tools.insert(tool.name.clone(), Registered { tool, handler });
        Ok(())
    }

    /// Look up a tool and its handler.
    pub fn get(&self, name: &str) -> Option<(Tool, Arc<dyn ToolHandler>)> {
        let tools = self.tools.read();
        tools
            .get(name)
            .map(|r| (r.tool.clone(), Arc::clone(&r.handler)))
    }

    /// All tools, sorted by name.
    pub fn list(&self) -> Vec<Tool> {
        let tools = self.tools.read();
        let mut all: Vec<Tool> = tools.values().map(|r| r.tool.clone()).collect();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        all
    }

    /// The catalog as `CallLlm` descriptors.
    pub fn descriptors(&self) -> Vec<ToolDescriptor> {
        self.list()
            .into_iter()
            .map(|t| ToolDescriptor {
                name: t.name,
                description: t.description,
                parameters: t.parameters,
            })
            .collect()
    }
}

/// Built-in handler for `task_complete`.
struct TaskCompleteHandler;

#[async_trait]
impl ToolHandler for TaskCompleteHandler {
    async fn call(&self, arguments: &Value) -> HandlerOutcome {
        let summary = arguments
            .get("summary")
            .and_then(Value::as_str)
            .unwrap_or("task complete");
        HandlerOutcome::ok(summary)
    }
}

#[cfg(test)]
#[path = "tools_tests.rs"]
mod tests;
