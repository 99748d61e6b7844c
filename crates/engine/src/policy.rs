// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tool-call policy
//!
//! One decision per call, computed in a fixed precedence order: mode gate,
//! whitelist, category gates, persistent rules, then the auto-approve
//! default.

use crate::tools::{Tool, ToolCategory};
use gm_core::{Mode, PermissionAction, PermissionRule};
use serde::{Deserialize, Serialize};

/// Security-relevant configuration shared by policy and executor.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SecurityConfig {
    /// Skip the permission prompt and allow anything the gates pass.
    #[serde(default)]
    pub auto_approve: bool,
    /// When non-empty, only these tools may run at all.
    #[serde(default)]
    pub allowed_tools: Vec<String>,
    /// Permit tools in the `filesystem` category.
    #[serde(default)]
    pub allow_fs: bool,
    /// Permit tools in the `internet` category.
    #[serde(default)]
    pub allow_net: bool,
}

/// Outcome of a policy check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicyDecision {
    Allow,
    Deny(String),
    /// Requires a human decision through the permission rendezvous.
    Confirm,
}

/// Stateless policy over the security configuration.
#[derive(Debug, Clone, Default)]
pub struct Policy {
    config: SecurityConfig,
}

impl Policy {
    pub fn new(config: SecurityConfig) -> Self {
        Self { config }
    }

    /// Decide what to do with one tool call.
    ///
    /// `normalized_args` is the canonical-JSON form of the call's
    /// arguments; persistent rules match on it exactly.
    pub fn check(
        &self,
        mode: Mode,
        tool: &Tool,
        normalized_args: &str,
        rules: &[PermissionRule],
    ) -> PolicyDecision {
        // 1. Mode gate: planning mode only runs read-only tools.
        if mode == Mode::Planning && !tool.read_only {
            return PolicyDecision::Deny(format!(
                "tool {} is not read-only and the agent is in planning mode",
                tool.name
            ));
        }

        // 2. Whitelist.
        if !self.config.allowed_tools.is_empty()
            && !self.config.allowed_tools.iter().any(|t| t == &tool.name)
        {
            return PolicyDecision::Deny(format!("tool {} is not in allowed_tools", tool.name));
        }

        // 3. Category gates.
        match tool.category {
            ToolCategory::Filesystem if !self.config.allow_fs => {
                return PolicyDecision::Deny("filesystem tools are disabled".to_string());
            }
            ToolCategory::Internet if !self.config.allow_net => {
                return PolicyDecision::Deny("internet tools are disabled".to_string());
            }
            _ => {}
        }

        // 4. Persistent rule match.
        for rule in rules {
            if rule.tool_name == tool.name && rule.pattern == normalized_args {
                return match rule.action {
                    PermissionAction::Allow => PolicyDecision::Allow,
                    PermissionAction::Deny => {
                        PolicyDecision::Deny("denied by stored rule".to_string())
                    }
                };
            }
        }

        // 5. Default.
        if self.config.auto_approve {
            PolicyDecision::Allow
        } else {
            PolicyDecision::Confirm
        }
    }
}

#[cfg(test)]
#[path = "policy_tests.rs"]
mod tests;
