// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tool executor
//!
//! Runs one tool call end to end: registry lookup, policy check, the
//! permission rendezvous when the policy asks for confirmation, then the
//! handler. Every outcome becomes a `tool:result` event; a denial is data
//! for the agent to react to, never a loop-terminating failure.

use crate::permission::{PermissionManager, WaitError};
use crate::policy::{Policy, PolicyDecision};
use crate::tools::{HandlerOutcome, ToolRegistry};
use gm_core::{
    canonical_json, Actor, Clock, Event, EventPayload, Mode, PermissionAction, PermissionRule,
    RequestId, RuleId,
};
use gm_storage::Store;
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Default bound on the permission rendezvous.
const DEFAULT_PERMISSION_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// Default bound on one handler invocation.
const DEFAULT_HANDLER_TIMEOUT: Duration = Duration::from_secs(120);

/// Callback that surfaces a `permission:request` event to the client.
///
/// Wired by the session factory; typically appends the event to the
/// session's store so the event stream picks it up.
pub type PermissionEmitter = Arc<dyn Fn(Event) + Send + Sync>;

/// One tool call to execute.
#[derive(Debug, Clone)]
pub struct ToolInvocation {
    pub tool_call_id: String,
    pub tool_name: String,
    pub arguments: Value,
}

/// Executes tool calls under the configured policy.
pub struct Executor<C: Clock> {
    registry: Arc<ToolRegistry>,
    policy: Policy,
    permissions: Arc<PermissionManager>,
    store: Arc<Store>,
    clock: C,
    emitter: RwLock<Option<PermissionEmitter>>,
    permission_timeout: Duration,
    handler_timeout: Duration,
}

impl<C: Clock> Executor<C> {
    pub fn new(
        registry: Arc<ToolRegistry>,
        policy: Policy,
        permissions: Arc<PermissionManager>,
        store: Arc<Store>,
        clock: C,
    ) -> Self {
        Self {
            registry,
            policy,
            permissions,
            store,
            clock,
            emitter: RwLock::new(None),
            permission_timeout: DEFAULT_PERMISSION_TIMEOUT,
            handler_timeout: DEFAULT_HANDLER_TIMEOUT,
        }
    }

    /// Override the permission rendezvous timeout.
    pub fn with_permission_timeout(mut self, timeout: Duration) -> Self {
        self.permission_timeout = timeout;
        self
    }

    /// Override the handler invocation timeout.
    pub fn with_handler_timeout(mut self, timeout: Duration) -> Self {
        self.handler_timeout = timeout;
        self
    }

    /// Install the callback that routes permission requests to the client.
    pub fn set_permission_emitter(&self, emitter: PermissionEmitter) {
        *self.emitter.write() = Some(emitter);
    }

    /// Execute one tool call, returning its `tool:result` event.
    pub async fn execute(
        &self,
        mode: Mode,
        invocation: &ToolInvocation,
        cancel: &CancellationToken,
    ) -> Event {
        let start = Instant::now();

        let Some((tool, handler)) = self.registry.get(&invocation.tool_name) else {
            return self.result(
                invocation,
                start,
                HandlerOutcome::error(format!("unknown tool: {}", invocation.tool_name)),
            );
        };

        let normalized = canonical_json(&invocation.arguments);
        let rules = match self.store.get_permission_rules() {
            Ok(rules) => rules,
            Err(e) => {
                warn!(error = %e, "failed to load permission rules, treating as empty");
                Vec::new()
            }
        };

        match self.policy.check(mode, &tool, &normalized, &rules) {
            PolicyDecision::Deny(reason) => {
                info!(tool = %tool.name, %reason, "tool call denied by policy");
                return self.result(
                    invocation,
                    start,
                    HandlerOutcome::error(format!("denied by policy: {reason}")),
                );
            }
            PolicyDecision::Confirm => {
                if let Some(outcome) = self.confirm(invocation, &normalized, cancel).await {
                    return self.result(invocation, start, outcome);
                }
                // Approved (or no emitter installed): fall through.
            }
            PolicyDecision::Allow => {}
        }

        let outcome = tokio::select! {
            _ = cancel.cancelled() => HandlerOutcome::error("session cancelled"),
            outcome = tokio::time::timeout(self.handler_timeout, handler.call(&invocation.arguments)) => {
                outcome.unwrap_or_else(|_| {
                    HandlerOutcome::error(format!("tool {} timed out", invocation.tool_name))
                })
            }
        };

        self.result(invocation, start, outcome)
    }

    /// Run the permission rendezvous.
    ///
    /// Returns `Some(outcome)` when the call must not proceed; `None` when
    /// it may. With no emitter installed, `Confirm` degrades to allow so
    /// headless setups keep working.
    async fn confirm(
        &self,
        invocation: &ToolInvocation,
        normalized: &str,
        cancel: &CancellationToken,
    ) -> Option<HandlerOutcome> {
        let emitter = self.emitter.read().clone()?;

        let request_id = RequestId::generate();
        let receiver = self.permissions.request(request_id.clone());

        let mut metadata = HashMap::new();
        metadata.insert("arguments".to_string(), invocation.arguments.clone());
        let event = Event::new(
            Actor::Runtime,
            invocation.tool_call_id.clone(),
            EventPayload::PermissionRequest {
                request_id: request_id.clone(),
                tool_name: invocation.tool_name.clone(),
                permission: "execute".to_string(),
                patterns: vec![normalized.to_string()],
                metadata,
            },
            &self.clock,
        );
        emitter(event);

        info!(
            tool = %invocation.tool_name,
            request = %request_id,
            "waiting for permission",
        );

        let decision = self
            .permissions
            .wait_for_response(&request_id, receiver, self.permission_timeout, cancel)
            .await;

        match decision {
            Ok(decision) if decision.approved => {
                if decision.always {
                    let rule = PermissionRule {
                        id: RuleId::generate(),
                        tool_name: invocation.tool_name.clone(),
                        pattern: normalized.to_string(),
                        action: PermissionAction::Allow,
                        created_at: self.clock.now(),
                    };
                    if let Err(e) = self.store.add_permission_rule(rule) {
                        warn!(error = %e, "failed to persist permission rule");
                    }
                }
                None
            }
            Ok(_) => Some(HandlerOutcome::error("Permission denied by user")),
            Err(WaitError::Timeout) => {
                Some(HandlerOutcome::error("permission request timed out"))
            }
            Err(WaitError::Cancelled) => Some(HandlerOutcome::error("session cancelled")),
            Err(WaitError::NotFound) => {
                Some(HandlerOutcome::error("permission request was dropped"))
            }
        }
    }

    fn result(&self, invocation: &ToolInvocation, start: Instant, outcome: HandlerOutcome) -> Event {
        let success = outcome.error.is_none();
        Event::new(
            Actor::Tool,
            invocation.tool_call_id.clone(),
            EventPayload::ToolResult {
                tool_call_id: invocation.tool_call_id.clone(),
                tool_name: invocation.tool_name.clone(),
                success,
                output: outcome.output,
                error: outcome.error,
                duration_ms: start.elapsed().as_millis() as u64,
            },
            &self.clock,
        )
    }
}

#[cfg(test)]
#[path = "executor_tests.rs"]
mod tests;
