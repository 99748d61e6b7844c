// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Persistent permission rules and argument normalisation
//!
//! A rule remembers a human decision ("always allow this exact call") so the
//! policy can answer without prompting again. Rules are keyed by
//! `(tool_name, pattern, action)` where `pattern` is the canonical-JSON form
//! of the call's arguments: `{"a":1,"b":2}` and `{"b":2,"a":1}` produce the
//! same key.

use crate::define_id;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

define_id! {
    /// Unique identifier for a stored permission rule.
    pub struct RuleId, "rule";
}

define_id! {
    /// Unique identifier for an in-flight permission request.
    pub struct RequestId, "perm";
}

/// What a matched rule does to the call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionAction {
    Allow,
    Deny,
}

/// A persisted permission decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PermissionRule {
    pub id: RuleId,
    pub tool_name: String,
    /// Canonical-JSON form of the arguments the rule was created from.
    pub pattern: String,
    pub action: PermissionAction,
    pub created_at: DateTime<Utc>,
}

impl PermissionRule {
    /// Dedupe/match key: `(tool_name, pattern, action)`.
    pub fn key(&self) -> (&str, &str, PermissionAction) {
        (&self.tool_name, &self.pattern, self.action)
    }
}

/// Serialise a JSON value with object keys in sorted order, recursively.
///
/// This is the stable form used for permission-rule patterns; two values
/// with the same fields always produce the same string regardless of key
/// order in the input.
pub fn canonical_json(value: &Value) -> String {
    fn write(value: &Value, out: &mut String) {
        match value {
            Value::Object(map) => {
                out.push('{');
                let mut keys: Vec<&String> = map.keys().collect();
                keys.sort();
                for (i, key) in keys.iter().enumerate() {
                    if i > 0 {
                        out.push(',');
                    }
                    out.push_str(&Value::String((*key).clone()).to_string());
                    out.push(':');
                    if let Some(v) = map.get(*key) {
                        write(v, out);
                    }
                }
                out.push('}');
            }
            Value::Array(items) => {
                out.push('[');
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        out.push(',');
                    }
                    write(item, out);
                }
                out.push(']');
            }
            other => out.push_str(&other.to_string()),
        }
    }

    let mut out = String::new();
    write(value, &mut out);
    out
}

/// Parse an argument string and return its canonical form.
///
/// Non-JSON input falls back to the raw string so a rule can still be keyed
/// on it.
pub fn normalize_arguments(raw: &str) -> String {
    match serde_json::from_str::<Value>(raw) {
        Ok(value) => canonical_json(&value),
        Err(_) => raw.to_string(),
    }
}

#[cfg(test)]
#[path = "permission_tests.rs"]
mod tests;
