// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-session durable store.
//!
//! Aggregates the event log, the latest state snapshot, the checkpoint
//! directory, artifact blobs, and the permission-rule table under one
//! session root. A reader-writer lock enforces single-writer semantics;
//! readers (the SSE poller) proceed concurrently with each other.

use crate::event_log::{EventLog, EventLogError};
use crate::snapshot::SnapshotError;
use crate::{artifacts, checkpoints, rules, snapshot};
use gm_core::{
    AgentState, Artifact, ArtifactId, Checkpoint, CheckpointId, Event, EventId, PermissionRule,
};
use parking_lot::RwLock;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Errors from store operations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("event log error: {0}")]
    EventLog(#[from] EventLogError),
    #[error("snapshot error: {0}")]
    Snapshot(#[from] SnapshotError),
}

/// Filter for artifact listings.
#[derive(Debug, Clone, Default)]
pub struct ArtifactFilter {
    pub artifact_type: Option<String>,
    pub goal_id: Option<String>,
}

impl ArtifactFilter {
    fn matches(&self, artifact: &Artifact) -> bool {
        if let Some(t) = &self.artifact_type {
            if &artifact.artifact_type != t {
                return false;
            }
        }
        if let Some(g) = &self.goal_id {
            if artifact.goal_id.as_ref().map(|id| id.as_str()) != Some(g.as_str()) {
                return false;
            }
        }
        true
    }
}

struct Inner {
    log: EventLog,
    rules: Vec<PermissionRule>,
}

/// Durable storage for one session.
pub struct Store {
    root: PathBuf,
    inner: RwLock<Inner>,
}

impl Store {
    /// Open (or create) the store at the given session root.
    pub fn open(root: &Path) -> Result<Self, StoreError> {
        std::fs::create_dir_all(root)?;
        let log = EventLog::open(&root.join("events.jsonl"))?;
        let rules = rules::load(&root.join("permissions.json"))?;
        debug!(root = %root.display(), rules = rules.len(), "opened store");
        Ok(Self {
            root: root.to_owned(),
            inner: RwLock::new(Inner { log, rules }),
        })
    }

    /// Session root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn state_path(&self) -> PathBuf {
        self.root.join("state").join("state.json")
    }

    fn checkpoints_dir(&self) -> PathBuf {
        self.root.join("checkpoints")
    }

    fn artifacts_dir(&self) -> PathBuf {
        self.root.join("artifacts")
    }

    fn rules_path(&self) -> PathBuf {
        self.root.join("permissions.json")
    }

    // === Event log ===

    /// Append one event; durable when this returns.
    pub fn append_event(&self, event: &Event) -> Result<(), StoreError> {
        let mut inner = self.inner.write();
        inner.log.append(event)?;
        Ok(())
    }

    /// Append a batch of events with one fsync.
    pub fn append_events(&self, events: &[Event]) -> Result<(), StoreError> {
        let mut inner = self.inner.write();
        inner.log.append_batch(events)?;
        Ok(())
    }

    /// Fetch a single event by ID.
    pub fn get_event(&self, id: &EventId) -> Result<Event, StoreError> {
        let inner = self.inner.read();
        let mut found = None;
        inner.log.for_each(|e| {
            if found.is_none() && &e.id == id {
                found = Some(e);
            }
        })?;
        found.ok_or(StoreError::NotFound("event"))
    }

    /// Events with an ID strictly greater than `after_id`; empty string
    /// returns everything from the origin.
    pub fn get_events_since(&self, after_id: &str) -> Result<Vec<Event>, StoreError> {
        let inner = self.inner.read();
        Ok(inner.log.events_since(after_id)?)
    }

    /// Visit every event in append order.
    pub fn iter_events(&self, f: impl FnMut(Event)) -> Result<(), StoreError> {
        let inner = self.inner.read();
        inner.log.for_each(f)?;
        Ok(())
    }

    // === State snapshot ===

    /// Atomically persist the latest state.
    pub fn save_state(&self, state: &AgentState) -> Result<(), StoreError> {
        let _guard = self.inner.write();
        snapshot::save_state(&self.state_path(), state)?;
        Ok(())
    }

    /// Load the latest snapshot; `NotFound` when none exists.
    pub fn load_latest_state(&self) -> Result<AgentState, StoreError> {
        let _guard = self.inner.read();
        snapshot::load_state(&self.state_path())?.ok_or(StoreError::NotFound("state snapshot"))
    }

    /// Load a specific state version.
    ///
    /// Only the tip is kept; any other version is `NotFound`.
    pub fn load_state(&self, version: u64) -> Result<AgentState, StoreError> {
        let state = self.load_latest_state()?;
        if state.version != version {
            return Err(StoreError::NotFound("state version"));
        }
        Ok(state)
    }

    // === Checkpoints ===

    pub fn save_checkpoint(&self, checkpoint: &Checkpoint) -> Result<(), StoreError> {
        let _guard = self.inner.write();
        checkpoints::save(&self.checkpoints_dir(), checkpoint)?;
        Ok(())
    }

    /// All checkpoints, newest first.
    pub fn list_checkpoints(&self) -> Result<Vec<Checkpoint>, StoreError> {
        let _guard = self.inner.read();
        Ok(checkpoints::list(&self.checkpoints_dir())?)
    }

    pub fn load_checkpoint(&self, id: &CheckpointId) -> Result<Checkpoint, StoreError> {
        let _guard = self.inner.read();
        checkpoints::load(&self.checkpoints_dir(), id)?.ok_or(StoreError::NotFound("checkpoint"))
    }

    pub fn load_latest_checkpoint(&self) -> Result<Checkpoint, StoreError> {
        let _guard = self.inner.read();
        checkpoints::load_latest(&self.checkpoints_dir())?.ok_or(StoreError::NotFound("checkpoint"))
    }

    // === Artifacts ===

    pub fn save_artifact(&self, artifact: &Artifact) -> Result<(), StoreError> {
        let _guard = self.inner.write();
        artifacts::save(&self.artifacts_dir(), artifact)?;
        Ok(())
    }

    pub fn get_artifact(&self, id: &ArtifactId) -> Result<Artifact, StoreError> {
        let _guard = self.inner.read();
        artifacts::load(&self.artifacts_dir(), id)?.ok_or(StoreError::NotFound("artifact"))
    }

    pub fn list_artifacts(&self, filter: &ArtifactFilter) -> Result<Vec<Artifact>, StoreError> {
        let _guard = self.inner.read();
        let all = artifacts::list(&self.artifacts_dir())?;
        Ok(all.into_iter().filter(|a| filter.matches(a)).collect())
    }

    pub fn delete_artifact(&self, id: &ArtifactId) -> Result<(), StoreError> {
        let _guard = self.inner.write();
        if !artifacts::delete(&self.artifacts_dir(), id)? {
            return Err(StoreError::NotFound("artifact"));
        }
        Ok(())
    }

    // === Permission rules ===

    /// Insert a rule; duplicates on `(tool, pattern, action)` are a no-op.
    pub fn add_permission_rule(&self, rule: PermissionRule) -> Result<(), StoreError> {
        let mut inner = self.inner.write();
        if inner.rules.iter().any(|r| r.key() == rule.key()) {
            return Ok(());
        }
        inner.rules.push(rule);
        rules::save(&self.rules_path(), &inner.rules)?;
        Ok(())
    }

    pub fn get_permission_rules(&self) -> Result<Vec<PermissionRule>, StoreError> {
        let inner = self.inner.read();
        Ok(inner.rules.clone())
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
