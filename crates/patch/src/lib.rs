// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Patch engine for the gm agent runtime
//!
//! Generates and applies unified diffs inside a configured workspace, with
//! a backup per applied patch so every change is reversible until its
//! backup is garbage-collected. Successful applies are recorded in a
//! [`FileChangeTracker`] that the runtime drains into checkpoints.

mod backup;
mod diff;
mod engine;
mod hunk;
mod tracker;
mod validate;

pub use backup::BackupInfo;
pub use diff::generate_diff;
pub use engine::{ApplyRequest, ApplyResult, PatchConfig, PatchEngine};
pub use tracker::FileChangeTracker;
pub use validate::validate_path;

use thiserror::Error;

/// Errors from patch operations
#[derive(Debug, Error)]
pub enum PatchError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("no changes between old and new content")]
    NoChanges,
    #[error("binary content cannot be diffed")]
    BinaryContent,
    #[error("invalid path {path:?}: {reason}")]
    InvalidPath { path: String, reason: String },
    #[error("malformed diff: {0}")]
    MalformedDiff(String),
    #[error("backup not found for patch {0}")]
    BackupNotFound(String),
}
