// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Atomic state snapshot persistence.
//!
//! The latest state is a single JSON file written with the
//! write-temp-then-rename pattern, so a crash mid-save never corrupts it.
//! A snapshot that fails to parse is quarantined under a timestamped
//! `.corrupt.<nanos>` name and treated as absent, so the session starts
//! fresh instead of failing on every open; a handful of quarantined copies
//! are retained for post-mortems.

use gm_core::AgentState;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;

/// Errors from snapshot operations
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Save state atomically.
pub fn save_state(path: &Path, state: &AgentState) -> Result<(), SnapshotError> {
    write_json_atomic(path, state)
}

/// Load the latest state if it exists.
///
/// Returns `Ok(None)` both when the file doesn't exist and when it is
/// unreadable; unreadable snapshots are quarantined first.
pub fn load_state(path: &Path) -> Result<Option<AgentState>, SnapshotError> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    match serde_json::from_slice(&bytes) {
        Ok(state) => Ok(Some(state)),
        Err(e) => {
            let quarantined = quarantine(path)?;
            warn!(
                error = %e,
                path = %path.display(),
                quarantined = %quarantined.display(),
                "unreadable state snapshot, quarantining and starting fresh",
            );
            Ok(None)
        }
    }
}

/// Quarantined snapshots kept for inspection; older ones are pruned.
const QUARANTINE_KEEP: usize = 3;

/// Move an unreadable file aside as `<name>.corrupt.<nanos>`.
///
/// The nanosecond suffix keeps quarantined copies distinct and makes a
/// plain filename sort chronological, which the pruning below relies on.
fn quarantine(path: &Path) -> Result<PathBuf, SnapshotError> {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "snapshot".to_string());
    let nanos = chrono::Utc::now()
        .timestamp_nanos_opt()
        .unwrap_or_default();
    let dest = path.with_file_name(format!("{file_name}.corrupt.{nanos}"));
    fs::rename(path, &dest)?;

    prune_quarantined(path, &file_name);
    Ok(dest)
}

/// Delete the oldest quarantined copies past [`QUARANTINE_KEEP`].
///
/// Best-effort: pruning failures only cost disk space, never the load.
fn prune_quarantined(path: &Path, file_name: &str) {
    let Some(dir) = path.parent() else {
        return;
    };
    let Ok(entries) = fs::read_dir(dir) else {
        return;
    };

    let marker = format!("{file_name}.corrupt.");
    let mut quarantined: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with(&marker))
        })
        .collect();

    if quarantined.len() <= QUARANTINE_KEEP {
        return;
    }
    quarantined.sort();
    for stale in &quarantined[..quarantined.len() - QUARANTINE_KEEP] {
        let _ = fs::remove_file(stale);
    }
}

/// Atomic JSON write shared by the snapshot, checkpoint, artifact, and
/// rule stores: serialize, write to `.tmp`, fsync, rename into place.
pub(crate) fn write_json_atomic<T: serde::Serialize>(
    path: &Path,
    value: &T,
) -> Result<(), SnapshotError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let bytes = serde_json::to_vec(value)?;
    let tmp_path = path.with_extension("tmp");
    fs::write(&tmp_path, &bytes)?;
    File::open(&tmp_path)?.sync_all()?;
    fs::rename(&tmp_path, path)?;
    Ok(())
}

#[cfg(test)]
#[path = "snapshot_tests.rs"]
mod tests;
