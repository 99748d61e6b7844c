// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Checkpoint directory management.
//!
//! Checkpoints are stored one file per checkpoint as
//! `<unix-nanos>_<ckpt_id>.json`, so a lexicographic sort of filenames is
//! creation order and the newest filename sorts last.

use crate::snapshot::{write_json_atomic, SnapshotError};
use gm_core::{Checkpoint, CheckpointId};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Persist a checkpoint into the directory.
pub(crate) fn save(dir: &Path, checkpoint: &Checkpoint) -> Result<(), SnapshotError> {
    let nanos = checkpoint
        .timestamp
        .timestamp_nanos_opt()
        .unwrap_or_default();
    let path = dir.join(format!("{nanos}_{}.json", checkpoint.id));
    write_json_atomic(&path, checkpoint)
}

/// Checkpoint files sorted newest first.
pub(crate) fn sorted_files(dir: &Path) -> Result<Vec<PathBuf>, SnapshotError> {
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let mut files: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|p| p.extension().is_some_and(|ext| ext == "json"))
        .collect();
    files.sort();
    files.reverse();
    Ok(files)
}

/// Load every checkpoint, newest first. Unparseable files are skipped.
pub(crate) fn list(dir: &Path) -> Result<Vec<Checkpoint>, SnapshotError> {
    let mut checkpoints = Vec::new();
    for path in sorted_files(dir)? {
        match read(&path) {
            Ok(cp) => checkpoints.push(cp),
            Err(e) => warn!(
                path = %path.display(),
                error = %e,
                "skipping unreadable checkpoint",
            ),
        }
    }
    Ok(checkpoints)
}

/// Load one checkpoint by ID.
pub(crate) fn load(dir: &Path, id: &CheckpointId) -> Result<Option<Checkpoint>, SnapshotError> {
    let suffix = format!("_{}.json", id);
    for path in sorted_files(dir)? {
        let matches = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.ends_with(&suffix));
        if matches {
            return Ok(Some(read(&path)?));
        }
    }
    Ok(None)
}

/// Load the newest checkpoint, skipping unreadable files.
pub(crate) fn load_latest(dir: &Path) -> Result<Option<Checkpoint>, SnapshotError> {
    for path in sorted_files(dir)? {
        match read(&path) {
            Ok(cp) => return Ok(Some(cp)),
            Err(e) => warn!(
                path = %path.display(),
                error = %e,
                "skipping unreadable checkpoint",
            ),
        }
    }
    Ok(None)
}

fn read(path: &Path) -> Result<Checkpoint, SnapshotError> {
    let file = fs::File::open(path)?;
    Ok(serde_json::from_reader(std::io::BufReader::new(file))?)
}
