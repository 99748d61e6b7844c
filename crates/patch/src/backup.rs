// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-patch backups with sidecar metadata.
//!
//! Every apply that touches an existing file first copies it to
//! `<backup_dir>/<patch_id>_<millis>_<basename>.bak` plus a `.meta` JSON
//! sidecar, so `rollback(patch_id)` can restore the pre-apply bytes.

use crate::PatchError;
use chrono::{DateTime, Utc};
use gm_core::{Clock, FileOperation, PatchId};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Sidecar metadata stored next to each backup file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct BackupMeta {
    pub patch_id: PatchId,
    pub file_path: String,
    pub timestamp: DateTime<Utc>,
    pub operation: FileOperation,
}

/// Backup listing entry with a short content preview.
#[derive(Debug, Clone, Serialize)]
pub struct BackupInfo {
    pub patch_id: PatchId,
    pub file_path: String,
    pub backup_path: String,
    pub timestamp: DateTime<Utc>,
    pub preview: String,
}

const PREVIEW_LEN: usize = 80;

/// Write the backup file and its metadata sidecar; returns the backup path.
pub(crate) fn create(
    backup_dir: &Path,
    patch_id: &PatchId,
    file_path: &str,
    content: &str,
    operation: FileOperation,
    clock: &impl Clock,
) -> Result<PathBuf, PatchError> {
    fs::create_dir_all(backup_dir)?;

    let timestamp = clock.now();
    let basename = Path::new(file_path)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "file".to_string());
    let backup_path = backup_dir.join(format!(
        "{}_{}_{basename}.bak",
        patch_id,
        timestamp.timestamp_millis(),
    ));

    fs::write(&backup_path, content)?;
    let meta = BackupMeta {
        patch_id: patch_id.clone(),
        file_path: file_path.to_string(),
        timestamp,
        operation,
    };
    let meta_path = meta_path_for(&backup_path);
    fs::write(&meta_path, serde_json::to_vec(&meta)?)?;

    Ok(backup_path)
}

/// Locate a backup by patch ID.
pub(crate) fn find(
    backup_dir: &Path,
    patch_id: &PatchId,
) -> Result<Option<(PathBuf, BackupMeta)>, PatchError> {
    for (backup_path, meta) in scan(backup_dir)? {
        if &meta.patch_id == patch_id {
            return Ok(Some((backup_path, meta)));
        }
    }
    Ok(None)
}

/// Every backup with metadata, unordered.
pub(crate) fn scan(backup_dir: &Path) -> Result<Vec<(PathBuf, BackupMeta)>, PatchError> {
    if !backup_dir.exists() {
        return Ok(Vec::new());
    }
    let mut found = Vec::new();
    for entry in fs::read_dir(backup_dir)? {
        let path = entry?.path();
        if path.extension().is_none_or(|ext| ext != "bak") {
            continue;
        }
        let meta_path = meta_path_for(&path);
        if !meta_path.exists() {
            continue;
        }
        let meta: BackupMeta = serde_json::from_slice(&fs::read(&meta_path)?)?;
        found.push((path, meta));
    }
    Ok(found)
}

/// Backup listing with content previews, newest first.
pub(crate) fn list(backup_dir: &Path) -> Result<Vec<BackupInfo>, PatchError> {
    let mut infos = Vec::new();
    for (backup_path, meta) in scan(backup_dir)? {
        let content = fs::read_to_string(&backup_path).unwrap_or_default();
        let preview: String = content.chars().take(PREVIEW_LEN).collect();
        infos.push(BackupInfo {
            patch_id: meta.patch_id,
            file_path: meta.file_path,
            backup_path: backup_path.to_string_lossy().into_owned(),
            timestamp: meta.timestamp,
            preview,
        });
    }
    infos.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    Ok(infos)
}

fn meta_path_for(backup_path: &Path) -> PathBuf {
    let mut s = backup_path.as_os_str().to_owned();
    s.push(".meta");
    PathBuf::from(s)
}
