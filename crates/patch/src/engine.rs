// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The patch engine: validate, back up, apply, roll back.

use crate::backup::{self, BackupInfo};
use crate::tracker::FileChangeTracker;
use crate::validate::validate_path;
use crate::{hunk, PatchError};
use gm_core::{Clock, FileChange, FileOperation, PatchId, SystemClock};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

/// Patch engine configuration.
#[derive(Debug, Clone)]
pub struct PatchConfig {
    /// Workspace root all patched paths must resolve under.
    pub work_dir: PathBuf,
    /// When non-empty, only these subtrees (relative to `work_dir`) may be
    /// patched.
    pub allowed_paths: Vec<PathBuf>,
    /// Backup directory name under `work_dir`.
    pub backup_dir: String,
}

impl PatchConfig {
    pub fn new(work_dir: impl Into<PathBuf>) -> Self {
        Self {
            work_dir: work_dir.into(),
            allowed_paths: Vec::new(),
            backup_dir: ".gm-backups".to_string(),
        }
    }
}

/// One patch application request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplyRequest {
    pub file_path: String,
    pub diff: String,
    #[serde(default)]
    pub dry_run: bool,
}

/// Outcome of an apply or dry run.
#[derive(Debug, Clone, Serialize)]
pub struct ApplyResult {
    pub patch_id: PatchId,
    pub success: bool,
    pub lines_added: usize,
    pub lines_removed: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backup_path: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Applies unified diffs inside the configured workspace.
pub struct PatchEngine<C: Clock = SystemClock> {
    config: PatchConfig,
    tracker: Arc<FileChangeTracker>,
    clock: C,
}

impl PatchEngine<SystemClock> {
    pub fn new(config: PatchConfig) -> Self {
        Self::with_clock(config, SystemClock)
    }
}

impl<C: Clock> PatchEngine<C> {
    /// Create an engine with an injected clock (tests stamp backups with
    /// a `FakeClock`).
    pub fn with_clock(config: PatchConfig, clock: C) -> Self {
        Self {
            config,
            tracker: Arc::new(FileChangeTracker::new()),
            clock,
        }
    }

    /// The tracker receiving successful applies; the runtime drains it at
    /// checkpoint time.
    pub fn tracker(&self) -> Arc<FileChangeTracker> {
        Arc::clone(&self.tracker)
    }

    fn backup_dir(&self) -> PathBuf {
        self.config.work_dir.join(&self.config.backup_dir)
    }

    /// Apply a patch. The file is only written when every hunk applies.
    pub fn apply(&self, request: &ApplyRequest) -> Result<ApplyResult, PatchError> {
        self.apply_inner(request, request.dry_run)
    }

    /// Apply without writing anything.
    pub fn dry_run(&self, request: &ApplyRequest) -> Result<ApplyResult, PatchError> {
        self.apply_inner(request, true)
    }

    fn apply_inner(&self, request: &ApplyRequest, dry_run: bool) -> Result<ApplyResult, PatchError> {
        let resolved = validate_path(
            &self.config.work_dir,
            &self.config.allowed_paths,
            &request.file_path,
        )?;

        let patch_id = PatchId::generate();
        let exists = resolved.exists();
        let old = if exists {
            fs::read_to_string(&resolved)?
        } else {
            String::new()
        };

        let hunks = hunk::parse(&request.diff)?;
        let applied = hunk::apply(&old, &hunks);

        if applied.failed_hunks > 0 {
            warn!(
                file = %request.file_path,
                failed = applied.failed_hunks,
                "patch did not apply cleanly",
            );
            return Ok(ApplyResult {
                patch_id,
                success: false,
                lines_added: applied.lines_added,
                lines_removed: applied.lines_removed,
                backup_path: None,
                warnings: applied.warnings,
                error: Some("patch did not apply cleanly".to_string()),
            });
        }

        if dry_run {
            return Ok(ApplyResult {
                patch_id,
                success: true,
                lines_added: applied.lines_added,
                lines_removed: applied.lines_removed,
                backup_path: None,
                warnings: applied.warnings,
                error: None,
            });
        }

        let operation = if exists {
            FileOperation::Modify
        } else {
            FileOperation::Create
        };

        // Back up the pre-apply content (empty for created files) so the
        // patch is reversible.
        let backup_path = backup::create(
            &self.backup_dir(),
            &patch_id,
            &request.file_path,
            &old,
            operation,
            &self.clock,
        )?;

        write_atomic(&resolved, &applied.content)?;

        self.tracker.record(FileChange {
            patch_id: patch_id.clone(),
            file_path: request.file_path.clone(),
            backup_path: backup_path.to_string_lossy().into_owned(),
            operation,
        });

        info!(
            file = %request.file_path,
            patch_id = %patch_id,
            added = applied.lines_added,
            removed = applied.lines_removed,
            "applied patch",
        );

        Ok(ApplyResult {
            patch_id,
            success: true,
            lines_added: applied.lines_added,
            lines_removed: applied.lines_removed,
            backup_path: Some(backup_path.to_string_lossy().into_owned()),
            warnings: applied.warnings,
            error: None,
        })
    }

    /// Restore a file to its pre-apply content using the patch's backup.
    ///
    /// A backup taken for a created file is empty; rolling it back removes
    /// the file again.
    pub fn rollback(&self, patch_id: &PatchId) -> Result<(), PatchError> {
        let (backup_path, meta) = backup::find(&self.backup_dir(), patch_id)?
            .ok_or_else(|| PatchError::BackupNotFound(patch_id.to_string()))?;

        let resolved = validate_path(
            &self.config.work_dir,
            &self.config.allowed_paths,
            &meta.file_path,
        )?;

        match meta.operation {
            FileOperation::Create => {
                if resolved.exists() {
                    fs::remove_file(&resolved)?;
                }
            }
            FileOperation::Modify | FileOperation::Delete => {
                let content = fs::read_to_string(&backup_path)?;
                write_atomic(&resolved, &content)?;
            }
        }

        info!(
            file = %meta.file_path,
            patch_id = %patch_id,
            "rolled back patch",
        );
        Ok(())
    }

    /// Enumerate backups with content previews, newest first.
    pub fn list_backups(&self) -> Result<Vec<BackupInfo>, PatchError> {
        backup::list(&self.backup_dir())
    }
}

/// Write a file atomically (tmp + fsync + rename).
fn write_atomic(path: &Path, content: &str) -> Result<(), PatchError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("gm-tmp");
    fs::write(&tmp, content)?;
    let file = fs::File::open(&tmp)?;
    file.sync_all()?;
    fs::rename(&tmp, path)?;
    Ok(())
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;
