// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Artifact persistence: metadata JSON plus an optional content blob.
//!
//! Metadata lives in `<art_id>.json`; inline content, when present, is
//! split out into `<art_id>.blob` so large outputs don't bloat the metadata
//! scans.

use crate::snapshot::{write_json_atomic, SnapshotError};
use gm_core::{Artifact, ArtifactId};
use std::fs;
use std::path::Path;
use tracing::warn;

pub(crate) fn save(dir: &Path, artifact: &Artifact) -> Result<(), SnapshotError> {
    fs::create_dir_all(dir)?;

    let mut meta = artifact.clone();
    let content = meta.content.take();

    write_json_atomic(&dir.join(format!("{}.json", artifact.id)), &meta)?;

    if let Some(content) = content {
        let blob_path = dir.join(format!("{}.blob", artifact.id));
        fs::write(&blob_path, content.as_bytes())?;
        let file = fs::File::open(&blob_path)?;
        file.sync_all()?;
    }
    Ok(())
}

pub(crate) fn load(dir: &Path, id: &ArtifactId) -> Result<Option<Artifact>, SnapshotError> {
    let meta_path = dir.join(format!("{id}.json"));
    if !meta_path.exists() {
        return Ok(None);
    }
    let file = fs::File::open(&meta_path)?;
    let mut artifact: Artifact = serde_json::from_reader(std::io::BufReader::new(file))?;

    let blob_path = dir.join(format!("{id}.blob"));
    if blob_path.exists() {
        artifact.content = Some(fs::read_to_string(&blob_path)?);
    }
    Ok(Some(artifact))
}

pub(crate) fn list(dir: &Path) -> Result<Vec<Artifact>, SnapshotError> {
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let mut artifacts = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.extension().is_none_or(|ext| ext != "json") {
            continue;
        }
        let file = fs::File::open(&path)?;
        match serde_json::from_reader::<_, Artifact>(std::io::BufReader::new(file)) {
            Ok(artifact) => artifacts.push(artifact),
            Err(e) => warn!(
                path = %path.display(),
                error = %e,
                "skipping unreadable artifact metadata",
            ),
        }
    }
    artifacts.sort_by(|a, b| a.id.cmp(&b.id));
    Ok(artifacts)
}

pub(crate) fn delete(dir: &Path, id: &ArtifactId) -> Result<bool, SnapshotError> {
    let meta_path = dir.join(format!("{id}.json"));
    if !meta_path.exists() {
        return Ok(false);
    }
    fs::remove_file(&meta_path)?;
    let blob_path = dir.join(format!("{id}.blob"));
    if blob_path.exists() {
        fs::remove_file(&blob_path)?;
    }
    Ok(true)
}
