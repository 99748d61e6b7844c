// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Persistent permission rules, stored as a JSON array.

use crate::snapshot::{write_json_atomic, SnapshotError};
use gm_core::PermissionRule;
use std::fs;
use std::path::Path;

pub(crate) fn load(path: &Path) -> Result<Vec<PermissionRule>, SnapshotError> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let file = fs::File::open(path)?;
    Ok(serde_json::from_reader(std::io::BufReader::new(file))?)
}

pub(crate) fn save(path: &Path, rules: &[PermissionRule]) -> Result<(), SnapshotError> {
    write_json_atomic(path, &rules)
}
