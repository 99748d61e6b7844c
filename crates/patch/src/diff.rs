// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Unified diff generation.

use crate::PatchError;
use similar::TextDiff;

/// How much of the head of a file to scan for NUL bytes.
const BINARY_SNIFF_LEN: usize = 8 * 1024;

/// True when the content looks binary (NUL byte in the first 8 KiB).
pub(crate) fn looks_binary(content: &str) -> bool {
    let head = &content.as_bytes()[..content.len().min(BINARY_SNIFF_LEN)];
    head.contains(&0)
}

/// Generate a unified diff between two versions of a file.
///
/// Fails with [`PatchError::BinaryContent`] for binary input and
/// [`PatchError::NoChanges`] when the versions are identical.
pub fn generate_diff(file_path: &str, old: &str, new: &str) -> Result<String, PatchError> {
    if looks_binary(old) || looks_binary(new) {
        return Err(PatchError::BinaryContent);
    }
    if old == new {
        return Err(PatchError::NoChanges);
    }

    let diff = TextDiff::from_lines(old, new);
    let unified = diff
        .unified_diff()
        .context_radius(3)
        .header(&format!("a/{file_path}"), &format!("b/{file_path}"))
        .to_string();
    Ok(unified)
}

#[cfg(test)]
#[path = "diff_tests.rs"]
mod tests;
