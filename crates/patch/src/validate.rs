// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Workspace path validation.
//!
//! The model supplies file paths; nothing it writes may escape the
//! configured work dir or touch well-known sensitive locations.

use crate::PatchError;
use std::path::{Component, Path, PathBuf};

/// Substrings that mark a path as off-limits regardless of where it
/// resolves.
const DENYLIST: &[&str] = &[
    "/etc/",
    "/proc/",
    "/sys/",
    "/root/",
    "/dev/",
    "/boot/",
    ".ssh",
    ".aws",
    ".gnupg",
    ".kube",
    "id_rsa",
    "id_ed25519",
    ".env",
    "credentials",
    "authorized_keys",
    ".bash_history",
];

/// Validate a model-supplied path and resolve it inside the work dir.
///
/// Rejects parent-directory traversal, denylisted components, absolute
/// paths escaping the work dir, and (when `allowed_paths` is non-empty)
/// anything outside the allowed subtrees.
pub fn validate_path(
    work_dir: &Path,
    allowed_paths: &[PathBuf],
    raw: &str,
) -> Result<PathBuf, PatchError> {
    let invalid = |reason: &str| PatchError::InvalidPath {
        path: raw.to_string(),
        reason: reason.to_string(),
    };

    if raw.is_empty() {
        return Err(invalid("empty path"));
    }

    let lowered = raw.to_lowercase();
    for pattern in DENYLIST {
        if lowered.contains(pattern) {
            return Err(invalid("sensitive path"));
        }
    }

    let candidate = Path::new(raw);

    // Normalise lexically; the file may not exist yet so fs::canonicalize
    // is not an option.
    let mut normalized = PathBuf::new();
    for component in candidate.components() {
        match component {
            Component::ParentDir => return Err(invalid("parent directory traversal")),
            Component::CurDir => {}
            Component::Normal(part) => normalized.push(part),
            Component::RootDir | Component::Prefix(_) => {
                // Absolute input: must stay under the work dir.
                let stripped = candidate
                    .strip_prefix(work_dir)
                    .map_err(|_| invalid("absolute path escapes work dir"))?;
                return validate_path(work_dir, allowed_paths, &stripped.to_string_lossy());
            }
        }
    }

    if !allowed_paths.is_empty() {
        let permitted = allowed_paths
            .iter()
            .any(|prefix| normalized.starts_with(prefix));
        if !permitted {
            return Err(invalid("outside allowed paths"));
        }
    }

    Ok(work_dir.join(normalized))
}

#[cfg(test)]
#[path = "validate_tests.rs"]
mod tests;
