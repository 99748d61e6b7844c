// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Unified diff parsing and hunk application.
//!
//! Hunks are applied against the old content one at a time. A hunk whose
//! pre-image cannot be located leaves the content untouched and is reported
//! as a warning; the caller decides whether to write anything.

use crate::PatchError;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum HunkLine {
    Context(String),
    Remove(String),
    Add(String),
}

#[derive(Debug, Clone)]
pub(crate) struct Hunk {
    /// 1-based start line in the old file.
    pub old_start: usize,
    pub lines: Vec<HunkLine>,
}

impl Hunk {
    /// Lines the hunk expects to find in the old file (context + removals).
    fn pre_image(&self) -> Vec<&str> {
        self.lines
            .iter()
            .filter_map(|l| match l {
                HunkLine::Context(s) | HunkLine::Remove(s) => Some(s.as_str()),
                HunkLine::Add(_) => None,
            })
            .collect()
    }
}

/// Parse the hunks out of a unified diff.
pub(crate) fn parse(diff: &str) -> Result<Vec<Hunk>, PatchError> {
    let mut hunks: Vec<Hunk> = Vec::new();

    for line in diff.lines() {
        if line.starts_with("--- ") || line.starts_with("+++ ") {
            continue;
        }
        if let Some(header) = line.strip_prefix("@@") {
            let old_start = parse_old_start(header)
                .ok_or_else(|| PatchError::MalformedDiff(format!("bad hunk header: {line}")))?;
            hunks.push(Hunk {
                old_start,
                lines: Vec::new(),
            });
            continue;
        }

        let Some(hunk) = hunks.last_mut() else {
            // Preamble outside any hunk (e.g. git headers) is ignored.
            continue;
        };

        if let Some(rest) = line.strip_prefix('+') {
            hunk.lines.push(HunkLine::Add(rest.to_string()));
        } else if let Some(rest) = line.strip_prefix('-') {
            hunk.lines.push(HunkLine::Remove(rest.to_string()));
        } else if let Some(rest) = line.strip_prefix(' ') {
            hunk.lines.push(HunkLine::Context(rest.to_string()));
        } else if line.starts_with('\\') {
            // "\ No newline at end of file"
            continue;
        } else if line.is_empty() {
            // Some emitters drop the leading space on blank context lines.
            hunk.lines.push(HunkLine::Context(String::new()));
        } else {
            return Err(PatchError::MalformedDiff(format!(
                "unexpected diff line: {line}"
            )));
        }
    }

    if hunks.is_empty() {
        return Err(PatchError::MalformedDiff("no hunks found".into()));
    }
    Ok(hunks)
}

/// Extract the 1-based old-file start line from a `-a,b +c,d` hunk header.
fn parse_old_start(header: &str) -> Option<usize> {
    let token = header
        .split_whitespace()
        .find(|t| t.starts_with('-'))?
        .trim_start_matches('-');
    let count = token.split(',').next()?;
    count.parse().ok()
}

/// Result of applying hunks in memory.
#[derive(Debug)]
pub(crate) struct Applied {
    pub content: String,
    pub lines_added: usize,
    pub lines_removed: usize,
    pub warnings: Vec<String>,
    pub failed_hunks: usize,
}

/// Apply parsed hunks to the old content.
pub(crate) fn apply(old: &str, hunks: &[Hunk]) -> Applied {
    let old_lines: Vec<&str> = if old.is_empty() {
        Vec::new()
    } else {
        old.lines().collect()
    };
    let trailing_newline = old.is_empty() || old.ends_with('\n');

    let mut out: Vec<String> = Vec::new();
    let mut pos = 0usize;
    let mut lines_added = 0;
    let mut lines_removed = 0;
    let mut warnings = Vec::new();
    let mut failed_hunks = 0;

    for (index, hunk) in hunks.iter().enumerate() {
        let pre = hunk.pre_image();
        let declared = hunk.old_start.saturating_sub(1).max(pos);

        let target = if matches_at(&old_lines, declared, &pre) {
            Some(declared)
        } else {
            // Context drifted; search forward from the current position.
            (pos..=old_lines.len().saturating_sub(pre.len()))
                .find(|&i| matches_at(&old_lines, i, &pre))
        };

        let Some(target) = target else {
            failed_hunks += 1;
            warnings.push(format!(
                "hunk {} could not be applied: context not found near line {}",
                index + 1,
                hunk.old_start,
            ));
            continue;
        };

        // Copy unchanged lines up to the hunk.
        for line in &old_lines[pos..target] {
            out.push((*line).to_string());
        }
        pos = target;

        for line in &hunk.lines {
            match line {
                HunkLine::Context(s) => {
                    out.push(s.clone());
                    pos += 1;
                }
                HunkLine::Remove(_) => {
                    pos += 1;
                    lines_removed += 1;
                }
                HunkLine::Add(s) => {
                    out.push(s.clone());
                    lines_added += 1;
                }
            }
        }
    }

    // Copy the remainder.
    for line in &old_lines[pos..] {
        out.push((*line).to_string());
    }

    let mut content = out.join("\n");
    if trailing_newline && !content.is_empty() {
        content.push('\n');
    }

    Applied {
        content,
        lines_added,
        lines_removed,
        warnings,
        failed_hunks,
    }
}

fn matches_at(old_lines: &[&str], at: usize, pre: &[&str]) -> bool {
    if pre.is_empty() {
        return at <= old_lines.len();
    }
    if at + pre.len() > old_lines.len() {
        return false;
    }
    pre.iter()
        .enumerate()
        .all(|(i, expected)| old_lines[at + i] == *expected)
}

#[cfg(test)]
#[path = "hunk_tests.rs"]
mod tests;
