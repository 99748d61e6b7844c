// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use gm_core::{FileOperation, PatchId};

fn change(id: &str) -> FileChange {
    FileChange {
        patch_id: PatchId::new(id),
        file_path: "f.txt".into(),
        backup_path: "backup".into(),
        operation: FileOperation::Modify,
    }
}

#[test]
fn record_then_flush_drains() {
    let tracker = FileChangeTracker::new();
    tracker.record(change("pch_1"));
    tracker.record(change("pch_2"));

    assert_eq!(tracker.peek().len(), 2);

    let flushed = tracker.flush();
    assert_eq!(flushed.len(), 2);
    assert_eq!(flushed[0].patch_id, "pch_1");

    assert!(tracker.flush().is_empty());
    assert!(tracker.peek().is_empty());
}

#[test]
fn peek_does_not_drain() {
    let tracker = FileChangeTracker::new();
    tracker.record(change("pch_1"));
    assert_eq!(tracker.peek().len(), 1);
    assert_eq!(tracker.peek().len(), 1);
}
