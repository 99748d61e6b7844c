// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use gm_core::{Event, MessageSemantic, SystemClock};
use std::io::Write as _;
use tempfile::tempdir;

fn user_event(content: &str) -> Event {
    Event::user_message(content, 1, MessageSemantic::Append, &SystemClock)
}

#[test]
fn append_then_read_round_trips() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("events.jsonl");
    let mut log = EventLog::open(&path).unwrap();

    let first = user_event("one");
    let second = user_event("two");
    log.append(&first).unwrap();
    log.append(&second).unwrap();

    let events = log.read_all().unwrap();
    assert_eq!(events, vec![first, second]);
}

#[test]
fn batch_append_preserves_order() {
    let dir = tempdir().unwrap();
    let mut log = EventLog::open(&dir.path().join("events.jsonl")).unwrap();

    let batch: Vec<Event> = (0..5).map(|i| user_event(&format!("m{i}"))).collect();
    log.append_batch(&batch).unwrap();

    assert_eq!(log.read_all().unwrap(), batch);
}

#[test]
fn events_since_filters_by_id() {
    let dir = tempdir().unwrap();
    let mut log = EventLog::open(&dir.path().join("events.jsonl")).unwrap();

    let first = user_event("one");
    std::thread::sleep(std::time::Duration::from_millis(2));
    let second = user_event("two");
    log.append(&first).unwrap();
    log.append(&second).unwrap();

    let since = log.events_since(first.id.as_str()).unwrap();
    assert_eq!(since, vec![second.clone()]);

    // Empty cursor returns everything from the origin.
    assert_eq!(log.events_since("").unwrap().len(), 2);
    // Cursor past the end returns nothing.
    assert!(log.events_since(second.id.as_str()).unwrap().is_empty());
}

#[test]
fn torn_tail_is_dropped() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("events.jsonl");
    let mut log = EventLog::open(&path).unwrap();
    let first = user_event("one");
    log.append(&first).unwrap();
    drop(log);

    // Simulate a crash mid-append: a partial final line.
    let mut file = std::fs::OpenOptions::new()
        .append(true)
        .open(&path)
        .unwrap();
    file.write_all(b"{\"id\":\"evt_partial\",\"ty").unwrap();
    drop(file);

    let log = EventLog::open(&path).unwrap();
    let events = log.read_all().unwrap();
    assert_eq!(events, vec![first]);
}

#[test]
fn unknown_event_types_survive_the_scan() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("events.jsonl");
    let mut log = EventLog::open(&path).unwrap();
    log.append(&user_event("one")).unwrap();
    drop(log);

    let mut file = std::fs::OpenOptions::new()
        .append(true)
        .open(&path)
        .unwrap();
    file.write_all(
        b"{\"id\":\"evt_x\",\"timestamp\":\"2026-01-01T00:00:00Z\",\"actor\":\"system\",\"type\":\"future:event\"}\n",
    )
    .unwrap();
    drop(file);

    let log = EventLog::open(&path).unwrap();
    let events = log.read_all().unwrap();
    assert_eq!(events.len(), 2);
    assert_eq!(events[1].payload, gm_core::EventPayload::Unknown);
}
