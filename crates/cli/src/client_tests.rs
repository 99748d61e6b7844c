// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn parse_frame_extracts_event_and_data() {
    let frame = parse_frame("event: tool:result\ndata: {\"success\":true}\n\n").unwrap();
    assert_eq!(frame.event, "tool:result");
    assert_eq!(frame.data["success"], true);
}

#[test]
fn parse_frame_without_event_is_dropped() {
    assert!(parse_frame("data: {\"x\":1}\n\n").is_none());
    assert!(parse_frame(": keep-alive comment\n\n").is_none());
}

#[test]
fn parse_frame_tolerates_non_json_data() {
    let frame = parse_frame("event: connected\ndata: not json\n\n").unwrap();
    assert_eq!(frame.event, "connected");
    assert!(frame.data.is_null());
}

#[test]
fn parse_frame_joins_multiline_data() {
    let frame = parse_frame("event: x\ndata: {\"a\":\ndata: 1}\n\n").unwrap();
    assert_eq!(frame.data["a"], 1);
}

#[test]
fn cli_config_round_trips() {
    let config = CliConfig {
        server: Some("http://localhost:9999".into()),
        shared_key: Some("k".into()),
    };
    let yaml = serde_yaml::to_string(&config).unwrap();
    let back: CliConfig = serde_yaml::from_str(&yaml).unwrap();
    assert_eq!(back.server.as_deref(), Some("http://localhost:9999"));
    assert_eq!(back.shared_key.as_deref(), Some("k"));
}
