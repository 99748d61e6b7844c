// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! One-shot run: create a session, stream it to the terminal, exit on
//! `session_ended`.

use crate::client::{Client, StreamFrame};
use serde_json::Value;
use std::io::Write;

pub async fn run(client: &Client, prompt: &str, system: Option<&str>) -> anyhow::Result<()> {
    let session_id = client.create_session(prompt, system).await?;
    eprintln!("session {session_id}");

    let mut streamed_tokens = false;
    client
        .stream_events(&session_id, |frame| {
            render(frame, &mut streamed_tokens);
        })
        .await?;
    Ok(())
}

/// Render one frame to the terminal.
///
/// Token deltas are written inline; everything else gets its own line.
fn render(frame: &StreamFrame, streamed_tokens: &mut bool) {
    let finish_tokens = |streamed: &mut bool| {
        if *streamed {
            println!();
            *streamed = false;
        }
    };

    match frame.event.as_str() {
        "connected" => {}
        "llm:token" => {
            if let Some(delta) = frame.data.get("delta").and_then(Value::as_str) {
                print!("{delta}");
                let _ = std::io::stdout().flush();
                *streamed_tokens = true;
            }
        }
        "llm:response" => {
            // Content already arrived as tokens when streaming; print it
            // only when it didn't.
            let content = frame
                .data
                .get("content")
                .and_then(Value::as_str)
                .unwrap_or_default();
            if *streamed_tokens {
                finish_tokens(streamed_tokens);
            } else if !content.trim().is_empty() {
                println!("{content}");
            }
            let calls = frame
                .data
                .get("tool_calls")
                .and_then(Value::as_array)
                .map(Vec::as_slice)
                .unwrap_or_default();
            for call in calls {
                if let Some(name) = call.get("name").and_then(Value::as_str) {
                    eprintln!("→ {name}");
                }
            }
        }
        "tool:result" => {
            finish_tokens(streamed_tokens);
            let tool = frame
                .data
                .get("tool_name")
                .and_then(Value::as_str)
                .unwrap_or("tool");
            let success = frame
                .data
                .get("success")
                .and_then(Value::as_bool)
                .unwrap_or(false);
            if success {
                eprintln!("✓ {tool}");
            } else {
                let error = frame
                    .data
                    .get("error")
                    .and_then(Value::as_str)
                    .unwrap_or("failed");
                eprintln!("✗ {tool}: {error}");
            }
        }
        "permission:request" => {
            finish_tokens(streamed_tokens);
            let tool = frame
                .data
                .get("tool_name")
                .and_then(Value::as_str)
                .unwrap_or("tool");
            let request = frame
                .data
                .get("request_id")
                .and_then(Value::as_str)
                .unwrap_or("");
            eprintln!("! permission requested for {tool} (request {request})");
            eprintln!("  respond via POST /session/<id>/permission");
        }
        "runtime:error" => {
            finish_tokens(streamed_tokens);
            let error = frame
                .data
                .get("error")
                .and_then(Value::as_str)
                .unwrap_or("unknown error");
            eprintln!("error: {error}");
        }
        "session_ended" => {
            finish_tokens(streamed_tokens);
            let status = frame
                .data
                .get("status")
                .and_then(Value::as_str)
                .unwrap_or("unknown");
            eprintln!("session ended: {status}");
        }
        _ => {}
    }
}
