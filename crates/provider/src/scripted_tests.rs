// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::ProviderRequest;
use futures::StreamExt;
use gm_core::ContextMessage;

fn user_message(content: &str) -> ContextMessage {
    ContextMessage {
        id: "msg_1".into(),
        role: Role::User,
        content: content.into(),
        tool_calls: Vec::new(),
        tool_call_id: None,
        tool_name: None,
        token_count: estimate_tokens(content),
        timestamp: chrono::DateTime::UNIX_EPOCH,
    }
}

fn request(content: &str) -> ProviderRequest {
    ProviderRequest {
        model: "test-model".into(),
        messages: vec![user_message(content)],
        tools: Vec::new(),
        max_tokens: None,
        temperature: None,
    }
}

#[tokio::test]
async fn trigger_selects_the_script() {
    let provider = ScriptedProvider::new()
        .on("finish", ScriptedResponse::tool_call("task_complete", "{}"))
        .fallback(ScriptedResponse::text("fallback"));

    let response = provider.call(request("please finish now")).await.unwrap();
    assert_eq!(response.tool_calls.len(), 1);
    assert_eq!(response.tool_calls[0].name, "task_complete");

    let response = provider.call(request("anything else")).await.unwrap();
    assert_eq!(response.content, "fallback");
}

#[tokio::test]
async fn usage_is_estimated() {
    let provider = ScriptedProvider::new().fallback(ScriptedResponse::text("four"));
    let response = provider.call(request("a prompt")).await.unwrap();
    assert!(response.usage.prompt_tokens > 0);
    assert_eq!(response.usage.completion_tokens, 1);
    assert_eq!(
        response.usage.total_tokens,
        response.usage.prompt_tokens + response.usage.completion_tokens
    );
}

#[tokio::test]
async fn stream_reassembles_to_the_full_content() {
    let provider =
        ScriptedProvider::new().fallback(ScriptedResponse::text("a longer streamed answer"));

    let mut stream = provider.call_stream(request("hi")).await.unwrap();
    let mut content = String::new();
    let mut chunk_count = 0;
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.unwrap();
        if let Some(delta) = chunk.content {
            content.push_str(&delta);
        }
        chunk_count += 1;
    }
    assert_eq!(content, "a longer streamed answer");
    assert!(chunk_count > 1);
}

#[tokio::test]
async fn stream_carries_tool_calls_in_final_chunk() {
    let provider = ScriptedProvider::new()
        .fallback(ScriptedResponse::tool_call("task_complete", "{}"));

    let mut stream = provider.call_stream(request("hi")).await.unwrap();
    let mut calls = Vec::new();
    while let Some(chunk) = stream.next().await {
        calls.extend(chunk.unwrap().tool_calls);
    }
    assert_eq!(calls.len(), 1);
}

#[tokio::test]
async fn without_streaming_fails_call_stream() {
    let provider = ScriptedProvider::new().without_streaming();
    assert!(provider.call_stream(request("hi")).await.is_err());
    assert!(provider.call(request("hi")).await.is_ok());
}
