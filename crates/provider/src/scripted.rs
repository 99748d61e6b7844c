// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scripted provider for dev mode and tests.
//!
//! Responses are keyed by a substring of the most recent user message; the
//! first matching script wins. Streaming splits the content into small
//! chunks so the token path gets exercised end to end.

use crate::{
    ChunkStream, Provider, ProviderError, ProviderRequest, ProviderResponse, StreamChunk,
};
use async_trait::async_trait;
use futures::stream;
use gm_core::{estimate_tokens, Role, ToolCall, Usage};
use serde::{Deserialize, Serialize};

/// One canned response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScriptedResponse {
    #[serde(default)]
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
}

impl ScriptedResponse {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            tool_calls: Vec::new(),
        }
    }

    pub fn tool_call(name: impl Into<String>, arguments: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            content: String::new(),
            tool_calls: vec![ToolCall {
                id: format!("call_{name}"),
                name,
                arguments: arguments.into(),
            }],
        }
    }
}

/// Provider that replays canned responses.
#[derive(Debug, Default)]
pub struct ScriptedProvider {
    scripts: Vec<(String, ScriptedResponse)>,
    fallback: ScriptedResponse,
    /// When true, `call_stream` fails so callers exercise the sync
    /// fallback path.
    fail_streaming: bool,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self {
            scripts: Vec::new(),
            fallback: ScriptedResponse::text("ok"),
            fail_streaming: false,
        }
    }

    /// Respond with `response` when the latest user message contains
    /// `trigger`.
    pub fn on(mut self, trigger: impl Into<String>, response: ScriptedResponse) -> Self {
        self.scripts.push((trigger.into(), response));
        self
    }

    /// Response used when no trigger matches.
    pub fn fallback(mut self, response: ScriptedResponse) -> Self {
        self.fallback = response;
        self
    }

    /// Make `call_stream` fail so callers fall back to `call`.
    pub fn without_streaming(mut self) -> Self {
        self.fail_streaming = true;
        self
    }

    fn respond(&self, request: &ProviderRequest) -> ProviderResponse {
        let last_user = request
            .messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
            .unwrap_or_default();

        let script = self
            .scripts
            .iter()
            .find(|(trigger, _)| last_user.contains(trigger.as_str()))
            .map(|(_, response)| response)
            .unwrap_or(&self.fallback);

        let prompt_tokens: u32 = request
            .messages
            .iter()
            .map(|m| estimate_tokens(&m.content))
            .sum();
        let completion_tokens = estimate_tokens(&script.content);

        ProviderResponse {
            id: None,
            model: request.model.clone(),
            content: script.content.clone(),
            tool_calls: script.tool_calls.clone(),
            usage: Usage {
                prompt_tokens,
                completion_tokens,
                total_tokens: prompt_tokens + completion_tokens,
            },
        }
    }
}

/// Size of streamed content chunks.
const CHUNK_LEN: usize = 8;

#[async_trait]
impl Provider for ScriptedProvider {
    fn id(&self) -> &str {
        "scripted"
    }

    async fn call(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        Ok(self.respond(&request))
    }

    async fn call_stream(&self, request: ProviderRequest) -> Result<ChunkStream, ProviderError> {
        if self.fail_streaming {
            return Err(ProviderError::StreamingUnsupported("scripted".into()));
        }

        let response = self.respond(&request);
        let mut chunks: Vec<Result<StreamChunk, ProviderError>> = Vec::new();

        let content: Vec<char> = response.content.chars().collect();
        for piece in content.chunks(CHUNK_LEN) {
            chunks.push(Ok(StreamChunk {
                content: Some(piece.iter().collect()),
                tool_calls: Vec::new(),
            }));
        }
        if !response.tool_calls.is_empty() {
            chunks.push(Ok(StreamChunk {
                content: None,
                tool_calls: response.tool_calls.clone(),
            }));
        }

        Ok(Box::pin(stream::iter(chunks)))
    }
}

#[cfg(test)]
#[path = "scripted_tests.rs"]
mod tests;
