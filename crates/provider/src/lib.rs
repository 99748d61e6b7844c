// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! LLM provider capability for the gm agent runtime
//!
//! The runtime consumes providers through the [`Provider`] trait; concrete
//! vendor adapters live outside the core. [`ScriptedProvider`] replays
//! canned responses for dev mode and tests.

mod scripted;

pub use scripted::{ScriptedProvider, ScriptedResponse};

use async_trait::async_trait;
use futures::stream::BoxStream;
use gm_core::{ContextMessage, ToolCall, Usage};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Errors from provider calls
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("provider request failed: {0}")]
    Request(String),
    #[error("provider protocol error: {0}")]
    Protocol(String),
    #[error("streaming not supported by provider {0}")]
    StreamingUnsupported(String),
}

/// Tool advertised to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// One completion request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderRequest {
    pub model: String,
    pub messages: Vec<ContextMessage>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

/// One completion response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub model: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    #[serde(default)]
    pub usage: Usage,
}

/// One increment of a streamed completion.
#[derive(Debug, Clone, Default)]
pub struct StreamChunk {
    pub content: Option<String>,
    pub tool_calls: Vec<ToolCall>,
}

/// A lazy, finite stream of completion chunks.
pub type ChunkStream = BoxStream<'static, Result<StreamChunk, ProviderError>>;

/// Capability contract every model backend implements.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Stable identifier (e.g. "scripted", "openai").
    fn id(&self) -> &str;

    /// One synchronous completion.
    async fn call(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError>;

    /// Streaming completion; chunks arrive lazily and the stream is finite.
    async fn call_stream(&self, request: ProviderRequest) -> Result<ChunkStream, ProviderError>;
}
