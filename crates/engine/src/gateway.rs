// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! LLM gateway
//!
//! Thin translation between runtime types and the [`Provider`] capability:
//! fill request defaults, forward the call. No retry, no caching, no model
//! routing.

use gm_core::command::ToolDescriptor;
use gm_core::ContextMessage;
use gm_provider::{ChunkStream, Provider, ProviderError, ProviderRequest, ProviderResponse, ToolSpec};
use std::sync::Arc;

const DEFAULT_TEMPERATURE: f32 = 0.7;

/// Gateway over one configured provider.
#[derive(Clone)]
pub struct Gateway {
    provider: Arc<dyn Provider>,
}

impl Gateway {
    pub fn new(provider: Arc<dyn Provider>) -> Self {
        Self { provider }
    }

    pub fn provider_id(&self) -> &str {
        self.provider.id()
    }

    fn build_request(
        &self,
        model: &str,
        messages: Vec<ContextMessage>,
        tools: Vec<ToolDescriptor>,
    ) -> ProviderRequest {
        ProviderRequest {
            model: model.to_string(),
            messages,
            tools: tools
                .into_iter()
                .map(|t| ToolSpec {
                    name: t.name,
                    description: t.description,
                    parameters: t.parameters,
                })
                .collect(),
            max_tokens: None,
            temperature: Some(DEFAULT_TEMPERATURE),
        }
    }

    /// One synchronous completion.
    pub async fn call(
        &self,
        model: &str,
        messages: Vec<ContextMessage>,
        tools: Vec<ToolDescriptor>,
    ) -> Result<ProviderResponse, ProviderError> {
        let request = self.build_request(model, messages, tools);
        self.provider.call(request).await
    }

    /// Streaming completion.
    pub async fn call_stream(
        &self,
        model: &str,
        messages: Vec<ContextMessage>,
        tools: Vec<ToolDescriptor>,
    ) -> Result<ChunkStream, ProviderError> {
        let request = self.build_request(model, messages, tools);
        self.provider.call_stream(request).await
    }
}

#[cfg(test)]
#[path = "gateway_tests.rs"]
mod tests;
