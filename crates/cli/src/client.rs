// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP client for the gm server, including the SSE event stream.

use anyhow::{bail, Context};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::PathBuf;

const DEFAULT_SERVER: &str = "http://127.0.0.1:8848";

/// Stored client configuration (`~/.config/gm/cli.yaml`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CliConfig {
    #[serde(default)]
    pub server: Option<String>,
    #[serde(default)]
    pub shared_key: Option<String>,
}

/// Location of the stored client configuration.
pub fn config_path() -> anyhow::Result<PathBuf> {
    let home = std::env::var_os("HOME").context("HOME is not set")?;
    Ok(PathBuf::from(home).join(".config/gm/cli.yaml"))
}

pub fn load_config() -> anyhow::Result<CliConfig> {
    let path = config_path()?;
    if !path.exists() {
        return Ok(CliConfig::default());
    }
    let raw = std::fs::read_to_string(&path)?;
    Ok(serde_yaml::from_str(&raw)?)
}

pub fn save_config(config: &CliConfig) -> anyhow::Result<PathBuf> {
    let path = config_path()?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&path, serde_yaml::to_string(config)?)?;
    Ok(path)
}

/// One frame from the event stream.
#[derive(Debug, Clone)]
pub struct StreamFrame {
    pub event: String,
    pub data: Value,
}

/// HTTP client bound to one server.
pub struct Client {
    http: reqwest::Client,
    base_url: String,
    shared_key: Option<String>,
}

impl Client {
    /// Build from the stored config, with an optional server override.
    pub fn from_config(server_override: Option<&str>) -> anyhow::Result<Self> {
        let config = load_config()?;
        let base_url = server_override
            .map(str::to_string)
            .or(config.server)
            .unwrap_or_else(|| DEFAULT_SERVER.to_string());
        Ok(Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            shared_key: config.shared_key,
        })
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let mut builder = self.http.request(method, format!("{}{path}", self.base_url));
        if let Some(key) = &self.shared_key {
            builder = builder.header("x-gm-key", key);
        }
        builder
    }

    pub async fn health(&self) -> anyhow::Result<Value> {
        let response = self
            .request(reqwest::Method::GET, "/health")
            .send()
            .await
            .with_context(|| format!("could not reach {}", self.base_url))?;
        Ok(response.error_for_status()?.json().await?)
    }

    /// Create a session; returns its ID.
    pub async fn create_session(
        &self,
        prompt: &str,
        system_prompt: Option<&str>,
    ) -> anyhow::Result<String> {
        let body = serde_json::json!({
            "prompt": prompt,
            "system_prompt": system_prompt,
            "priority": 1,
        });
        let response = self
            .request(reqwest::Method::POST, "/session")
            .json(&body)
            .send()
            .await?
            .error_for_status()?;
        let value: Value = response.json().await?;
        match value.get("id").and_then(Value::as_str) {
            Some(id) => Ok(id.to_string()),
            None => bail!("server did not return a session id: {value}"),
        }
    }

    /// Stream session events, invoking the callback per frame.
    ///
    /// Returns when the server sends `session_ended` (the terminal frame is
    /// passed to the callback first) or the connection closes.
    pub async fn stream_events(
        &self,
        session_id: &str,
        mut on_frame: impl FnMut(&StreamFrame),
    ) -> anyhow::Result<()> {
        let response = self
            .request(
                reqwest::Method::GET,
                &format!("/session/{session_id}/event"),
            )
            .send()
            .await?
            .error_for_status()?;

        let mut body = response.bytes_stream();
        let mut buffer = String::new();

        while let Some(chunk) = body.next().await {
            let chunk = chunk?;
            buffer.push_str(&String::from_utf8_lossy(&chunk));

            // SSE frames are separated by a blank line.
            while let Some(end) = buffer.find("\n\n") {
                let block: String = buffer.drain(..end + 2).collect();
                if let Some(frame) = parse_frame(&block) {
                    let ended = frame.event == "session_ended";
                    on_frame(&frame);
                    if ended {
                        return Ok(());
                    }
                }
            }
        }
        Ok(())
    }
}

/// Parse one SSE block into a frame.
fn parse_frame(block: &str) -> Option<StreamFrame> {
    let mut event = None;
    let mut data = String::new();
    for line in block.lines() {
        if let Some(rest) = line.strip_prefix("event:") {
            event = Some(rest.trim().to_string());
        } else if let Some(rest) = line.strip_prefix("data:") {
            if !data.is_empty() {
                data.push('\n');
            }
            data.push_str(rest.trim_start());
        }
    }
    let event = event?;
    let data = serde_json::from_str(&data).unwrap_or(Value::Null);
    Some(StreamFrame { event, data })
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;
