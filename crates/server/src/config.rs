// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Server configuration
//!
//! Sources, lowest to highest precedence: built-in defaults, the YAML
//! config file, `.env`, then `GM_*` environment variables. CLI flags pick
//! the config file; everything else rides these layers.

use gm_engine::SecurityConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors from configuration loading
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid config file: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8848
}

fn default_provider() -> String {
    "scripted".to_string()
}

fn default_model() -> String {
    "gm-default".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_data_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".local/state/gm")
}

fn default_max_steps() -> u32 {
    50
}

fn default_checkpoint_interval() -> u32 {
    5
}

fn default_decision_timeout_secs() -> u64 {
    30
}

fn default_dispatch_timeout_secs() -> u64 {
    120
}

/// HTTP binding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Active provider selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Provider name; `scripted` is built in, vendor adapters register
    /// under their own names.
    #[serde(default = "default_provider")]
    pub active: String,
    #[serde(default = "default_model")]
    pub model: String,
    /// Per-provider options passed through to the adapter.
    #[serde(default)]
    pub options: serde_json::Map<String, serde_json::Value>,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            active: default_provider(),
            model: default_model(),
            options: Default::default(),
        }
    }
}

/// Security flags.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SecuritySection {
    #[serde(default)]
    pub auto_approve: bool,
    #[serde(default)]
    pub allowed_tools: Vec<String>,
    #[serde(default)]
    pub allow_fs: bool,
    #[serde(default)]
    pub allow_net: bool,
    /// Workspace the patch engine is rooted at; defaults to the current
    /// directory.
    #[serde(default)]
    pub workspace_root: Option<PathBuf>,
}

impl SecuritySection {
    /// The policy-facing subset.
    pub fn to_policy_config(&self) -> SecurityConfig {
        SecurityConfig {
            auto_approve: self.auto_approve,
            allowed_tools: self.allowed_tools.clone(),
            allow_fs: self.allow_fs,
            allow_net: self.allow_net,
        }
    }
}

/// Runtime loop tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeSection {
    #[serde(default = "default_max_steps")]
    pub max_steps: u32,
    #[serde(default = "default_checkpoint_interval")]
    pub checkpoint_interval: u32,
    #[serde(default = "default_decision_timeout_secs")]
    pub decision_timeout_secs: u64,
    #[serde(default = "default_dispatch_timeout_secs")]
    pub dispatch_timeout_secs: u64,
}

impl Default for RuntimeSection {
    fn default() -> Self {
        Self {
            max_steps: default_max_steps(),
            checkpoint_interval: default_checkpoint_interval(),
            decision_timeout_secs: default_decision_timeout_secs(),
            dispatch_timeout_secs: default_dispatch_timeout_secs(),
        }
    }
}

impl RuntimeSection {
    pub fn to_runtime_config(&self, model: &str) -> gm_engine::RuntimeConfig {
        gm_engine::RuntimeConfig {
            max_steps: self.max_steps,
            checkpoint_interval: self.checkpoint_interval,
            decision_timeout: std::time::Duration::from_secs(self.decision_timeout_secs),
            dispatch_timeout: std::time::Duration::from_secs(self.dispatch_timeout_secs),
            model: model.to_string(),
        }
    }
}

/// Complete server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub provider: ProviderConfig,
    /// Shared API key; the API is open when unset (local dev).
    #[serde(default)]
    pub shared_key: Option<String>,
    #[serde(default)]
    pub security: SecuritySection,
    #[serde(default)]
    pub runtime: RuntimeSection,
    #[serde(default)]
    pub dev_mode: bool,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http: HttpConfig::default(),
            provider: ProviderConfig::default(),
            shared_key: None,
            security: SecuritySection::default(),
            runtime: RuntimeSection::default(),
            dev_mode: false,
            log_level: default_log_level(),
            data_dir: default_data_dir(),
        }
    }
}

impl ServerConfig {
    /// Load configuration: defaults ← YAML file ← `.env` ← `GM_*` env.
    pub fn load(file: Option<&Path>) -> Result<Self, ConfigError> {
        // `.env` only fills process env vars that are not already set, so
        // real environment variables keep precedence.
        let _ = dotenv::dotenv();

        let mut config = match file {
            Some(path) => Self::from_file(path)?,
            None => {
                let default_path = Path::new("gm.yaml");
                if default_path.exists() {
                    Self::from_file(default_path)?
                } else {
                    Self::default()
                }
            }
        };

        config.apply_env()?;
        Ok(config)
    }

    fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&raw)?)
    }

    /// Overlay `GM_*` environment variables.
    fn apply_env(&mut self) -> Result<(), ConfigError> {
        if let Some(host) = env_var("GM_HTTP_HOST") {
            self.http.host = host;
        }
        if let Some(port) = env_var("GM_HTTP_PORT") {
            self.http.port = port.parse().map_err(|_| ConfigError::InvalidValue {
                key: "GM_HTTP_PORT".into(),
                value: port,
            })?;
        }
        if let Some(key) = env_var("GM_SHARED_KEY") {
            self.shared_key = Some(key);
        }
        if let Some(provider) = env_var("GM_PROVIDER") {
            self.provider.active = provider;
        }
        if let Some(model) = env_var("GM_MODEL") {
            self.provider.model = model;
        }
        if let Some(value) = env_var("GM_AUTO_APPROVE") {
            self.security.auto_approve = parse_bool("GM_AUTO_APPROVE", &value)?;
        }
        if let Some(tools) = env_var("GM_ALLOWED_TOOLS") {
            self.security.allowed_tools = tools
                .split(',')
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
                .collect();
        }
        if let Some(value) = env_var("GM_ALLOW_FS") {
            self.security.allow_fs = parse_bool("GM_ALLOW_FS", &value)?;
        }
        if let Some(value) = env_var("GM_ALLOW_NET") {
            self.security.allow_net = parse_bool("GM_ALLOW_NET", &value)?;
        }
        if let Some(root) = env_var("GM_WORKSPACE_ROOT") {
            self.security.workspace_root = Some(PathBuf::from(root));
        }
        if let Some(value) = env_var("GM_DEV_MODE") {
            self.dev_mode = parse_bool("GM_DEV_MODE", &value)?;
        }
        if let Some(level) = env_var("GM_LOG_LEVEL") {
            self.log_level = level;
        }
        if let Some(dir) = env_var("GM_DATA_DIR") {
            self.data_dir = PathBuf::from(dir);
        }
        Ok(())
    }

    /// Workspace root for the patch engine.
    pub fn workspace_root(&self) -> PathBuf {
        self.security
            .workspace_root
            .clone()
            .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")))
    }
}

fn env_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key: key.into(),
            value: value.into(),
        }),
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
