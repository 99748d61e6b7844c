// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! gm server binary
//!
//! `gm` starts the HTTP server on the configured address; `gm clean`
//! deletes the runtime working directory.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

use clap::{Parser, Subcommand};
use gm_engine::ToolRegistry;
use gm_provider::{Provider, ScriptedProvider, ScriptedResponse};
use gm_server::{router, AppState, ServerConfig, SessionFactory, SessionManager};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser)]
#[command(name = "gm", version, about = "gm agent runtime server")]
struct Cli {
    /// Path to the YAML config file (default: ./gm.yaml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<CliCommand>,
}

#[derive(Subcommand)]
enum CliCommand {
    /// Delete the runtime working directory
    Clean,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = ServerConfig::load(cli.config.as_deref())?;

    match cli.command {
        Some(CliCommand::Clean) => clean(&config),
        None => serve(config).await,
    }
}

fn clean(config: &ServerConfig) -> Result<(), Box<dyn std::error::Error>> {
    if config.data_dir.exists() {
        std::fs::remove_dir_all(&config.data_dir)?;
        println!("removed {}", config.data_dir.display());
    } else {
        println!("nothing to clean at {}", config.data_dir.display());
    }
    Ok(())
}

async fn serve(config: ServerConfig) -> Result<(), Box<dyn std::error::Error>> {
    let _log_guard = setup_logging(&config)?;

    info!(version = VERSION, "starting gm server");

    let provider = build_provider(&config)?;
    info!(provider = provider.id(), model = %config.provider.model, "provider configured");

    let registry = Arc::new(ToolRegistry::with_builtins());
    let manager = Arc::new(SessionManager::new(SessionFactory {
        data_dir: config.data_dir.clone(),
        provider,
        registry,
        security: config.security.to_policy_config(),
        workspace_root: config.workspace_root(),
        runtime_config: config.runtime.to_runtime_config(&config.provider.model),
    }));

    let state = AppState {
        manager: Arc::clone(&manager),
        shared_key: config.shared_key.clone(),
        version: VERSION,
    };
    if state.shared_key.is_none() {
        warn!("no shared key configured, the API is open");
    }

    let addr = format!("{}:{}", config.http.host, config.http.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(%addr, "listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal(manager))
        .await?;

    info!("server stopped");
    Ok(())
}

/// Build the configured provider.
///
/// Only the scripted provider is wired into the core; vendor adapters
/// register here when the binary is built with them.
fn build_provider(config: &ServerConfig) -> Result<Arc<dyn Provider>, Box<dyn std::error::Error>> {
    match config.provider.active.as_str() {
        "scripted" => {
            let mut provider = ScriptedProvider::new();
            // Scripts come from provider options: { "scripts": {"trigger": {...}} }
            if let Some(scripts) = config.provider.options.get("scripts") {
                let parsed: std::collections::BTreeMap<String, ScriptedResponse> =
                    serde_json::from_value(scripts.clone())?;
                for (trigger, response) in parsed {
                    provider = provider.on(trigger, response);
                }
            }
            Ok(Arc::new(provider))
        }
        other => Err(format!(
            "unknown provider {other:?}: this build only includes the scripted provider"
        )
        .into()),
    }
}

async fn shutdown_signal(manager: Arc<SessionManager>) {
    let _ = tokio::signal::ctrl_c().await;
    info!("shutdown signal received, cancelling sessions");
    manager.shutdown();
    // Session loops observe their cancel tokens and write their final
    // checkpoints; give them a moment before the process exits.
    tokio::time::sleep(std::time::Duration::from_millis(500)).await;
}

fn setup_logging(
    config: &ServerConfig,
) -> Result<tracing_appender::non_blocking::WorkerGuard, std::io::Error> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    std::fs::create_dir_all(&config.data_dir)?;
    let file_appender = tracing_appender::rolling::never(&config.data_dir, "gm.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.clone()));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(non_blocking))
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    Ok(guard)
}
