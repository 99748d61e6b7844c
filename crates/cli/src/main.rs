// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! gmcli: client for the gm agent runtime server

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod client;
mod commands;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "gmcli", version, about = "Client for the gm agent runtime")]
struct Cli {
    /// Server base URL (overrides the stored config)
    #[arg(long, global = true)]
    server: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// One-shot run: create a session, stream events, exit when it ends
    Run {
        /// The prompt to hand to the agent
        prompt: String,
        /// Optional system prompt
        #[arg(long)]
        system: Option<String>,
    },
    /// Check server health
    Health,
    /// Print client version
    Version,
    /// Authentication helpers
    Auth {
        #[command(subcommand)]
        command: commands::auth::AuthCommand,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Run { prompt, system } => {
            let client = client::Client::from_config(cli.server.as_deref())?;
            commands::run::run(&client, &prompt, system.as_deref()).await
        }
        Command::Health => {
            let client = client::Client::from_config(cli.server.as_deref())?;
            commands::health::health(&client).await
        }
        Command::Version => {
            println!("gmcli {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        Command::Auth { command } => commands::auth::auth(cli.server.as_deref(), command),
    }
}
