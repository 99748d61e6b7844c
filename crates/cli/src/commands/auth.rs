// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Stores the shared key and server URL in the user config file.

use crate::client::{load_config, save_config};
use clap::Subcommand;

#[derive(Subcommand)]
pub enum AuthCommand {
    /// Store the shared key (and optionally the server URL)
    Login {
        /// Shared key expected by the server
        #[arg(long)]
        key: String,
    },
    /// Forget the stored credentials
    Logout,
}

pub fn auth(server: Option<&str>, command: AuthCommand) -> anyhow::Result<()> {
    match command {
        AuthCommand::Login { key } => {
            let mut config = load_config()?;
            config.shared_key = Some(key);
            if let Some(server) = server {
                config.server = Some(server.to_string());
            }
            let path = save_config(&config)?;
            println!("credentials saved to {}", path.display());
            Ok(())
        }
        AuthCommand::Logout => {
            let mut config = load_config()?;
            config.shared_key = None;
            let path = save_config(&config)?;
            println!("credentials cleared from {}", path.display());
            Ok(())
        }
    }
}
