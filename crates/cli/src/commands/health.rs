// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use crate::client::Client;
use serde_json::Value;

pub async fn health(client: &Client) -> anyhow::Result<()> {
    let value = client.health().await?;
    let status = value
        .get("status")
        .and_then(Value::as_str)
        .unwrap_or("unknown");
    let version = value
        .get("version")
        .and_then(Value::as_str)
        .unwrap_or("unknown");
    println!("{status} (server {version})");
    Ok(())
}
