// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Storage layer for the gm agent runtime
//!
//! One [`Store`] per session, rooted at the session directory:
//!
//! ```text
//! <session-root>/
//!   events.jsonl          append-only event log, fsynced per append
//!   state/state.json      latest snapshot (atomic rename)
//!   checkpoints/          <unix-nanos>_<ckpt_id>.json
//!   artifacts/            <art_id>.json + optional <art_id>.blob
//!   permissions.json      persistent permission rules (atomic rename)
//! ```

mod artifacts;
mod checkpoints;
mod event_log;
mod rules;
mod snapshot;
mod store;

pub use event_log::{EventLog, EventLogError};
pub use snapshot::SnapshotError;
pub use store::{ArtifactFilter, Store, StoreError};
