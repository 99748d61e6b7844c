// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! JSONL event log with per-append fsync.
//!
//! Each entry is a single line of JSON. Appends are durable before they
//! return; batch appends pay one fsync for the whole batch. On read, a
//! parse failure on the final line is treated as a torn tail from a crash
//! and the scan stops there; a parse failure mid-file stops the scan with a
//! warning (entries past the corruption are unreachable anyway).

use gm_core::Event;
use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;

/// Errors from event log operations
#[derive(Debug, Error)]
pub enum EventLogError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Append-only JSONL event log.
pub struct EventLog {
    file: File,
    path: PathBuf,
}

impl EventLog {
    /// Open or create the log at the given path.
    pub fn open(path: &Path) -> Result<Self, EventLogError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(path)?;
        Ok(Self {
            file,
            path: path.to_owned(),
        })
    }

    /// Append one event; durable when this returns.
    pub fn append(&mut self, event: &Event) -> Result<(), EventLogError> {
        self.write_line(event)?;
        self.file.sync_all()?;
        Ok(())
    }

    /// Append a batch of events with a single fsync.
    ///
    /// This is the atomicity unit for a dispatched command: either all of
    /// its events are durable or (after a crash) the tail is torn and the
    /// reader drops the partial line.
    pub fn append_batch(&mut self, events: &[Event]) -> Result<(), EventLogError> {
        if events.is_empty() {
            return Ok(());
        }
        for event in events {
            self.write_line(event)?;
        }
        self.file.sync_all()?;
        Ok(())
    }

    fn write_line(&mut self, event: &Event) -> Result<(), EventLogError> {
        let mut bytes = serde_json::to_vec(event)?;
        bytes.push(b'\n');
        self.file.write_all(&bytes)?;
        Ok(())
    }

    /// Visit every event in append order.
    pub fn for_each(&self, mut f: impl FnMut(Event)) -> Result<(), EventLogError> {
        let mut reader = BufReader::new(self.file.try_clone()?);
        reader.seek(SeekFrom::Start(0))?;

        let mut line = String::new();
        let mut offset = 0u64;
        loop {
            line.clear();
            let bytes_read = match reader.read_line(&mut line) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::InvalidData => break,
                Err(e) => return Err(e.into()),
            };

            let trimmed = line.trim();
            if trimmed.is_empty() {
                offset += bytes_read as u64;
                continue;
            }

            match serde_json::from_str::<Event>(trimmed) {
                Ok(event) => f(event),
                Err(e) => {
                    // Torn tail from a crash, or corruption: stop the scan.
                    warn!(
                        path = %self.path.display(),
                        offset,
                        error = %e,
                        "unparseable event log line, stopping scan",
                    );
                    break;
                }
            }
            offset += bytes_read as u64;
        }
        Ok(())
    }

    /// Collect every event in append order.
    pub fn read_all(&self) -> Result<Vec<Event>, EventLogError> {
        let mut events = Vec::new();
        self.for_each(|e| events.push(e))?;
        Ok(events)
    }

    /// Events with an ID strictly greater than `after_id`.
    ///
    /// Event IDs are ULID-based so lexicographic order is append order;
    /// an empty `after_id` returns everything from the origin.
    pub fn events_since(&self, after_id: &str) -> Result<Vec<Event>, EventLogError> {
        let mut events = Vec::new();
        self.for_each(|e| {
            if e.id.as_str() > after_id {
                events.push(e);
            }
        })?;
        Ok(events)
    }
}

#[cfg(test)]
#[path = "event_log_tests.rs"]
mod tests;
