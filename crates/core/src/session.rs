// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session identifier type
//!
//! A session is a client-facing conversation with its own store directory
//! and runtime. The ID doubles as the store directory name.

crate::define_id! {
    /// Unique identifier for a session.
    pub struct SessionId, "ses";
}
