// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for the engine runtime

use crate::reducer::ReducerError;
use gm_storage::StoreError;
use thiserror::Error;

/// Errors that terminate a session's run loop
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("reducer error: {0}")]
    Reducer(#[from] ReducerError),
    #[error("step budget of {0} exceeded")]
    MaxStepsExceeded(u32),
}

impl RuntimeError {
    /// True when the loop stopped on its step-budget circuit breaker.
    pub fn is_max_steps(&self) -> bool {
        matches!(self, RuntimeError::MaxStepsExceeded(_))
    }
}
