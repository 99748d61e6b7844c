// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Permission rendezvous
//!
//! The executor registers a pending request and blocks on its receiver;
//! an external responder (a client over the event stream) deposits exactly
//! one decision. Stray responses with no registered waiter are rejected so
//! nothing is silently lost.

use gm_core::RequestId;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

/// A human decision on one permission request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PermissionDecision {
    pub approved: bool,
    /// Persist a rule so identical calls skip the prompt.
    pub always: bool,
}

/// Errors from depositing a response
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RespondError {
    #[error("no pending permission request with that id")]
    NotFound,
}

/// Errors from waiting for a response
#[derive(Debug, Error, PartialEq, Eq)]
pub enum WaitError {
    #[error("permission request timed out")]
    Timeout,
    #[error("session cancelled while waiting for permission")]
    Cancelled,
    #[error("permission request was not registered")]
    NotFound,
}

/// Rendezvous between the executor and an external responder.
#[derive(Default)]
pub struct PermissionManager {
    pending: Mutex<HashMap<RequestId, oneshot::Sender<PermissionDecision>>>,
}

impl PermissionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a request and return its single-item receiver.
    ///
    /// The channel is buffered: the responder never blocks on deposit.
    pub fn request(&self, id: RequestId) -> oneshot::Receiver<PermissionDecision> {
        let (tx, rx) = oneshot::channel();
        self.pending.lock().insert(id, tx);
        rx
    }

    /// Deposit a decision for a pending request.
    pub fn respond(&self, id: &RequestId, approved: bool, always: bool) -> Result<(), RespondError> {
        let sender = self
            .pending
            .lock()
            .remove(id)
            .ok_or(RespondError::NotFound)?;
        // The waiter may have timed out between lookup and send; that loss
        // is equivalent to responding after the timeout.
        let _ = sender.send(PermissionDecision { approved, always });
        Ok(())
    }

    /// Consume the receiver, bounded by a timeout and the session's cancel
    /// token. Unregisters the request on every exit path.
    pub async fn wait_for_response(
        &self,
        id: &RequestId,
        receiver: oneshot::Receiver<PermissionDecision>,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<PermissionDecision, WaitError> {
        let result = tokio::select! {
            _ = cancel.cancelled() => Err(WaitError::Cancelled),
            outcome = tokio::time::timeout(timeout, receiver) => match outcome {
                Err(_) => Err(WaitError::Timeout),
                Ok(Err(_)) => Err(WaitError::NotFound),
                Ok(Ok(decision)) => Ok(decision),
            },
        };
        self.pending.lock().remove(id);
        result
    }

    /// Number of requests currently awaiting a response.
    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }
}

#[cfg(test)]
#[path = "permission_tests.rs"]
mod tests;
