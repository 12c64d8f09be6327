// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use thiserror::Error;

/// Errors surfaced by [`crate::CoordinationClient`] and its queue/election
/// primitives.
///
/// Two variants are "signals, not failures" per the coordination contract:
/// `AlreadyExists` on `create` and `DidNotExist` on `delete` are both
/// distinguishable from connectivity failures so callers can treat them as
/// expected outcomes (e.g. `delete` is idempotent — a caller may ignore
/// `DidNotExist` entirely).
#[derive(Debug, Error)]
pub enum CoordinationError {
    #[error("path already exists: {0}")]
    AlreadyExists(String),

    #[error("path did not exist: {0}")]
    DidNotExist(String),

    #[error("operation timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("coordination session was lost")]
    SessionLost,

    #[error("backend connectivity failure after retries: {0}")]
    Unavailable(String),

    #[error("backend returned an unexpected response: {0}")]
    Protocol(String),
}

impl CoordinationError {
    /// True for errors that are safe to retry with backoff (connectivity),
    /// false for errors that represent a definite outcome (already exists,
    /// did not exist, session lost).
    pub fn is_retryable(&self) -> bool {
        matches!(self, CoordinationError::Unavailable(_) | CoordinationError::Timeout(_))
    }
}
