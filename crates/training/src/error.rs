// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use thiserror::Error;

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("query engine request failed: {0}")]
    Transport(String),

    #[error("query engine returned an unparseable response: {0}")]
    Protocol(String),
}

#[derive(Debug, Error)]
pub enum TrainerError {
    #[error("trainer failed for model {model}: {reason}")]
    Failed { model: String, reason: String },
}

/// Errors from a single [`crate::job::TrainingJob::run`] invocation. The
/// follower tick treats any of these as a claim-release event: it deletes
/// `TAKEN/<name>` and logs, leaving recovery to the leader's next sweep.
#[derive(Debug, Error)]
pub enum TrainingError {
    #[error(transparent)]
    Store(#[from] rbc_artifacts::StoreError),

    #[error(transparent)]
    Query(#[from] QueryError),

    #[error(transparent)]
    Trainer(#[from] TrainerError),

    #[error("local workspace error for {path}: {source}")]
    Io { path: String, #[source] source: std::io::Error },
}
