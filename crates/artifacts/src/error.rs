// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use thiserror::Error;

/// Errors surfaced by [`crate::store::ArtifactStore`].
///
/// `NotFound` is a distinguishable, expected outcome (the training job
/// treats it as a cue to fall back to the default artifact pair) rather
/// than a failure; every other variant is a transport or configuration
/// problem.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("object not found: {0}")]
    NotFound(String),

    #[error("transport failure: {0}")]
    Transport(String),

    #[error("local filesystem error for {path}: {source}")]
    Io { path: String, #[source] source: std::io::Error },
}
