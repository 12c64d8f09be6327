// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The opaque collaborators [`TrainingJob`](crate::job::TrainingJob) is
//! built against: the anomaly-detection trainer and the time-series
//! query engine. Both are ports so tests can substitute deterministic
//! fakes instead of invoking a real model or hitting a real Druid
//! cluster.

use crate::error::{QueryError, TrainerError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rbc_core::Granularity;
use serde_json::Value;
use std::path::Path;

/// One query issued at a single granularity over `[start, end)`, filtered
/// to `model`.
#[derive(Debug, Clone)]
pub struct QueryRequest {
    pub model: String,
    pub granularity: Granularity,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// The query engine's raw response, opaque beyond being valid JSON — the
/// trainer interprets its contents, not this crate.
#[derive(Debug, Clone)]
pub struct QueryResponse(pub Value);

#[async_trait]
pub trait QueryEngine: Send + Sync {
    async fn query(&self, request: &QueryRequest) -> Result<QueryResponse, QueryError>;
}

/// Invokes the anomaly-detection model's opaque training routine.
/// `responses` are ordered the same as [`rbc_core::Granularity::ALL`];
/// `backup_path` is where the trainer may stage its own working files.
#[async_trait]
pub trait Trainer: Send + Sync {
    async fn train(
        &self,
        model: &str,
        responses: &[QueryResponse],
        epochs: u32,
        batch_size: u32,
        backup_path: &Path,
    ) -> Result<(), TrainerError>;
}

#[cfg(any(test, feature = "test-support"))]
pub mod fake {
    use super::*;
    use parking_lot::Mutex;

    /// Records every request it receives and returns a canned response per
    /// request (or an empty JSON object if none was configured).
    #[derive(Default)]
    pub struct FakeQueryEngine {
        pub requests: Mutex<Vec<QueryRequest>>,
        pub fail: Mutex<bool>,
    }

    impl FakeQueryEngine {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn set_failing(&self, fail: bool) {
            *self.fail.lock() = fail;
        }

        pub fn request_count(&self) -> usize {
            self.requests.lock().len()
        }
    }

    #[async_trait]
    impl QueryEngine for FakeQueryEngine {
        async fn query(&self, request: &QueryRequest) -> Result<QueryResponse, QueryError> {
            if *self.fail.lock() {
                return Err(QueryError::Transport("simulated query failure".into()));
            }
            self.requests.lock().push(request.clone());
            Ok(QueryResponse(serde_json::json!({
                "model": request.model,
                "granularity": request.granularity.iso8601(),
            })))
        }
    }

    /// Records every training invocation; `fail` forces the next call to
    /// return an error, modeling a model-side training failure.
    #[derive(Default)]
    pub struct FakeTrainer {
        pub invocations: Mutex<Vec<(String, usize, u32, u32)>>,
        pub fail: Mutex<bool>,
    }

    impl FakeTrainer {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn set_failing(&self, fail: bool) {
            *self.fail.lock() = fail;
        }

        pub fn invocation_count(&self) -> usize {
            self.invocations.lock().len()
        }
    }

    #[async_trait]
    impl Trainer for FakeTrainer {
        async fn train(
            &self,
            model: &str,
            responses: &[QueryResponse],
            epochs: u32,
            batch_size: u32,
            _backup_path: &Path,
        ) -> Result<(), TrainerError> {
            if *self.fail.lock() {
                return Err(TrainerError::Failed { model: model.to_string(), reason: "simulated".into() });
            }
            self.invocations.lock().push((model.to_string(), responses.len(), epochs, batch_size));
            Ok(())
        }
    }
}
