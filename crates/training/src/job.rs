// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! [`TrainingJob`]: pulls a model's artifacts (falling back to the
//! default pair when missing), queries the external data source at every
//! configured granularity, invokes the opaque trainer, and uploads
//! refreshed artifacts back. Idempotent at the granularity of a single
//! model: steps 1-4 only read, and the final upload is a whole-object
//! replace, so re-running `run` for the same model against the same
//! store state reproduces the same uploaded bytes modulo the trainer's
//! own determinism.

use crate::error::TrainingError;
use crate::ports::{QueryEngine, QueryRequest, QueryResponse, Trainer};
use chrono::Duration as ChronoDuration;
use rbc_artifacts::{ArtifactStore, StoreError};
use rbc_core::{ArtifactKind, Clock, Granularity};
use std::path::PathBuf;

/// Static parameters for a training run, sourced from the `[Outliers]`
/// and `[Druid]` config sections plus the artifact store's fixed prefix.
#[derive(Debug, Clone)]
pub struct TrainingConfig {
    /// Object-store prefix models live under, e.g. `rbaioutliers/latest/`.
    pub artifact_prefix: String,
    /// Model name used as the fallback artifact pair (`"traffic"`).
    pub default_model: String,
    pub epochs: u32,
    pub batch_size: u32,
    pub backup_path: PathBuf,
    /// Local scratch directory for downloaded/uploaded artifacts.
    pub workspace: PathBuf,
}

pub struct TrainingJob<'a> {
    pub store: &'a dyn ArtifactStore,
    pub query_engine: &'a dyn QueryEngine,
    pub trainer: &'a dyn Trainer,
    pub clock: &'a dyn Clock,
    pub config: &'a TrainingConfig,
}

impl<'a> TrainingJob<'a> {
    pub async fn run(&self, model_name: &str) -> Result<(), TrainingError> {
        let model_dir = self.config.workspace.join(model_name);
        tokio::fs::create_dir_all(&model_dir)
            .await
            .map_err(|source| TrainingError::Io { path: model_dir.display().to_string(), source })?;

        for kind in ArtifactKind::ALL {
            self.fetch_with_fallback(model_name, kind, &model_dir).await?;
        }

        let now = self.clock.now_utc();
        let end = now - ChronoDuration::nanoseconds(now.timestamp_subsec_nanos() as i64);
        let start = end - ChronoDuration::days(1);

        let mut responses: Vec<QueryResponse> = Vec::with_capacity(Granularity::ALL.len());
        for granularity in Granularity::ALL {
            let request = QueryRequest { model: model_name.to_string(), granularity, start, end };
            let response = self.query_engine.query(&request).await?;
            responses.push(response);
        }

        self.trainer
            .train(model_name, &responses, self.config.epochs, self.config.batch_size, &self.config.backup_path)
            .await?;

        for kind in ArtifactKind::ALL {
            let local_path = model_dir.join(kind.extension());
            let key = kind.key(&self.config.artifact_prefix, &model_name.into());
            self.store.upload(&local_path, &key).await?;
        }

        Ok(())
    }

    async fn fetch_with_fallback(
        &self,
        model_name: &str,
        kind: ArtifactKind,
        model_dir: &std::path::Path,
    ) -> Result<(), TrainingError> {
        let local_path = model_dir.join(kind.extension());
        let key = kind.key(&self.config.artifact_prefix, &model_name.into());
        match self.store.download(&key, &local_path).await {
            Ok(()) => Ok(()),
            Err(StoreError::NotFound(_)) => {
                tracing::info!(model = model_name, kind = %kind, "artifact missing, falling back to default");
                let default_key = kind.key(&self.config.artifact_prefix, &self.config.default_model.clone().into());
                self.store.download(&default_key, &local_path).await.map_err(TrainingError::from)
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
#[path = "job_tests.rs"]
mod tests;
