// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! [`ProcessTrainer`]: invokes the opaque anomaly-detection trainer as an
//! external process. The model itself is out of scope here (it is treated
//! as a fixed-interface external collaborator); this adapter only owns
//! getting the query responses to it and interpreting its exit status,
//! the way [`crate`]'s sibling adapters shell out to an external command
//! rather than embedding one.

use crate::error::TrainerError;
use crate::ports::{QueryResponse, Trainer};
use async_trait::async_trait;
use std::path::Path;
use tokio::process::Command;

/// Shells out to a configured command with the per-granularity query
/// responses serialized to a temp file, passed as `--responses`, plus
/// `--model`, `--epochs`, `--batch-size`, and `--backup-path`. A non-zero
/// exit status is reported as [`TrainerError::Failed`] with stderr
/// (truncated) as the reason.
pub struct ProcessTrainer {
    command: String,
}

impl ProcessTrainer {
    pub fn new(command: impl Into<String>) -> Self {
        Self { command: command.into() }
    }

    fn failed(model: &str, reason: impl Into<String>) -> TrainerError {
        TrainerError::Failed { model: model.to_string(), reason: reason.into() }
    }
}

#[async_trait]
impl Trainer for ProcessTrainer {
    async fn train(
        &self,
        model: &str,
        responses: &[QueryResponse],
        epochs: u32,
        batch_size: u32,
        backup_path: &Path,
    ) -> Result<(), TrainerError> {
        let payload: Vec<&serde_json::Value> = responses.iter().map(|r| &r.0).collect();
        let responses_path = std::env::temp_dir().join(format!("rbc-train-{model}-{}.json", uuid::Uuid::new_v4()));
        let body = serde_json::to_vec(&payload).map_err(|e| Self::failed(model, e.to_string()))?;
        tokio::fs::write(&responses_path, &body)
            .await
            .map_err(|e| Self::failed(model, format!("failed to stage query responses: {e}")))?;

        let output = Command::new(&self.command)
            .arg("--model")
            .arg(model)
            .arg("--responses")
            .arg(&responses_path)
            .arg("--epochs")
            .arg(epochs.to_string())
            .arg("--batch-size")
            .arg(batch_size.to_string())
            .arg("--backup-path")
            .arg(backup_path)
            .stdin(std::process::Stdio::null())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped())
            .output()
            .await
            .map_err(|e| Self::failed(model, format!("failed to spawn trainer process: {e}")));

        let _ = tokio::fs::remove_file(&responses_path).await;
        let output = output?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let reason = stderr.lines().last().unwrap_or("trainer process exited non-zero").to_string();
            return Err(Self::failed(model, reason));
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "process_tests.rs"]
mod tests;
