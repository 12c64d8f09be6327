// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The supervisor: loads configuration, constructs the coordinator's
//! collaborators, wires the coordination session's state listener to
//! logging, and blocks on the role loop until a termination signal
//! arrives.

use crate::config::coordinator_config;
use rbc_artifacts::{ArtifactStore, S3ArtifactStore};
use rbc_coordination::{CoordinationClient, CoordinationError, EtcdCoordinationClient};
use rbc_coordinator::{Coordinator, CoordinatorError};
use rbc_core::{AppConfig, ConfigError, SessionEvent, SystemClock};
use rbc_training::{DruidQueryClient, ProcessTrainer, QueryEngine, Trainer};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// The run mode gate from the external interface: only `train` enters the
/// coordinator. Everything else is a clean, zero-exit-code no-op.
const ACTIVE_ENVIRONMENT: &str = "train";

/// Command the opaque trainer process is invoked as, overridable for
/// deployments that install it somewhere other than on `PATH`.
const TRAINER_COMMAND_VAR: &str = "RBC_TRAINER_COMMAND";
const DEFAULT_TRAINER_COMMAND: &str = "rbc-train-worker";

#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to connect to the coordination service: {0}")]
    Connect(#[from] CoordinationError),

    #[error(transparent)]
    Coordinator(#[from] CoordinatorError),

    #[error("failed to install termination signal handlers: {0}")]
    Signal(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Ran the role loop to a clean shutdown.
    Completed,
    /// `ENVIRONMENT` was not `train`; exited without entering the loop.
    OutOfScope,
}

/// Loads `config_path`, and, if `ENVIRONMENT=train`, runs the coordinator
/// until SIGINT/SIGTERM. Any other `ENVIRONMENT` value is a deliberate
/// no-op: the binary shares its configuration surface with the other run
/// modes named in the external interface, only one of which is this
/// coordinator.
pub async fn run(config_path: &Path) -> Result<RunOutcome, SupervisorError> {
    let environment = std::env::var("ENVIRONMENT").unwrap_or_default();
    if environment != ACTIVE_ENVIRONMENT {
        tracing::info!(environment, "ENVIRONMENT is not 'train', exiting without entering the role loop");
        return Ok(RunOutcome::OutOfScope);
    }

    let app_config = AppConfig::load(config_path)?;

    let store: Arc<dyn ArtifactStore> = Arc::new(
        S3ArtifactStore::new(
            &app_config.aws.s3_public_key,
            &app_config.aws.s3_private_key,
            &app_config.aws.s3_region,
            &app_config.aws.s3_bucket,
            &app_config.aws.s3_hostname,
        )
        .await,
    );
    let query_engine: Arc<dyn QueryEngine> = Arc::new(DruidQueryClient::new(&app_config.druid.druid_endpoint));
    let trainer_command =
        std::env::var(TRAINER_COMMAND_VAR).unwrap_or_else(|_| DEFAULT_TRAINER_COMMAND.to_string());
    let trainer: Arc<dyn Trainer> = Arc::new(ProcessTrainer::new(trainer_command));

    let client: Arc<dyn CoordinationClient> =
        Arc::new(EtcdCoordinationClient::connect(&app_config.zookeeper.hosts()).await?);
    spawn_session_logger(client.clone());

    let config = coordinator_config(&app_config);
    let coordinator =
        Arc::new(Coordinator::new(client, store, query_engine, trainer, SystemClock, config).await?);

    let cancel = CancellationToken::new();
    let role_loop = tokio::spawn({
        let coordinator = coordinator.clone();
        let cancel = cancel.clone();
        async move { coordinator.run(cancel).await }
    });

    crate::signal::wait_for_termination().await?;
    tracing::info!("shutting down");
    cancel.cancel();
    let _ = role_loop.await;

    Ok(RunOutcome::Completed)
}

/// Logs every CONNECTED/SUSPENDED/LOST transition on the coordination
/// session for the lifetime of the process.
fn spawn_session_logger(client: Arc<dyn CoordinationClient>) {
    let mut events = client.session_events();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(SessionEvent::Lost) => tracing::warn!("coordination session lost, relying on auto-reconnect"),
                Ok(event) => tracing::info!(%event, "coordination session transition"),
                Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "missed coordination session events");
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
    });
}

#[cfg(test)]
#[path = "supervisor_tests.rs"]
mod tests;
