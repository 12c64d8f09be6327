// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `rbc-trainerd`: the training coordinator's process entry point.
//!
//! Usage: `rbc-trainerd [config-path]`, defaulting to
//! `/etc/rbaioutliers/trainer.toml` when no path is given on the command
//! line.

use rbc_daemon::{supervisor, RunOutcome};
use std::path::PathBuf;
use std::process::ExitCode;

const DEFAULT_CONFIG_PATH: &str = "/etc/rbaioutliers/trainer.toml";

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config_path =
        std::env::args().nth(1).map(PathBuf::from).unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));

    match supervisor::run(&config_path).await {
        Ok(RunOutcome::Completed) => ExitCode::SUCCESS,
        Ok(RunOutcome::OutOfScope) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(%err, "fatal startup error");
            ExitCode::FAILURE
        }
    }
}
