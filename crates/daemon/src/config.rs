// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Translates the parsed `[ZooKeeper]`/`[Outliers]` sections of
//! [`rbc_core::AppConfig`] into a [`CoordinatorConfig`].

use rbc_core::AppConfig;
use rbc_coordinator::CoordinatorConfig;
use rbc_training::TrainingConfig;
use std::path::PathBuf;

/// Object-store prefix models live under. Fixed per the external
/// interface's artifact-store layout, not user-configurable.
const ARTIFACT_PREFIX: &str = "rbaioutliers/latest/";

/// Local scratch directory downloaded/uploaded artifacts pass through.
/// Namespaced under the state directory so concurrent runs on one host
/// (tests, or a future multi-instance deployment) don't collide.
fn workspace_dir() -> PathBuf {
    std::env::temp_dir().join("rbc-training-workspace")
}

pub fn coordinator_config(app: &AppConfig) -> CoordinatorConfig {
    CoordinatorConfig {
        root: app.zookeeper.zk_sync_path.clone(),
        node_name: app.zookeeper.zk_name.clone(),
        tick_time: app.zookeeper.tick_time(),
        sleep_time: app.zookeeper.sleep_time(),
        training: TrainingConfig {
            artifact_prefix: ARTIFACT_PREFIX.to_string(),
            default_model: app.outliers.default_model.clone(),
            epochs: app.outliers.epochs,
            batch_size: app.outliers.batch_size,
            backup_path: PathBuf::from(&app.outliers.backup_path),
            workspace: workspace_dir(),
        },
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
