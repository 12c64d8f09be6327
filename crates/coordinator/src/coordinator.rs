// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The role loop: leader election participation, the LEADER sweep, and the
//! FOLLOWER claim/train/release cycle described in full in the coordinator
//! state machine section of the design. This module owns all mutation of
//! `is_leader`; nothing outside it ever sets that flag directly.

use crate::config::CoordinatorConfig;
use crate::paths::CoordinatorPaths;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use rbc_artifacts::ArtifactStore;
use rbc_coordination::{CoordinationClient, CoordinationError};
use rbc_core::Clock;
use rbc_training::{QueryEngine, Trainer, TrainingError, TrainingJob};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Error)]
enum TickError {
    #[error(transparent)]
    Coordination(#[from] CoordinationError),
    #[error(transparent)]
    Store(#[from] rbc_artifacts::StoreError),
}

/// One coordinator instance: a role loop plus the collaborators
/// (coordination client, artifact store, query engine, trainer, clock)
/// it is built against.
pub struct Coordinator<K: Clock> {
    client: Arc<dyn CoordinationClient>,
    store: Arc<dyn ArtifactStore>,
    query_engine: Arc<dyn QueryEngine>,
    trainer: Arc<dyn Trainer>,
    clock: K,
    config: CoordinatorConfig,
    paths: CoordinatorPaths,
    is_leader: AtomicBool,
    is_running: AtomicBool,
}

impl<K: Clock> Coordinator<K> {
    /// Ensures the five coordination paths exist, then returns a
    /// coordinator ready to join the election and enter the role loop.
    pub async fn new(
        client: Arc<dyn CoordinationClient>,
        store: Arc<dyn ArtifactStore>,
        query_engine: Arc<dyn QueryEngine>,
        trainer: Arc<dyn Trainer>,
        clock: K,
        config: CoordinatorConfig,
    ) -> Result<Self, crate::error::CoordinatorError> {
        let paths = CoordinatorPaths::new(config.root.clone());
        for path in paths.all() {
            client.ensure_path(path).await?;
        }
        Ok(Self {
            client,
            store,
            query_engine,
            trainer,
            clock,
            config,
            paths,
            is_leader: AtomicBool::new(false),
            is_running: AtomicBool::new(true),
        })
    }

    pub fn is_leader(&self) -> bool {
        self.is_leader.load(Ordering::SeqCst)
    }

    pub fn node_name(&self) -> &str {
        &self.config.node_name
    }

    /// Runs the role loop until `cancel` fires. Spawns the election watch
    /// as a separate task, per the concurrency model's "election watch
    /// fires on a separate task" clause; the loop itself only ever reads
    /// `is_leader`, never sets it.
    pub async fn run(self: Arc<Self>, cancel: CancellationToken) {
        let watch_handle = tokio::spawn({
            let this = self.clone();
            let cancel = cancel.clone();
            async move { this.election_watch_loop(cancel).await }
        });

        let mut next_sweep = self.clock.now_utc();
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                () = self.clock.sleep(self.config.tick_time) => {}
            }
            if cancel.is_cancelled() {
                break;
            }
            if self.is_leader() {
                self.leader_tick(&mut next_sweep).await;
            } else {
                self.follower_tick().await;
            }
        }

        self.shutdown().await;
        watch_handle.abort();
    }

    async fn shutdown(&self) {
        self.is_running.store(false, Ordering::SeqCst);
        if self.is_leader() {
            let _ = self.client.delete(&self.paths.leader).await;
        }
        self.clock.sleep(self.config.shutdown_grace()).await;
    }

    /// Watches the root's child set (the leader key's own presence or
    /// absence, since a leaf ephemeral key has no children of its own to
    /// watch) and re-runs election participation on every change, plus
    /// once up front to cover the case where a leader already exists at
    /// startup.
    async fn election_watch_loop(&self, cancel: CancellationToken) {
        if let Err(e) = self.participate().await {
            tracing::warn!(node = self.node_name(), error = %e, "initial election participation failed");
        }
        loop {
            let watch = match self.client.watch_children(&self.paths.root).await {
                Ok(w) => w,
                Err(e) => {
                    tracing::warn!(error = %e, "failed to register leader watch, retrying after a tick");
                    tokio::select! {
                        _ = cancel.cancelled() => return,
                        () = self.clock.sleep(self.config.tick_time) => continue,
                    }
                }
            };
            let mut watch = watch;
            tokio::select! {
                _ = cancel.cancelled() => return,
                changed = watch.changed() => {
                    if !changed {
                        continue;
                    }
                }
            }
            if let Err(e) = self.participate().await {
                tracing::warn!(node = self.node_name(), error = %e, "election participation failed");
            }
        }
    }

    /// Fires on a root child-set change. If no leader key exists, attempts
    /// to acquire the election lock with a bounded timeout; win or lose,
    /// finishes by reading the leader key's payload to set `is_leader`.
    async fn participate(&self) -> Result<(), CoordinationError> {
        if !self.client.exists(&self.paths.leader).await? && self.is_running.load(Ordering::SeqCst) {
            let election = self.client.election(&self.paths.election, self.node_name());
            match election.acquire(self.config.election_timeout()).await {
                Ok(true) => {
                    match self.client.create(&self.paths.leader, self.node_name().as_bytes(), true).await {
                        Ok(()) | Err(CoordinationError::AlreadyExists(_)) => {}
                        Err(e) => {
                            let _ = election.release().await;
                            return Err(e);
                        }
                    }
                    election.release().await?;
                }
                Ok(false) => {
                    tracing::debug!(node = self.node_name(), "election lock acquisition timed out");
                }
                Err(e) => return Err(e),
            }
        }
        let leader = self.client.current_leader(&self.paths.leader).await?;
        self.is_leader.store(leader.as_deref() == Some(self.node_name()), Ordering::SeqCst);
        Ok(())
    }

    async fn leader_tick(&self, next_sweep: &mut DateTime<Utc>) {
        if self.clock.now_utc() >= *next_sweep {
            if let Err(e) = self.sweep().await {
                tracing::warn!(error = %e, "leader sweep failed");
            }
            let period = ChronoDuration::from_std(self.config.sleep_time).unwrap_or_else(|_| ChronoDuration::zero());
            *next_sweep = self.clock.now_utc() + period;
        }
        if let Err(e) = self.inspect_markers().await {
            tracing::warn!(error = %e, "marker inspection failed");
        }
    }

    /// Refreshes the model list from the store and re-enqueues every known
    /// model. Duplicates across sweeps are expected and safe under I2/I3.
    async fn sweep(&self) -> Result<(), TickError> {
        let models = rbc_artifacts::discover(&*self.store, &self.config.training.artifact_prefix).await?;
        if models.is_empty() {
            return Ok(());
        }
        let payloads: Vec<Vec<u8>> = models.iter().map(|m| m.as_str().as_bytes().to_vec()).collect();
        tracing::info!(count = payloads.len(), "enqueuing models for training");
        self.client.queue(&self.paths.queue).put_all(payloads).await?;
        Ok(())
    }

    /// For every model with a TAKEN marker, detects the abandoned state
    /// (TAKEN present, TRAIN absent) and requeues it.
    async fn inspect_markers(&self) -> Result<(), CoordinationError> {
        let taken = self.client.children(&self.paths.taken).await?;
        for model in taken {
            let train_marker = self.paths.train_marker(&model);
            if !self.client.exists(&train_marker).await? {
                tracing::warn!(model = %model, "detected abandoned claim, requeuing");
                let taken_marker = self.paths.taken_marker(&model);
                let _ = self.client.delete(&taken_marker).await;
                self.client.queue(&self.paths.queue).put(model.into_bytes()).await?;
            }
        }
        Ok(())
    }

    async fn follower_tick(&self) {
        match self.client.exists(&self.paths.leader).await {
            Ok(true) => {}
            Ok(false) => return,
            Err(e) => {
                tracing::warn!(error = %e, "failed to check leader presence");
                return;
            }
        }

        let queue = self.client.queue(&self.paths.queue);
        let (lease, payload) = match queue.get(self.config.queue_timeout()).await {
            Ok(Some(item)) => item,
            Ok(None) => return,
            Err(e) => {
                tracing::warn!(error = %e, "queue.get failed");
                return;
            }
        };
        let model = String::from_utf8_lossy(&payload).into_owned();
        let train_marker = self.paths.train_marker(&model);

        match self.client.create(&train_marker, self.node_name().as_bytes(), true).await {
            Ok(()) => {}
            Err(CoordinationError::AlreadyExists(_)) => {
                tracing::info!(model = %model, "duplicate delivery for a model already under claim, dropping lease");
                if let Err(e) = queue.consume(lease).await {
                    tracing::warn!(model = %model, error = %e, "failed to consume duplicate-delivery lease");
                }
                return;
            }
            Err(e) => {
                tracing::warn!(model = %model, error = %e, "failed to create TRAIN marker, lease will expire");
                return;
            }
        }

        if let Err(e) = queue.consume(lease).await {
            tracing::warn!(model = %model, error = %e, "failed to consume queue lease after claiming");
        }

        let taken_marker = self.paths.taken_marker(&model);
        if let Err(e) = self.client.create(&taken_marker, self.node_name().as_bytes(), false).await {
            tracing::warn!(model = %model, error = %e, "failed to create TAKEN marker");
        }
        tracing::info!(model = %model, node = self.node_name(), "claimed model for training");

        match self.run_training(&model).await {
            Ok(()) => {
                let _ = self.client.delete(&taken_marker).await;
                let _ = self.client.delete(&train_marker).await;
                tracing::info!(model = %model, "training complete, claim released");
            }
            Err(e) => {
                tracing::warn!(model = %model, error = %e, "training failed, releasing claim");
                let _ = self.client.delete(&taken_marker).await;
                let _ = self.client.delete(&train_marker).await;
            }
        }
    }

    async fn run_training(&self, model: &str) -> Result<(), TrainingError> {
        let job = TrainingJob {
            store: &*self.store,
            query_engine: &*self.query_engine,
            trainer: &*self.trainer,
            clock: &self.clock,
            config: &self.config.training,
        };
        job.run(model).await
    }
}

#[cfg(test)]
#[path = "coordinator_tests.rs"]
mod tests;
