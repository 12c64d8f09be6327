// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! [`CoordinatorConfig`]: the coordinator's runtime parameters, built from
//! [`rbc_core::AppConfig`] by the supervisor.

use rbc_training::TrainingConfig;
use std::time::Duration;

/// Effective configuration for one [`crate::Coordinator`] instance.
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Root path under which the five coordination paths live.
    pub root: String,
    /// This node's identity, published as the leader key's payload and
    /// used as the election candidate name.
    pub node_name: String,
    /// Seconds per role-loop tick (`zk_tick_time`).
    pub tick_time: Duration,
    /// Seconds between leader re-enqueues of the full model set
    /// (`zk_sleep_time`).
    pub sleep_time: Duration,
    pub training: TrainingConfig,
}

impl CoordinatorConfig {
    /// `queue.get` and `election.acquire` timeouts are both expressed in
    /// ticks per spec: 2 ticks and 5 ticks respectively.
    pub fn queue_timeout(&self) -> Duration {
        self.tick_time * 2
    }

    pub fn election_timeout(&self) -> Duration {
        self.tick_time * 5
    }

    /// Shutdown waits two ticks for outstanding work to settle.
    pub fn shutdown_grace(&self) -> Duration {
        self.tick_time * 2
    }
}
