// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bounded exponential backoff for coordination-client connectivity
//! failures: initial 1s, factor 2, cap 30s, max 15 attempts. Constants are
//! the Rust equivalent of the original's `KazooRetry(max_tries=15,
//! delay=1.0, backoff=2, max_delay=30)`.

use crate::error::CoordinationError;
use std::future::Future;
use std::time::Duration;

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub initial_delay: Duration,
    pub backoff_factor: u32,
    pub max_delay: Duration,
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            backoff_factor: 2,
            max_delay: Duration::from_secs(30),
            max_attempts: 15,
        }
    }
}

impl RetryPolicy {
    /// Run `op` with bounded exponential backoff. Only retries errors for
    /// which [`CoordinationError::is_retryable`] is true; any other error
    /// (or a retryable error that's still failing after `max_attempts`) is
    /// returned immediately.
    pub async fn run<F, Fut, T>(&self, mut op: F) -> Result<T, CoordinationError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, CoordinationError>>,
    {
        let mut delay = self.initial_delay;
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match op().await {
                Ok(v) => return Ok(v),
                Err(e) if e.is_retryable() && attempt < self.max_attempts => {
                    tracing::warn!(attempt, delay_ms = delay.as_millis() as u64, error = %e, "retrying coordination call");
                    tokio::time::sleep(delay).await;
                    delay = (delay * self.backoff_factor).min(self.max_delay);
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
#[path = "retry_tests.rs"]
mod tests;
