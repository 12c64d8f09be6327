// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The [`CoordinationClient`] port: a thin wrapper over a hierarchical
//! key service supporting ephemeral keys, watches, atomic create, locked
//! FIFO queues, and leader election. `rbc-coordinator` is written entirely
//! against this trait; `crate::etcd` provides the real implementation and
//! `crate::fake` (behind `test-support`) provides an in-memory one.

use crate::error::CoordinationError;
use async_trait::async_trait;
use rbc_core::SessionEvent;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};

/// A single notification that the child set of a watched path changed.
/// Each watch registration is single-shot: after receiving one
/// notification from `changed`, the caller must call `watch_children`
/// again to keep observing the path (mirrors a ZooKeeper-style watch,
/// which this abstraction is modeled on).
pub struct ChildrenWatch {
    changed: mpsc::Receiver<()>,
}

impl ChildrenWatch {
    pub fn new(changed: mpsc::Receiver<()>) -> Self {
        Self { changed }
    }

    /// Wait for the next child-set change notification.
    pub async fn changed(&mut self) -> bool {
        self.changed.recv().await.is_some()
    }
}

/// An opaque handle identifying one item leased out of a [`LockedQueue`].
/// Must be passed to [`LockedQueue::consume`] to acknowledge delivery, or
/// allowed to time out to return the item to the queue.
#[derive(Debug, Clone)]
pub struct Lease(pub(crate) String);

impl Lease {
    pub fn token(&self) -> &str {
        &self.0
    }
}

/// A locked FIFO queue of opaque byte payloads.
///
/// `get` guarantees the payload is delivered to a single consumer: while
/// one caller holds a lease, concurrent `get` calls from other consumers
/// block or time out rather than observing the same item (I3).
#[async_trait]
pub trait LockedQueue: Send + Sync {
    async fn put(&self, item: Vec<u8>) -> Result<(), CoordinationError>;
    async fn put_all(&self, items: Vec<Vec<u8>>) -> Result<(), CoordinationError>;
    /// Returns `None` if no item became available within `timeout`.
    async fn get(&self, timeout: Duration) -> Result<Option<(Lease, Vec<u8>)>, CoordinationError>;
    async fn consume(&self, lease: Lease) -> Result<(), CoordinationError>;
    async fn size(&self) -> Result<usize, CoordinationError>;
}

/// A leader-election barrier. Joining yields a handle used to acquire and
/// release leadership; `identity` is published as the leader key's
/// payload once acquired.
#[async_trait]
pub trait ElectionHandle: Send + Sync {
    /// Attempt to acquire the election lock within `timeout`. Returns
    /// `false` on timeout (not an error — another candidate holding the
    /// lock is an expected outcome, not a failure).
    async fn acquire(&self, timeout: Duration) -> Result<bool, CoordinationError>;
    /// Idempotent: releasing a lock this handle does not hold is a no-op.
    async fn release(&self) -> Result<(), CoordinationError>;
}

/// Thin wrapper over a hierarchical key service: ensure-path, create
/// (ephemeral|persistent), delete, exists, get/set, children, watches,
/// locked queues, and leader election.
#[async_trait]
pub trait CoordinationClient: Send + Sync {
    /// Idempotent creation of persistent intermediate keys. Fails only on
    /// connectivity.
    async fn ensure_path(&self, path: &str) -> Result<(), CoordinationError>;

    /// Atomic create. Returns `CoordinationError::AlreadyExists` if `path`
    /// is already present.
    async fn create(&self, path: &str, payload: &[u8], ephemeral: bool) -> Result<(), CoordinationError>;

    /// Idempotent: deleting a missing key succeeds (`Ok(false)`); the
    /// caller may ignore the "did not exist" signal.
    async fn delete(&self, path: &str) -> Result<bool, CoordinationError>;

    async fn exists(&self, path: &str) -> Result<bool, CoordinationError>;

    /// Names of `path`'s immediate children (snapshot read).
    async fn children(&self, path: &str) -> Result<Vec<String>, CoordinationError>;

    /// Snapshot read of `path`'s payload, `None` if the key has no value
    /// or does not exist.
    async fn get(&self, path: &str) -> Result<Option<Vec<u8>>, CoordinationError>;

    /// Overwrite `path`'s payload. `path` must already exist.
    async fn set(&self, path: &str, payload: &[u8]) -> Result<(), CoordinationError>;

    /// Register a single-shot watch on `path`'s child set.
    async fn watch_children(&self, path: &str) -> Result<ChildrenWatch, CoordinationError>;

    /// Open a locked FIFO queue rooted at `path`.
    fn queue(&self, path: &str) -> Arc<dyn LockedQueue>;

    /// Join the election barrier at `path` under `identity`.
    fn election(&self, path: &str, identity: &str) -> Arc<dyn ElectionHandle>;

    /// The identity most recently observed at the leader key, if any.
    async fn current_leader(&self, leader_path: &str) -> Result<Option<String>, CoordinationError> {
        Ok(self.get(leader_path).await?.and_then(|bytes| String::from_utf8(bytes).ok()))
    }

    /// Session transitions (CONNECTED/SUSPENDED/LOST). Subscribing never
    /// fails; a fresh subscriber simply misses events delivered before it
    /// subscribed.
    fn session_events(&self) -> broadcast::Receiver<SessionEvent>;
}
