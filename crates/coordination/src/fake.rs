// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory [`CoordinationClient`] for deterministic tests. Multiple
//! [`FakeCoordinationClient`] handles can share one [`FakeStore`] (via
//! [`FakeCoordinationClient::join`]) to model several nodes talking to the
//! same coordination service; each handle carries its own session id, so
//! [`FakeCoordinationClient::lose_session`] can evaporate exactly the
//! ephemeral keys *that handle* created, the way a real session loss would.

use crate::client::{ChildrenWatch, CoordinationClient, ElectionHandle, Lease, LockedQueue};
use crate::error::CoordinationError;
use async_trait::async_trait;
use parking_lot::Mutex;
use rbc_core::SessionEvent;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};

struct Node {
    payload: Vec<u8>,
    ephemeral_owner: Option<u64>,
}

#[derive(Default)]
struct FakeStore {
    nodes: HashMap<String, Node>,
    watches: HashMap<String, Vec<mpsc::Sender<()>>>,
    queues: HashMap<String, Arc<FakeLockedQueueState>>,
}

impl FakeStore {
    fn notify(&mut self, path: &str) {
        if let Some(senders) = self.watches.remove(path) {
            for tx in senders {
                let _ = tx.try_send(());
            }
        }
    }
}

/// Shared backing state for a cluster of [`FakeCoordinationClient`]
/// handles. Hold one `Arc<FakeShared>` per test and call
/// [`FakeCoordinationClient::join`] once per simulated node.
pub struct FakeShared {
    store: Mutex<FakeStore>,
    next_session: AtomicU64,
}

impl FakeShared {
    pub fn new() -> Arc<Self> {
        Arc::new(Self { store: Mutex::new(FakeStore::default()), next_session: AtomicU64::new(1) })
    }
}

impl Default for Arc<FakeShared> {
    fn default() -> Self {
        FakeShared::new()
    }
}

pub struct FakeCoordinationClient {
    shared: Arc<FakeShared>,
    session_id: u64,
    session_tx: broadcast::Sender<SessionEvent>,
}

impl FakeCoordinationClient {
    /// A standalone client with its own private store (single-node tests).
    pub fn new() -> Self {
        Self::join(&FakeShared::new())
    }

    /// Join an existing shared store as a new node/session.
    pub fn join(shared: &Arc<FakeShared>) -> Self {
        let session_id = shared.next_session.fetch_add(1, Ordering::SeqCst);
        let (session_tx, _) = broadcast::channel(16);
        let _ = session_tx.send(SessionEvent::Connected);
        Self { shared: shared.clone(), session_id, session_tx }
    }

    /// Simulate this handle's coordination session being lost: every
    /// ephemeral key it created evaporates, and a `Lost` event is
    /// broadcast to its own subscribers (mirroring the real client's
    /// session-event stream).
    pub fn lose_session(&self) {
        let mut store = self.shared.store.lock();
        let dead: Vec<String> = store
            .nodes
            .iter()
            .filter(|(_, n)| n.ephemeral_owner == Some(self.session_id))
            .map(|(k, _)| k.clone())
            .collect();
        for path in dead {
            store.nodes.remove(&path);
            if let Some(parent) = path.rsplit_once('/').map(|(p, _)| p.to_string()) {
                store.notify(&parent);
            }
        }
        drop(store);
        let _ = self.session_tx.send(SessionEvent::Lost);
    }

    fn parent_of(path: &str) -> Option<String> {
        path.rsplit_once('/').map(|(p, _)| p.to_string())
    }
}

impl Default for FakeCoordinationClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CoordinationClient for FakeCoordinationClient {
    async fn ensure_path(&self, path: &str) -> Result<(), CoordinationError> {
        let mut store = self.shared.store.lock();
        let mut built = String::new();
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            built.push('/');
            built.push_str(segment);
            store.nodes.entry(built.clone()).or_insert_with(|| Node { payload: Vec::new(), ephemeral_owner: None });
        }
        Ok(())
    }

    async fn create(&self, path: &str, payload: &[u8], ephemeral: bool) -> Result<(), CoordinationError> {
        let mut store = self.shared.store.lock();
        if store.nodes.contains_key(path) {
            return Err(CoordinationError::AlreadyExists(path.to_string()));
        }
        let owner = if ephemeral { Some(self.session_id) } else { None };
        store.nodes.insert(path.to_string(), Node { payload: payload.to_vec(), ephemeral_owner: owner });
        if let Some(parent) = Self::parent_of(path) {
            store.notify(&parent);
        }
        Ok(())
    }

    async fn delete(&self, path: &str) -> Result<bool, CoordinationError> {
        let mut store = self.shared.store.lock();
        let existed = store.nodes.remove(path).is_some();
        if existed {
            if let Some(parent) = Self::parent_of(path) {
                store.notify(&parent);
            }
        }
        Ok(existed)
    }

    async fn exists(&self, path: &str) -> Result<bool, CoordinationError> {
        Ok(self.shared.store.lock().nodes.contains_key(path))
    }

    async fn children(&self, path: &str) -> Result<Vec<String>, CoordinationError> {
        let store = self.shared.store.lock();
        let prefix = format!("{}/", path.trim_end_matches('/'));
        let mut names: BTreeMap<String, ()> = BTreeMap::new();
        for key in store.nodes.keys() {
            if let Some(rest) = key.strip_prefix(&prefix) {
                if !rest.is_empty() {
                    let name = rest.split('/').next().unwrap_or(rest);
                    names.insert(name.to_string(), ());
                }
            }
        }
        Ok(names.into_keys().collect())
    }

    async fn get(&self, path: &str) -> Result<Option<Vec<u8>>, CoordinationError> {
        Ok(self.shared.store.lock().nodes.get(path).map(|n| n.payload.clone()))
    }

    async fn set(&self, path: &str, payload: &[u8]) -> Result<(), CoordinationError> {
        let mut store = self.shared.store.lock();
        match store.nodes.get_mut(path) {
            Some(node) => {
                node.payload = payload.to_vec();
                Ok(())
            }
            None => Err(CoordinationError::DidNotExist(path.to_string())),
        }
    }

    async fn watch_children(&self, path: &str) -> Result<ChildrenWatch, CoordinationError> {
        let (tx, rx) = mpsc::channel(1);
        self.shared.store.lock().watches.entry(path.to_string()).or_default().push(tx);
        Ok(ChildrenWatch::new(rx))
    }

    fn queue(&self, path: &str) -> Arc<dyn LockedQueue> {
        let state = self
            .shared
            .store
            .lock()
            .queues
            .entry(path.to_string())
            .or_insert_with(|| Arc::new(FakeLockedQueueState::default()))
            .clone();
        Arc::new(FakeLockedQueue { state })
    }

    fn election(&self, path: &str, identity: &str) -> Arc<dyn ElectionHandle> {
        Arc::new(FakeElectionHandle {
            shared: self.shared.clone(),
            lock_path: format!("{}/lock", path.trim_end_matches('/')),
            session_id: self.session_id,
            identity: identity.to_string(),
        })
    }

    fn session_events(&self) -> broadcast::Receiver<SessionEvent> {
        self.session_tx.subscribe()
    }
}

#[derive(Default)]
struct FakeLockedQueueState {
    items: Mutex<VecDeque<Vec<u8>>>,
    outstanding: Mutex<Option<String>>,
    next_lease: AtomicU64,
}

struct FakeLockedQueue {
    state: Arc<FakeLockedQueueState>,
}

#[async_trait]
impl LockedQueue for FakeLockedQueue {
    async fn put(&self, item: Vec<u8>) -> Result<(), CoordinationError> {
        self.state.items.lock().push_back(item);
        Ok(())
    }

    async fn put_all(&self, items: Vec<Vec<u8>>) -> Result<(), CoordinationError> {
        self.state.items.lock().extend(items);
        Ok(())
    }

    async fn get(&self, timeout: Duration) -> Result<Option<(Lease, Vec<u8>)>, CoordinationError> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            {
                let mut outstanding = self.state.outstanding.lock();
                if outstanding.is_none() {
                    let mut items = self.state.items.lock();
                    if let Some(item) = items.pop_front() {
                        let token = format!("lease-{}", self.state.next_lease.fetch_add(1, Ordering::SeqCst));
                        *outstanding = Some(token.clone());
                        return Ok(Some((Lease(token), item)));
                    }
                    return Ok(None);
                }
            }
            if tokio::time::Instant::now() >= deadline {
                return Ok(None);
            }
            tokio::task::yield_now().await;
            if tokio::time::Instant::now() >= deadline {
                return Ok(None);
            }
        }
    }

    async fn consume(&self, lease: Lease) -> Result<(), CoordinationError> {
        let mut outstanding = self.state.outstanding.lock();
        if outstanding.as_deref() == Some(lease.0.as_str()) {
            *outstanding = None;
            Ok(())
        } else {
            Err(CoordinationError::Protocol(format!("lease {} is not outstanding", lease.0)))
        }
    }

    async fn size(&self) -> Result<usize, CoordinationError> {
        Ok(self.state.items.lock().len())
    }
}

/// CASes on `lock_path`, a child of the election path rather than the
/// election path itself, the same way [`crate::etcd::EtcdElectionHandle`]
/// does: the election path is a persistent container `ensure_path`
/// creates before the role loop starts, so a version/presence check on
/// that same key could never see it absent. `lock_path` is never ensured
/// by anything, so the first `acquire` finds it genuinely missing.
struct FakeElectionHandle {
    shared: Arc<FakeShared>,
    lock_path: String,
    session_id: u64,
    identity: String,
}

#[async_trait]
impl ElectionHandle for FakeElectionHandle {
    async fn acquire(&self, timeout: Duration) -> Result<bool, CoordinationError> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            {
                let mut store = self.shared.store.lock();
                if !store.nodes.contains_key(&self.lock_path) {
                    store.nodes.insert(
                        self.lock_path.clone(),
                        Node { payload: self.identity.as_bytes().to_vec(), ephemeral_owner: Some(self.session_id) },
                    );
                    return Ok(true);
                }
            }
            if tokio::time::Instant::now() >= deadline {
                return Ok(false);
            }
            tokio::task::yield_now().await;
        }
    }

    async fn release(&self) -> Result<(), CoordinationError> {
        let mut store = self.shared.store.lock();
        if store.nodes.get(&self.lock_path).map(|n| n.ephemeral_owner) == Some(Some(self.session_id)) {
            store.nodes.remove(&self.lock_path);
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
