// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! etcd-backed [`CoordinationClient`]. Ephemeral keys are plain puts
//! attached to a lease that is kept alive by a background task for as
//! long as the owning handle is live; persistent keys are plain puts with
//! no lease. `watch_children` wraps etcd's watch API filtered to a key
//! prefix. The locked queue is a persistent, sequence-numbered key range
//! guarded by a lease-backed compare-and-swap lock, matching the
//! ZooKeeper `LockingQueue` recipe this client replaces. Leader election
//! is the same lease + compare-and-swap pattern applied to a single key.

use crate::client::{ChildrenWatch, CoordinationClient, ElectionHandle, Lease, LockedQueue};
use crate::error::CoordinationError;
use crate::retry::RetryPolicy;
use async_trait::async_trait;
use etcd_client::{Client, Compare, CompareOp, GetOptions, PutOptions, Txn, TxnOp, WatchOptions};
use parking_lot::Mutex;
use rbc_core::SessionEvent;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;

/// Lease TTL granted to ephemeral keys and election locks. Renewed on a
/// third of this interval by a background keepalive task; losing that
/// task (process death, session loss) lets the lease expire and the key
/// evaporate.
const LEASE_TTL_SECS: i64 = 30;

struct EphemeralLease {
    lease_id: i64,
    cancel: CancellationToken,
}

/// Production [`CoordinationClient`] backed by a real etcd cluster.
pub struct EtcdCoordinationClient {
    client: Client,
    retry: RetryPolicy,
    ephemeral: Mutex<HashMap<String, EphemeralLease>>,
    session_tx: broadcast::Sender<SessionEvent>,
}

impl EtcdCoordinationClient {
    pub async fn connect(endpoints: &[String]) -> Result<Self, CoordinationError> {
        let client = Client::connect(endpoints, None)
            .await
            .map_err(|e| CoordinationError::Unavailable(e.to_string()))?;
        let (session_tx, _) = broadcast::channel(16);
        let _ = session_tx.send(SessionEvent::Connected);
        Ok(Self {
            client,
            retry: RetryPolicy::default(),
            ephemeral: Mutex::new(HashMap::new()),
            session_tx,
        })
    }

    async fn grant_lease(&self) -> Result<i64, CoordinationError> {
        let resp = self
            .client
            .clone()
            .lease_grant(LEASE_TTL_SECS, None)
            .await
            .map_err(|e| CoordinationError::Unavailable(e.to_string()))?;
        Ok(resp.id())
    }

    fn spawn_keepalive(&self, lease_id: i64) -> CancellationToken {
        let cancel = CancellationToken::new();
        let child = cancel.clone();
        let mut client = self.client.clone();
        tokio::spawn(async move {
            let (mut keeper, mut stream) = match client.lease_keep_alive(lease_id).await {
                Ok(pair) => pair,
                Err(e) => {
                    tracing::warn!(lease_id, error = %e, "failed to start lease keepalive");
                    return;
                }
            };
            let interval = Duration::from_secs((LEASE_TTL_SECS / 3).max(1) as u64);
            loop {
                tokio::select! {
                    _ = child.cancelled() => return,
                    _ = tokio::time::sleep(interval) => {
                        if keeper.keep_alive().await.is_err() {
                            tracing::warn!(lease_id, "lease keepalive send failed, lease will expire");
                            return;
                        }
                        match stream.message().await {
                            Ok(Some(_)) => {}
                            _ => {
                                tracing::warn!(lease_id, "lease keepalive stream ended, lease will expire");
                                return;
                            }
                        }
                    }
                }
            }
        });
        cancel
    }

    fn child_name<'a>(prefix: &str, full_key: &'a str) -> Option<&'a str> {
        let rest = full_key.strip_prefix(prefix)?.trim_start_matches('/');
        if rest.is_empty() {
            return None;
        }
        Some(rest.split('/').next().unwrap_or(rest))
    }
}

#[async_trait]
impl CoordinationClient for EtcdCoordinationClient {
    async fn ensure_path(&self, path: &str) -> Result<(), CoordinationError> {
        self.retry
            .run(|| async {
                let mut client = self.client.clone();
                let existing = client
                    .get(path, None)
                    .await
                    .map_err(|e| CoordinationError::Unavailable(e.to_string()))?;
                if existing.kvs().is_empty() {
                    client
                        .put(path, Vec::new(), None)
                        .await
                        .map_err(|e| CoordinationError::Unavailable(e.to_string()))?;
                }
                Ok(())
            })
            .await
    }

    async fn create(&self, path: &str, payload: &[u8], ephemeral: bool) -> Result<(), CoordinationError> {
        let lease_id = if ephemeral { Some(self.grant_lease().await?) } else { None };

        let put_opts = lease_id.map(|id| PutOptions::new().with_lease(id));
        let result = self
            .retry
            .run(|| async {
                let mut client = self.client.clone();
                let txn = Txn::new()
                    .when(vec![Compare::version(path, CompareOp::Equal, 0)])
                    .and_then(vec![TxnOp::put(path, payload.to_vec(), put_opts.clone())])
                    .or_else(vec![TxnOp::get(path, None)]);
                let resp = client
                    .txn(txn)
                    .await
                    .map_err(|e| CoordinationError::Unavailable(e.to_string()))?;
                Ok(resp.succeeded())
            })
            .await?;

        if !result {
            if let Some(id) = lease_id {
                let _ = self.client.clone().lease_revoke(id).await;
            }
            return Err(CoordinationError::AlreadyExists(path.to_string()));
        }

        if let Some(id) = lease_id {
            let cancel = self.spawn_keepalive(id);
            self.ephemeral.lock().insert(path.to_string(), EphemeralLease { lease_id: id, cancel });
        }
        Ok(())
    }

    async fn delete(&self, path: &str) -> Result<bool, CoordinationError> {
        if let Some(lease) = self.ephemeral.lock().remove(path) {
            lease.cancel.cancel();
            let _ = self.client.clone().lease_revoke(lease.lease_id).await;
        }
        self.retry
            .run(|| async {
                let mut client = self.client.clone();
                let resp = client
                    .delete(path, None)
                    .await
                    .map_err(|e| CoordinationError::Unavailable(e.to_string()))?;
                Ok(resp.deleted() > 0)
            })
            .await
    }

    async fn exists(&self, path: &str) -> Result<bool, CoordinationError> {
        Ok(self.get(path).await?.is_some())
    }

    async fn children(&self, path: &str) -> Result<Vec<String>, CoordinationError> {
        let prefix = format!("{}/", path.trim_end_matches('/'));
        self.retry
            .run(|| async {
                let mut client = self.client.clone();
                let resp = client
                    .get(prefix.as_str(), Some(GetOptions::new().with_prefix()))
                    .await
                    .map_err(|e| CoordinationError::Unavailable(e.to_string()))?;
                let mut names: Vec<String> = Vec::new();
                for kv in resp.kvs() {
                    let key = kv.key_str().map_err(|e| CoordinationError::Protocol(e.to_string()))?;
                    if let Some(name) = Self::child_name(path, key) {
                        if !names.iter().any(|n| n == name) {
                            names.push(name.to_string());
                        }
                    }
                }
                Ok(names)
            })
            .await
    }

    async fn get(&self, path: &str) -> Result<Option<Vec<u8>>, CoordinationError> {
        self.retry
            .run(|| async {
                let mut client = self.client.clone();
                let resp = client
                    .get(path, None)
                    .await
                    .map_err(|e| CoordinationError::Unavailable(e.to_string()))?;
                Ok(resp.kvs().first().map(|kv| kv.value().to_vec()))
            })
            .await
    }

    async fn set(&self, path: &str, payload: &[u8]) -> Result<(), CoordinationError> {
        let lease_id = self.ephemeral.lock().get(path).map(|l| l.lease_id);
        let opts = lease_id.map(|id| PutOptions::new().with_lease(id));
        self.retry
            .run(|| async {
                let mut client = self.client.clone();
                client
                    .put(path, payload.to_vec(), opts.clone())
                    .await
                    .map_err(|e| CoordinationError::Unavailable(e.to_string()))?;
                Ok(())
            })
            .await
    }

    async fn watch_children(&self, path: &str) -> Result<ChildrenWatch, CoordinationError> {
        let prefix = format!("{}/", path.trim_end_matches('/'));
        let (tx, rx) = mpsc::channel(1);
        let mut client = self.client.clone();
        let (mut watcher, mut stream) = client
            .watch(prefix.as_str(), Some(WatchOptions::new().with_prefix()))
            .await
            .map_err(|e| CoordinationError::Unavailable(e.to_string()))?;
        tokio::spawn(async move {
            // Single-shot: forward exactly one notification, then let the
            // watch stream (and this task) drop. The caller re-registers.
            while let Ok(Some(resp)) = stream.message().await {
                if !resp.events().is_empty() {
                    let _ = tx.send(()).await;
                    break;
                }
            }
            let _ = watcher.cancel().await;
        });
        Ok(ChildrenWatch::new(rx))
    }

    fn queue(&self, path: &str) -> Arc<dyn LockedQueue> {
        Arc::new(EtcdLockedQueue {
            client: self.client.clone(),
            root: path.trim_end_matches('/').to_string(),
        })
    }

    fn election(&self, path: &str, identity: &str) -> Arc<dyn ElectionHandle> {
        Arc::new(EtcdElectionHandle {
            client: self.client.clone(),
            lock_path: format!("{}/lock", path.trim_end_matches('/')),
            identity: identity.to_string(),
            held: Mutex::new(None),
        })
    }

    fn session_events(&self) -> broadcast::Receiver<SessionEvent> {
        self.session_tx.subscribe()
    }
}

/// Sequence-numbered persistent entries under `root`, guarded by a
/// lease-backed CAS lock so `get` is exclusive across consumers.
struct EtcdLockedQueue {
    client: Client,
    root: String,
}

impl EtcdLockedQueue {
    fn entries_prefix(&self) -> String {
        format!("{}/entries/", self.root)
    }

    fn seq_key(&self) -> String {
        format!("{}/_seq", self.root)
    }

    fn lock_key(&self) -> String {
        format!("{}/_lock", self.root)
    }

    async fn next_seq(&self) -> Result<u64, CoordinationError> {
        let seq_key = self.seq_key();
        loop {
            let mut client = self.client.clone();
            let current = client
                .get(seq_key.as_str(), None)
                .await
                .map_err(|e| CoordinationError::Unavailable(e.to_string()))?;
            let (value, version) = match current.kvs().first() {
                Some(kv) => (
                    String::from_utf8_lossy(kv.value()).parse::<u64>().unwrap_or(0),
                    kv.version(),
                ),
                None => (0, 0),
            };
            let next = value + 1;
            let txn = Txn::new()
                .when(vec![Compare::version(seq_key.as_str(), CompareOp::Equal, version)])
                .and_then(vec![TxnOp::put(seq_key.as_str(), next.to_string().into_bytes(), None)]);
            let resp = client.txn(txn).await.map_err(|e| CoordinationError::Unavailable(e.to_string()))?;
            if resp.succeeded() {
                return Ok(next);
            }
        }
    }

    async fn put_one(&self, item: Vec<u8>) -> Result<(), CoordinationError> {
        let seq = self.next_seq().await?;
        let key = format!("{}{:020}", self.entries_prefix(), seq);
        let mut client = self.client.clone();
        client
            .put(key, item, None)
            .await
            .map_err(|e| CoordinationError::Unavailable(e.to_string()))?;
        Ok(())
    }
}

#[async_trait]
impl LockedQueue for EtcdLockedQueue {
    async fn put(&self, item: Vec<u8>) -> Result<(), CoordinationError> {
        self.put_one(item).await
    }

    async fn put_all(&self, items: Vec<Vec<u8>>) -> Result<(), CoordinationError> {
        for item in items {
            self.put_one(item).await?;
        }
        Ok(())
    }

    async fn get(&self, timeout: Duration) -> Result<Option<(Lease, Vec<u8>)>, CoordinationError> {
        let lock_name = self.lock_key();
        let mut client = self.client.clone();
        let lease_resp = client
            .lease_grant(LEASE_TTL_SECS, None)
            .await
            .map_err(|e| CoordinationError::Unavailable(e.to_string()))?;
        let lease_id = lease_resp.id();

        let lock_opts = etcd_client::LockOptions::new().with_lease(lease_id);
        let lock_fut = client.lock(lock_name.as_str(), Some(lock_opts));
        let lock_resp = match tokio::time::timeout(timeout, lock_fut).await {
            Ok(Ok(resp)) => resp,
            Ok(Err(e)) => {
                let _ = client.lease_revoke(lease_id).await;
                return Err(CoordinationError::Unavailable(e.to_string()));
            }
            Err(_) => {
                let _ = client.lease_revoke(lease_id).await;
                return Ok(None);
            }
        };
        let lock_key = lock_resp.key().to_vec();

        let entries = client
            .get(self.entries_prefix().as_str(), Some(GetOptions::new().with_prefix()))
            .await
            .map_err(|e| CoordinationError::Unavailable(e.to_string()))?;
        let Some(first) = entries.kvs().first() else {
            let _ = client.unlock(lock_key).await;
            let _ = client.lease_revoke(lease_id).await;
            return Ok(None);
        };
        let entry_key = first.key().to_vec();
        let payload = first.value().to_vec();
        let token = format!(
            "{}|{}|{}",
            lease_id,
            String::from_utf8_lossy(&lock_key),
            String::from_utf8_lossy(&entry_key)
        );
        Ok(Some((Lease(token), payload)))
    }

    async fn consume(&self, lease: Lease) -> Result<(), CoordinationError> {
        let parts: Vec<&str> = lease.0.splitn(3, '|').collect();
        let [lease_id_s, lock_key, entry_key] = parts[..] else {
            return Err(CoordinationError::Protocol(format!("malformed lease token: {}", lease.0)));
        };
        let lease_id: i64 = lease_id_s
            .parse()
            .map_err(|_| CoordinationError::Protocol(format!("malformed lease id: {}", lease_id_s)))?;
        let mut client = self.client.clone();
        client
            .delete(entry_key, None)
            .await
            .map_err(|e| CoordinationError::Unavailable(e.to_string()))?;
        let _ = client.unlock(lock_key.as_bytes().to_vec()).await;
        let _ = client.lease_revoke(lease_id).await;
        Ok(())
    }

    async fn size(&self) -> Result<usize, CoordinationError> {
        let mut client = self.client.clone();
        let resp = client
            .get(
                self.entries_prefix().as_str(),
                Some(GetOptions::new().with_prefix().with_count_only()),
            )
            .await
            .map_err(|e| CoordinationError::Unavailable(e.to_string()))?;
        Ok(resp.count() as usize)
    }
}

struct HeldElection {
    lease_id: i64,
    cancel: CancellationToken,
}

/// Lease-backed compare-and-swap lock used both for the election barrier
/// and, indirectly, for the ephemeral leader key the coordinator creates
/// once it wins.
///
/// The CAS operates on `lock_path`, a child of the election path rather
/// than the election path itself: `Coordinator::new` `ensure_path`s the
/// election path as a persistent container before the role loop starts,
/// which puts it at version >= 1 and would make a `version == 0` CAS on
/// that same key fail forever. `lock_path` is never ensured, so it starts
/// absent (version 0) and the first `acquire` can actually win it.
struct EtcdElectionHandle {
    client: Client,
    lock_path: String,
    identity: String,
    held: Mutex<Option<HeldElection>>,
}

#[async_trait]
impl ElectionHandle for EtcdElectionHandle {
    async fn acquire(&self, timeout: Duration) -> Result<bool, CoordinationError> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let mut client = self.client.clone();
            let lease_resp = client
                .lease_grant(LEASE_TTL_SECS, None)
                .await
                .map_err(|e| CoordinationError::Unavailable(e.to_string()))?;
            let lease_id = lease_resp.id();

            let txn = Txn::new()
                .when(vec![Compare::version(self.lock_path.as_str(), CompareOp::Equal, 0)])
                .and_then(vec![TxnOp::put(
                    self.lock_path.as_str(),
                    self.identity.as_bytes().to_vec(),
                    Some(PutOptions::new().with_lease(lease_id)),
                )]);
            let resp = client.txn(txn).await.map_err(|e| CoordinationError::Unavailable(e.to_string()))?;

            if resp.succeeded() {
                let cancel = CancellationToken::new();
                let child = cancel.clone();
                let mut keepalive_client = self.client.clone();
                tokio::spawn(async move {
                    let (mut keeper, mut stream) = match keepalive_client.lease_keep_alive(lease_id).await {
                        Ok(pair) => pair,
                        Err(_) => return,
                    };
                    let interval = Duration::from_secs((LEASE_TTL_SECS / 3).max(1) as u64);
                    loop {
                        tokio::select! {
                            _ = child.cancelled() => return,
                            _ = tokio::time::sleep(interval) => {
                                if keeper.keep_alive().await.is_err() {
                                    return;
                                }
                                if stream.message().await.unwrap_or(None).is_none() {
                                    return;
                                }
                            }
                        }
                    }
                });
                *self.held.lock() = Some(HeldElection { lease_id, cancel });
                return Ok(true);
            }

            let _ = client.lease_revoke(lease_id).await;
            if tokio::time::Instant::now() >= deadline {
                return Ok(false);
            }
            tokio::time::sleep(Duration::from_millis(200)).await;
        }
    }

    async fn release(&self) -> Result<(), CoordinationError> {
        let held = self.held.lock().take();
        if let Some(held) = held {
            held.cancel.cancel();
            let mut client = self.client.clone();
            let _ = client.delete(self.lock_path.as_str(), None).await;
            let _ = client.lease_revoke(held.lease_id).await;
        }
        Ok(())
    }
}
