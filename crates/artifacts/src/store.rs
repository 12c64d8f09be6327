// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The [`ArtifactStore`] port: a thin façade over object storage with
//! list-prefix, exists, download-to-path, and upload-from-path. All
//! operations are best-effort idempotent; upload is a whole-object
//! replace.

use crate::error::StoreError;
use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use std::path::Path;

#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Keys under `prefix`, non-recursive beyond the flat object-store
    /// namespace (every key sharing the prefix is returned).
    async fn list(&self, prefix: &str) -> Result<Vec<String>, StoreError>;

    /// Non-existence here is a normal outcome, not an error.
    async fn exists(&self, key: &str) -> Result<bool, StoreError>;

    /// Download `key` to `local_path`, overwriting any existing file.
    /// `StoreError::NotFound` is distinguishable from a transport failure.
    async fn download(&self, key: &str, local_path: &Path) -> Result<(), StoreError>;

    /// Upload `local_path` to `key`, replacing any existing object.
    async fn upload(&self, local_path: &Path, key: &str) -> Result<(), StoreError>;
}

/// Production [`ArtifactStore`] backed by a (possibly S3-compatible,
/// non-AWS) object store, configured with a custom endpoint and static
/// credentials the way the original's `boto3` client pointed at
/// redBorder's own host.
pub struct S3ArtifactStore {
    client: aws_sdk_s3::Client,
    bucket: String,
}

impl S3ArtifactStore {
    pub async fn new(
        access_key: &str,
        secret_key: &str,
        region: &str,
        bucket: &str,
        endpoint_url: &str,
    ) -> Self {
        let region_provider =
            aws_config::meta::region::RegionProviderChain::first_try(aws_sdk_s3::config::Region::new(
                region.to_string(),
            ))
            .or_else("us-east-1");
        let creds = aws_sdk_s3::config::Credentials::new(access_key, secret_key, None, None, "rbc-artifacts");
        let sdk_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(region_provider)
            .endpoint_url(endpoint_url)
            .credentials_provider(creds)
            .load()
            .await;
        let client = aws_sdk_s3::Client::new(&sdk_config);
        Self { client, bucket: bucket.to_string() }
    }
}

#[async_trait]
impl ArtifactStore for S3ArtifactStore {
    async fn list(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        let mut keys = Vec::new();
        let mut continuation: Option<String> = None;
        loop {
            let mut req = self.client.list_objects_v2().bucket(&self.bucket).prefix(prefix);
            if let Some(token) = continuation.take() {
                req = req.continuation_token(token);
            }
            let resp = req.send().await.map_err(|e| StoreError::Transport(e.to_string()))?;
            for obj in resp.contents() {
                if let Some(key) = obj.key() {
                    keys.push(key.to_string());
                }
            }
            match resp.next_continuation_token() {
                Some(token) => continuation = Some(token.to_string()),
                None => break,
            }
        }
        Ok(keys)
    }

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        match self.client.head_object().bucket(&self.bucket).key(key).send().await {
            Ok(_) => Ok(true),
            Err(err) => {
                if is_not_found(&err) {
                    Ok(false)
                } else {
                    Err(StoreError::Transport(err.to_string()))
                }
            }
        }
    }

    async fn download(&self, key: &str, local_path: &Path) -> Result<(), StoreError> {
        let resp = self.client.get_object().bucket(&self.bucket).key(key).send().await.map_err(|err| {
            if is_not_found(&err) {
                StoreError::NotFound(key.to_string())
            } else {
                StoreError::Transport(err.to_string())
            }
        })?;
        let bytes = resp.body.collect().await.map_err(|e| StoreError::Transport(e.to_string()))?;
        if let Some(parent) = local_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| StoreError::Io { path: parent.display().to_string(), source })?;
        }
        tokio::fs::write(local_path, bytes.into_bytes())
            .await
            .map_err(|source| StoreError::Io { path: local_path.display().to_string(), source })?;
        Ok(())
    }

    async fn upload(&self, local_path: &Path, key: &str) -> Result<(), StoreError> {
        let body = ByteStream::from_path(local_path)
            .await
            .map_err(|source| StoreError::Io { path: local_path.display().to_string(), source: source.into() })?;
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(body)
            .send()
            .await
            .map_err(|e| StoreError::Transport(e.to_string()))?;
        tracing::info!(key, "uploaded artifact");
        Ok(())
    }
}

fn is_not_found<E>(err: &aws_sdk_s3::error::SdkError<E>) -> bool
where
    E: std::error::Error + 'static,
{
    match err {
        aws_sdk_s3::error::SdkError::ServiceError(service_err) => {
            let meta = service_err.raw().status().as_u16();
            meta == 404
        }
        _ => false,
    }
}

#[cfg(any(test, feature = "test-support"))]
pub mod fake {
    use super::*;
    use parking_lot::Mutex;
    use std::collections::HashMap;

    /// In-memory [`ArtifactStore`] for tests: objects are just byte
    /// buffers keyed by store key.
    #[derive(Default)]
    pub struct FakeArtifactStore {
        objects: Mutex<HashMap<String, Vec<u8>>>,
    }

    impl FakeArtifactStore {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn seed(&self, key: impl Into<String>, bytes: impl Into<Vec<u8>>) {
            self.objects.lock().insert(key.into(), bytes.into());
        }

        pub fn uploaded(&self, key: &str) -> Option<Vec<u8>> {
            self.objects.lock().get(key).cloned()
        }
    }

    #[async_trait]
    impl ArtifactStore for FakeArtifactStore {
        async fn list(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
            Ok(self.objects.lock().keys().filter(|k| k.starts_with(prefix)).cloned().collect())
        }

        async fn exists(&self, key: &str) -> Result<bool, StoreError> {
            Ok(self.objects.lock().contains_key(key))
        }

        async fn download(&self, key: &str, local_path: &Path) -> Result<(), StoreError> {
            let bytes = self
                .objects
                .lock()
                .get(key)
                .cloned()
                .ok_or_else(|| StoreError::NotFound(key.to_string()))?;
            if let Some(parent) = local_path.parent() {
                std::fs::create_dir_all(parent)
                    .map_err(|source| StoreError::Io { path: parent.display().to_string(), source })?;
            }
            std::fs::write(local_path, bytes)
                .map_err(|source| StoreError::Io { path: local_path.display().to_string(), source })?;
            Ok(())
        }

        async fn upload(&self, local_path: &Path, key: &str) -> Result<(), StoreError> {
            let bytes = std::fs::read(local_path)
                .map_err(|source| StoreError::Io { path: local_path.display().to_string(), source })?;
            self.objects.lock().insert(key.to_string(), bytes);
            Ok(())
        }
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
