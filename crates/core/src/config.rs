// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Application configuration, loaded from a TOML file.
//!
//! Section and key names are retained from the original Python
//! `ConfigManager`/`configparser` layout (`[ZooKeeper]`, `[AWS]`,
//! `[Outliers]`, `[Druid]`) even though the coordination backend here is
//! etcd rather than ZooKeeper: this is the fixed external configuration
//! surface named in the specification, not an implementation detail.

use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read { path: String, #[source] source: std::io::Error },

    #[error("failed to parse config file {path}: {source}")]
    Parse { path: String, #[source] source: toml::de::Error },

    #[error("missing required config value [{section}] {key}")]
    Missing { section: &'static str, key: &'static str },

    #[error("invalid config value [{section}] {key} = {value:?}: {reason}")]
    Invalid { section: &'static str, key: &'static str, value: String, reason: String },
}

/// `[ZooKeeper]` section — names kept from the original even though the
/// coordination client in this workspace is etcd-backed.
#[derive(Debug, Clone, Deserialize)]
pub struct ZooKeeperConfig {
    /// Comma-separated list of coordination-service endpoints.
    pub zk_hosts: String,
    /// Root path under which the coordinator's keys live.
    pub zk_sync_path: String,
    /// This node's identity, used as the leader-election candidate name.
    pub zk_name: String,
    /// Seconds between leader re-enqueues of the full model set.
    pub zk_sleep_time: u64,
    /// Seconds per role-loop tick.
    pub zk_tick_time: u64,
}

impl ZooKeeperConfig {
    pub fn hosts(&self) -> Vec<String> {
        self.zk_hosts.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect()
    }

    pub fn sleep_time(&self) -> Duration {
        Duration::from_secs(self.zk_sleep_time)
    }

    pub fn tick_time(&self) -> Duration {
        Duration::from_secs(self.zk_tick_time)
    }
}

/// `[AWS]` section — credentials and endpoint for the artifact store.
#[derive(Debug, Clone, Deserialize)]
pub struct AwsConfig {
    pub s3_public_key: String,
    pub s3_private_key: String,
    pub s3_region: String,
    pub s3_bucket: String,
    pub s3_hostname: String,
}

/// `[Outliers]` section — trainer invocation parameters.
#[derive(Debug, Clone, Deserialize)]
pub struct OutliersConfig {
    pub epochs: u32,
    pub batch_size: u32,
    pub backup_path: String,
    /// Model name used as the fallback artifact pair when a model's own
    /// artifacts are missing from the store. Defaults to `"traffic"`.
    #[serde(default = "default_model")]
    pub default_model: String,
}

fn default_model() -> String {
    "traffic".to_string()
}

/// `[Druid]` section — query engine endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct DruidConfig {
    pub druid_endpoint: String,
}

#[derive(Debug, Clone, Deserialize)]
struct RawAppConfig {
    #[serde(rename = "ZooKeeper")]
    zookeeper: ZooKeeperConfig,
    #[serde(rename = "AWS")]
    aws: AwsConfig,
    #[serde(rename = "Outliers")]
    outliers: OutliersConfig,
    #[serde(rename = "Druid")]
    druid: DruidConfig,
}

/// Fully parsed and validated application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub zookeeper: ZooKeeperConfig,
    pub aws: AwsConfig,
    pub outliers: OutliersConfig,
    pub druid: DruidConfig,
}

impl AppConfig {
    /// Load configuration from a TOML file at `path`, validating every
    /// required field. A fatal configuration error here is the supervisor's
    /// cue to abort before entering the role loop.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)
            .map_err(|source| ConfigError::Read { path: path.display().to_string(), source })?;
        Self::parse(&text, path)
    }

    fn parse(text: &str, path: &Path) -> Result<Self, ConfigError> {
        let raw: RawAppConfig = toml::from_str(text)
            .map_err(|source| ConfigError::Parse { path: path.display().to_string(), source })?;
        let config = AppConfig {
            zookeeper: raw.zookeeper,
            aws: raw.aws,
            outliers: raw.outliers,
            druid: raw.druid,
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.zookeeper.hosts().is_empty() {
            return Err(ConfigError::Missing { section: "ZooKeeper", key: "zk_hosts" });
        }
        if self.zookeeper.zk_name.trim().is_empty() {
            return Err(ConfigError::Missing { section: "ZooKeeper", key: "zk_name" });
        }
        if self.zookeeper.zk_sync_path.trim().is_empty() {
            return Err(ConfigError::Missing { section: "ZooKeeper", key: "zk_sync_path" });
        }
        if self.zookeeper.zk_tick_time == 0 {
            return Err(ConfigError::Invalid {
                section: "ZooKeeper",
                key: "zk_tick_time",
                value: "0".to_string(),
                reason: "tick time must be positive".to_string(),
            });
        }
        if self.aws.s3_bucket.trim().is_empty() {
            return Err(ConfigError::Missing { section: "AWS", key: "s3_bucket" });
        }
        if self.druid.druid_endpoint.trim().is_empty() {
            return Err(ConfigError::Missing { section: "Druid", key: "druid_endpoint" });
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
