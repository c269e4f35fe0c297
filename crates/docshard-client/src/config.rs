// Copyright (c) Docshard Contributors
// SPDX-License-Identifier: Apache-2.0

//! Store configuration
//!
//! The shard topology and tuning knobs of one logical store. Loaded from a
//! TOML file or from `DOCSHARD_*` environment variables.

use crate::error::ConfigError;
use docshard_network::ConnectionConfig;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_HILO_CAPACITY: u64 = 32;
pub const DEFAULT_HILO_MAX_CONFLICT_RETRIES: u32 = 8;
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 30_000;
pub const DEFAULT_REQUEST_LOG_CAPACITY: usize = 20;
pub const DEFAULT_VIRTUAL_NODES: u32 = 150;

/// One shard of the topology
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardSpec {
    pub name: String,
    /// Collections hosted by this shard
    #[serde(default)]
    pub collections: Vec<String>,
}

impl ShardSpec {
    pub fn new<I, S>(name: impl Into<String>, collections: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            collections: collections.into_iter().map(Into::into).collect(),
        }
    }
}

/// Store configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Ids reserved per HiLo refill
    pub hilo_capacity: u64,
    /// CAS retries after a contended HiLo refill
    pub hilo_max_conflict_retries: u32,
    /// Per-shard round-trip deadline
    pub request_timeout_ms: u64,
    /// Requests kept in each shard's recent request log
    pub request_log_capacity: usize,
    /// Hash ring density for split collections
    pub virtual_nodes: u32,
    /// Shards in registry enumeration order
    pub shards: Vec<ShardSpec>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            shards: vec![
                ShardSpec::new("Users", ["Users"]),
                ShardSpec::new("Orders", ["Orders"]),
            ],
            hilo_capacity: DEFAULT_HILO_CAPACITY,
            hilo_max_conflict_retries: DEFAULT_HILO_MAX_CONFLICT_RETRIES,
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
            request_log_capacity: DEFAULT_REQUEST_LOG_CAPACITY,
            virtual_nodes: DEFAULT_VIRTUAL_NODES,
        }
    }
}

impl StoreConfig {
    pub fn new(shards: Vec<ShardSpec>) -> Self {
        Self {
            shards,
            ..Self::default()
        }
    }

    pub fn with_hilo_capacity(mut self, capacity: u64) -> Self {
        self.hilo_capacity = capacity;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Load config from file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: StoreConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save config to file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Defaults overridden by `DOCSHARD_*` environment variables
    ///
    /// `DOCSHARD_SHARDS` takes `name=Coll1,Coll2;name2=Coll3`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    pub(crate) fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(shards) = lookup("DOCSHARD_SHARDS") {
            config.shards = parse_shards(&shards)?;
        }
        if let Some(v) = parse_var(&lookup, "DOCSHARD_HILO_CAPACITY")? {
            config.hilo_capacity = v;
        }
        if let Some(v) = parse_var(&lookup, "DOCSHARD_HILO_MAX_CONFLICT_RETRIES")? {
            config.hilo_max_conflict_retries = v;
        }
        if let Some(v) = parse_var(&lookup, "DOCSHARD_REQUEST_TIMEOUT_MS")? {
            config.request_timeout_ms = v;
        }
        if let Some(v) = parse_var(&lookup, "DOCSHARD_REQUEST_LOG_CAPACITY")? {
            config.request_log_capacity = v;
        }
        if let Some(v) = parse_var(&lookup, "DOCSHARD_VIRTUAL_NODES")? {
            config.virtual_nodes = v;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut names = HashSet::new();
        for shard in &self.shards {
            if shard.name.trim().is_empty() {
                return Err(ConfigError::Invalid("shard name must not be empty".to_string()));
            }
            if !names.insert(shard.name.as_str()) {
                return Err(ConfigError::Invalid(format!("duplicate shard name {}", shard.name)));
            }
            let mut collections = HashSet::new();
            for collection in &shard.collections {
                if !collections.insert(collection.as_str()) {
                    return Err(ConfigError::Invalid(format!(
                        "shard {} lists collection {} twice",
                        shard.name, collection
                    )));
                }
            }
        }
        if self.hilo_capacity == 0 {
            return Err(ConfigError::Invalid("hilo_capacity must be positive".to_string()));
        }
        if self.request_timeout_ms == 0 {
            return Err(ConfigError::Invalid("request_timeout_ms must be positive".to_string()));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn connection_config(&self) -> ConnectionConfig {
        ConnectionConfig {
            request_timeout: self.request_timeout(),
            request_log_capacity: self.request_log_capacity,
        }
    }
}

fn parse_var<F, T>(lookup: &F, var: &str) -> Result<Option<T>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(var) {
        None => Ok(None),
        Some(value) => match value.trim().parse().ok() {
            Some(parsed) => Ok(Some(parsed)),
            None => Err(ConfigError::InvalidEnv {
                var: var.to_string(),
                value,
            }),
        },
    }
}

fn parse_shards(value: &str) -> Result<Vec<ShardSpec>, ConfigError> {
    value
        .split(';')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let (name, collections) = entry.split_once('=').ok_or_else(|| ConfigError::InvalidEnv {
                var: "DOCSHARD_SHARDS".to_string(),
                value: entry.to_string(),
            })?;
            let collections = collections
                .split(',')
                .map(str::trim)
                .filter(|c| !c.is_empty());
            Ok(ShardSpec::new(name.trim(), collections))
        })
        .collect()
}
