//! Shard registry
//!
//! Holds the named shards of one logical store together with their
//! connections. The registry is built once and never changes afterwards;
//! its enumeration order is the order shards were added.

use crate::error::{RouterError, RouterResult};
use docshard_network::{ConnectionConfig, ShardConnection};
use docshard_storage::ShardBackend;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

/// One named shard and the collections it hosts
#[derive(Debug, Clone)]
pub struct Shard {
    name: String,
    collections: Vec<String>,
    connection: ShardConnection,
}

impl Shard {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Collections this shard is configured to host
    pub fn collections(&self) -> &[String] {
        &self.collections
    }

    pub fn hosts(&self, collection: &str) -> bool {
        self.collections.iter().any(|c| c == collection)
    }

    pub fn connection(&self) -> &ShardConnection {
        &self.connection
    }
}

/// Immutable set of shards
#[derive(Debug)]
pub struct ShardRegistry {
    shards: Vec<Shard>,
    index: HashMap<String, usize>,
}

impl ShardRegistry {
    pub fn builder() -> ShardRegistryBuilder {
        ShardRegistryBuilder::default()
    }

    pub fn get(&self, name: &str) -> RouterResult<&Shard> {
        self.index
            .get(name)
            .map(|&i| &self.shards[i])
            .ok_or_else(|| RouterError::UnknownShard(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Position of a shard in enumeration order
    pub fn position(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub fn shards(&self) -> &[Shard] {
        &self.shards
    }

    pub fn names(&self) -> Vec<String> {
        self.shards.iter().map(|s| s.name.clone()).collect()
    }

    /// Shards hosting `collection`, in enumeration order
    pub fn hosts_of(&self, collection: &str) -> Vec<String> {
        self.shards
            .iter()
            .filter(|s| s.hosts(collection))
            .map(|s| s.name.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.shards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shards.is_empty()
    }
}

struct PendingShard {
    name: String,
    collections: Vec<String>,
    backend: Arc<dyn ShardBackend>,
}

/// Builder for [`ShardRegistry`]
#[derive(Default)]
pub struct ShardRegistryBuilder {
    pending: Vec<PendingShard>,
    connection: ConnectionConfig,
}

impl ShardRegistryBuilder {
    pub fn connection_config(mut self, config: ConnectionConfig) -> Self {
        self.connection = config;
        self
    }

    pub fn shard<I, S>(mut self, name: impl Into<String>, backend: Arc<dyn ShardBackend>, collections: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.pending.push(PendingShard {
            name: name.into(),
            collections: collections.into_iter().map(Into::into).collect(),
            backend,
        });
        self
    }

    pub fn build(self) -> RouterResult<ShardRegistry> {
        let mut shards = Vec::with_capacity(self.pending.len());
        let mut index = HashMap::with_capacity(self.pending.len());

        for pending in self.pending {
            if pending.name.trim().is_empty() {
                return Err(RouterError::InvalidConfig("shard name must not be empty".to_string()));
            }
            if index.contains_key(&pending.name) {
                return Err(RouterError::DuplicateShard(pending.name));
            }

            debug!(
                shard = %pending.name,
                collections = ?pending.collections,
                "Registering shard"
            );
            let connection =
                ShardConnection::new(pending.name.clone(), pending.backend, self.connection.clone());
            index.insert(pending.name.clone(), shards.len());
            shards.push(Shard {
                name: pending.name,
                collections: pending.collections,
                connection,
            });
        }

        info!(shard_count = shards.len(), "Shard registry built");
        Ok(ShardRegistry { shards, index })
    }
}
