// Copyright (c) Docshard Contributors
// SPDX-License-Identifier: Apache-2.0

//! Sharded document store
//!
//! Process-scoped entry point: owns the shard registry, the resolution
//! strategy and one HiLo allocator per shard, and opens sessions.

use crate::config::StoreConfig;
use crate::error::StoreError;
use crate::hilo::HiLoAllocator;
use crate::session::ShardedSession;
use docshard_network::RequestRecord;
use docshard_router::{
    CollectionShardStrategy, RouterResult, Shard, ShardRegistry, ShardResolutionStrategy,
};
use docshard_storage::{MemoryShardStore, ShardBackend};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

/// State shared by a store and all of its sessions
#[derive(Debug)]
pub(crate) struct StoreInner {
    pub(crate) config: StoreConfig,
    pub(crate) registry: ShardRegistry,
    pub(crate) strategy: Arc<dyn ShardResolutionStrategy>,
    pub(crate) allocators: HashMap<String, HiLoAllocator>,
}

/// Logical document store spread over several shards
#[derive(Debug, Clone)]
pub struct ShardedDocumentStore {
    inner: Arc<StoreInner>,
}

impl ShardedDocumentStore {
    pub fn builder(config: StoreConfig) -> StoreBuilder {
        StoreBuilder {
            config,
            backends: HashMap::new(),
            strategy: None,
        }
    }

    /// Store whose shards all live in this process
    pub fn in_memory(config: StoreConfig) -> Result<Self, StoreError> {
        let mut builder = Self::builder(config);
        let names: Vec<String> = builder.config.shards.iter().map(|s| s.name.clone()).collect();
        for name in names {
            let backend = Arc::new(MemoryShardStore::new(name.clone()));
            builder = builder.backend(name, backend);
        }
        builder.build()
    }

    /// Start a unit of work
    pub fn open_session(&self) -> ShardedSession {
        ShardedSession::new(self.inner.clone())
    }

    pub fn config(&self) -> &StoreConfig {
        &self.inner.config
    }

    pub fn registry(&self) -> &ShardRegistry {
        &self.inner.registry
    }

    pub fn strategy(&self) -> &dyn ShardResolutionStrategy {
        self.inner.strategy.as_ref()
    }

    /// Shard(s) that own an entity (with `id`) or serve a query (without)
    pub fn resolve(&self, collection: Option<&str>, id: Option<&str>) -> RouterResult<Vec<String>> {
        match (collection, id) {
            (Some(collection), Some(id)) => {
                Ok(vec![self.inner.strategy.resolve_for_entity(collection, id)?])
            }
            (collection, _) => self.inner.strategy.resolve_for_query(collection),
        }
    }

    /// Request counts per shard in registry order
    pub fn request_counts(&self) -> Vec<(String, u64)> {
        self.inner
            .registry
            .shards()
            .iter()
            .map(|s| (s.name().to_string(), s.connection().request_count()))
            .collect()
    }

    pub fn shard(&self, name: &str) -> Option<ShardHandle<'_>> {
        let shard = self.inner.registry.get(name).ok()?;
        let allocator = self.inner.allocators.get(name)?;
        Some(ShardHandle { shard, allocator })
    }

    /// Reset counters and request logs of every shard
    pub fn reset_diagnostics(&self) {
        for shard in self.inner.registry.shards() {
            shard.connection().reset();
        }
    }
}

/// Diagnostics view of one shard
#[derive(Debug, Clone, Copy)]
pub struct ShardHandle<'a> {
    shard: &'a Shard,
    allocator: &'a HiLoAllocator,
}

impl<'a> ShardHandle<'a> {
    pub fn name(&self) -> &'a str {
        self.shard.name()
    }

    pub fn request_count(&self) -> u64 {
        self.shard.connection().request_count()
    }

    /// Recent requests, oldest first
    pub fn last_requests(&self) -> Vec<RequestRecord> {
        self.shard.connection().last_requests()
    }

    /// The `n` most recent requests, oldest first
    pub fn recent_requests(&self, n: usize) -> Vec<RequestRecord> {
        self.shard.connection().log().recent(n)
    }

    pub fn hilo_refills(&self) -> u64 {
        self.allocator.refill_count()
    }

    pub fn reset_diagnostics(&self) {
        self.shard.connection().reset();
    }
}

/// Builder for [`ShardedDocumentStore`]
pub struct StoreBuilder {
    config: StoreConfig,
    backends: HashMap<String, Arc<dyn ShardBackend>>,
    strategy: Option<Arc<dyn ShardResolutionStrategy>>,
}

impl StoreBuilder {
    /// Backend for the configured shard `name`
    pub fn backend(mut self, name: impl Into<String>, backend: Arc<dyn ShardBackend>) -> Self {
        self.backends.insert(name.into(), backend);
        self
    }

    /// Replace the default collection table strategy
    pub fn strategy(mut self, strategy: Arc<dyn ShardResolutionStrategy>) -> Self {
        self.strategy = Some(strategy);
        self
    }

    pub fn build(mut self) -> Result<ShardedDocumentStore, StoreError> {
        self.config.validate()?;

        let mut registry = ShardRegistry::builder().connection_config(self.config.connection_config());
        for spec in &self.config.shards {
            let backend = self
                .backends
                .remove(&spec.name)
                .ok_or_else(|| StoreError::MissingBackend(spec.name.clone()))?;
            registry = registry.shard(spec.name.clone(), backend, spec.collections.clone());
        }
        let registry = registry.build()?;

        let strategy = match self.strategy {
            Some(strategy) => strategy,
            None => Arc::new(CollectionShardStrategy::new(&registry, self.config.virtual_nodes)),
        };

        let allocators = registry
            .shards()
            .iter()
            .map(|shard| {
                let allocator = HiLoAllocator::new(
                    shard.connection().clone(),
                    self.config.hilo_capacity,
                    self.config.hilo_max_conflict_retries,
                );
                (shard.name().to_string(), allocator)
            })
            .collect();

        info!(
            shards = ?registry.names(),
            hilo_capacity = self.config.hilo_capacity,
            "Sharded document store ready"
        );

        Ok(ShardedDocumentStore {
            inner: Arc::new(StoreInner {
                config: self.config,
                registry,
                strategy,
                allocators,
            }),
        })
    }
}
