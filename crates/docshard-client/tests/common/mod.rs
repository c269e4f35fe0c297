//! Shared helpers for the client integration tests

#![allow(dead_code)]

use docshard_client::{ShardSpec, ShardedDocumentStore, StoreConfig};
use docshard_storage::MemoryShardStore;
use std::sync::Arc;

/// Initialize tracing for tests
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

/// In-memory shards kept alongside the store so tests can inspect them and
/// inject faults
pub struct Cluster {
    pub store: ShardedDocumentStore,
    pub shards: Vec<Arc<MemoryShardStore>>,
}

impl Cluster {
    pub fn start(config: StoreConfig) -> Self {
        init_tracing();
        let shards: Vec<Arc<MemoryShardStore>> = config
            .shards
            .iter()
            .map(|spec| Arc::new(MemoryShardStore::new(spec.name.clone())))
            .collect();

        let mut builder = ShardedDocumentStore::builder(config);
        for shard in &shards {
            builder = builder.backend(shard.name(), shard.clone());
        }
        let store = builder.build().expect("store builds");
        Self { store, shards }
    }

    /// `Users` and `Orders` shards, each hosting the collection of its name
    pub fn users_and_orders() -> Self {
        Self::start(StoreConfig::default())
    }

    pub fn shard(&self, name: &str) -> &Arc<MemoryShardStore> {
        self.shards
            .iter()
            .find(|s| s.name() == name)
            .expect("shard exists")
    }

    pub fn count(&self, name: &str) -> u64 {
        self.store.shard(name).expect("shard exists").request_count()
    }
}

pub fn users_split_config() -> StoreConfig {
    StoreConfig::new(vec![
        ShardSpec::new("Users-A", ["Users"]),
        ShardSpec::new("Users-B", ["Users"]),
        ShardSpec::new("Orders", ["Orders"]),
    ])
}
