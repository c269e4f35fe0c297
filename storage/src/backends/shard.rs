//! ShardBackend trait: the contract every shard exposes to the routing layer
//!
//! Each method is exactly one network round trip. The routing layer wraps a
//! backend in a counting connection, so implementations must not fan out
//! into further calls to other shards.

use async_trait::async_trait;
use docshard_types::{Document, EntityKey, HiLoGrant, Query, ShardResult};
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

/// One write inside a shard batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum WriteCommand {
    /// Insert or replace a document (must carry an id)
    Put(Document),
    /// Remove a document if present
    Delete(EntityKey),
}

impl WriteCommand {
    /// Key the command applies to, if the document has one
    pub fn key(&self) -> Option<EntityKey> {
        match self {
            WriteCommand::Put(doc) => doc.key(),
            WriteCommand::Delete(key) => Some(key.clone()),
        }
    }
}

/// Ordered writes applied by a shard in a single round trip
pub type WriteBatch = Vec<WriteCommand>;

/// Backend trait for a single shard
///
/// Implementations: [`crate::memory::MemoryShardStore`] for tests and
/// embedded use; remote transports implement the same trait.
#[async_trait]
pub trait ShardBackend: Send + Sync + Debug {
    /// Load one document
    async fn load(&self, key: &EntityKey) -> ShardResult<Option<Document>>;

    /// Load several documents; the result is positionally aligned with `keys`
    async fn load_many(&self, keys: &[EntityKey]) -> ShardResult<Vec<Option<Document>>>;

    /// Apply a batch of writes in order
    async fn store(&self, batch: WriteBatch) -> ShardResult<()>;

    /// Run a query; results honour the query's sort and limit
    async fn query(&self, query: &Query) -> ShardResult<Vec<Document>>;

    /// Current HiLo high-water mark for an entity type, `None` if never allocated
    async fn read_hilo(&self, entity_type: &str) -> ShardResult<Option<u64>>;

    /// Move the high-water mark from `expected_max` to `expected_max + capacity`
    async fn allocate_id_range(
        &self,
        entity_type: &str,
        expected_max: u64,
        capacity: u64,
    ) -> ShardResult<HiLoGrant>;
}
