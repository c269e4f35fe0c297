//! Consistent hash ring for collections split over several shards
//!
//! - Same id always lands on the same shard for the life of the ring
//! - Virtual nodes keep the split even across shards

use blake3::Hasher;
use std::collections::BTreeMap;
use tracing::{debug, trace};

/// Default number of virtual nodes per shard
pub const DEFAULT_VIRTUAL_NODES: u32 = 150;

/// Hash ring over a fixed set of shard names
#[derive(Clone)]
pub struct HashRing {
    virtual_nodes: u32,
    ring: BTreeMap<u64, String>,
}

impl HashRing {
    pub fn new<S: AsRef<str>>(shards: &[S]) -> Self {
        Self::with_virtual_nodes(shards, DEFAULT_VIRTUAL_NODES)
    }

    pub fn with_virtual_nodes<S: AsRef<str>>(shards: &[S], virtual_nodes: u32) -> Self {
        let virtual_nodes = virtual_nodes.max(1);
        let mut ring = BTreeMap::new();

        for shard in shards {
            let shard = shard.as_ref();
            for vn in 0..virtual_nodes {
                let key = format!("{}:{}", shard, vn);
                ring.insert(hash_key(&key), shard.to_string());
            }
        }

        debug!(
            shard_count = shards.len(),
            ring_size = ring.len(),
            "Built hash ring"
        );

        Self {
            virtual_nodes,
            ring,
        }
    }

    /// Shard owning `key`, or None for an empty ring
    pub fn locate(&self, key: &str) -> Option<&str> {
        let hash = hash_key(key);
        trace!(key = %key, hash = %hash, "Consistent hash lookup");

        // First node >= hash, wrapping around to the start
        self.ring
            .range(hash..)
            .next()
            .or_else(|| self.ring.iter().next())
            .map(|(_, shard)| shard.as_str())
    }

    pub fn virtual_nodes(&self) -> u32 {
        self.virtual_nodes
    }

    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }
}

impl std::fmt::Debug for HashRing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HashRing")
            .field("virtual_nodes", &self.virtual_nodes)
            .field("ring_size", &self.ring.len())
            .finish()
    }
}

/// Hash a string key using blake3
fn hash_key(key: &str) -> u64 {
    let mut hasher = Hasher::new();
    hasher.update(key.as_bytes());
    let hash = hasher.finalize();
    let bytes = hash.as_bytes();
    u64::from_le_bytes([
        bytes[0], bytes[1], bytes[2], bytes[3],
        bytes[4], bytes[5], bytes[6], bytes[7],
    ])
}
