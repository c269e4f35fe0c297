//! Shard resolution strategy
//!
//! Maps an entity or a query target to the shard name(s) that own it. Entity
//! resolution always yields exactly one shard; query resolution yields one
//! shard, a subset, or the whole registry (broadcast).

use crate::consistent_hash::HashRing;
use crate::error::{RouterError, RouterResult};
use crate::registry::ShardRegistry;
use docshard_types::split_shard_tag;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, trace};

/// Where a brand-new entity goes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Placement {
    /// Target shard
    pub shard: String,
    /// The assigned id must carry the shard as its leading tag
    pub tagged: bool,
}

/// Trait for shard resolution
///
/// Implementations must be pure with respect to the registry: the same
/// (collection, id) maps to the same shard for the lifetime of the strategy.
pub trait ShardResolutionStrategy: Send + Sync + std::fmt::Debug {
    /// Owning shard of an existing entity
    fn resolve_for_entity(&self, collection: &str, id: &str) -> RouterResult<String>;

    /// Shards a query must visit, in registry order
    fn resolve_for_query(&self, collection: Option<&str>) -> RouterResult<Vec<String>>;

    /// Target shard of an entity that has no id yet
    fn place_new_entity(&self, collection: &str) -> RouterResult<Placement>;
}

#[derive(Debug)]
enum CollectionRoute {
    Single(String),
    Split { shards: Vec<String>, ring: HashRing },
}

/// Collection table strategy
///
/// A collection hosted by one shard always resolves to it. A collection
/// hosted by several shards resolves by the shard tag in the id, falling
/// back to a consistent hash of the id. Unknown collections are treated as
/// split across the whole registry.
#[derive(Debug)]
pub struct CollectionShardStrategy {
    all_shards: Vec<String>,
    fallback_ring: HashRing,
    routes: HashMap<String, CollectionRoute>,
    next_placement: AtomicUsize,
}

impl CollectionShardStrategy {
    pub fn new(registry: &ShardRegistry, virtual_nodes: u32) -> Self {
        let all_shards = registry.names();
        let mut routes = HashMap::new();

        for shard in registry.shards() {
            for collection in shard.collections() {
                if routes.contains_key(collection) {
                    continue;
                }
                let hosts = registry.hosts_of(collection);
                let route = if hosts.len() == 1 {
                    CollectionRoute::Single(hosts[0].clone())
                } else {
                    CollectionRoute::Split {
                        ring: HashRing::with_virtual_nodes(&hosts, virtual_nodes),
                        shards: hosts,
                    }
                };
                debug!(collection = %collection, route = ?route, "Collection route");
                routes.insert(collection.clone(), route);
            }
        }

        Self {
            fallback_ring: HashRing::with_virtual_nodes(&all_shards, virtual_nodes),
            all_shards,
            routes,
            next_placement: AtomicUsize::new(0),
        }
    }

    fn candidates(&self, collection: &str) -> (&[String], &HashRing) {
        match self.routes.get(collection) {
            Some(CollectionRoute::Split { shards, ring }) => (shards.as_slice(), ring),
            _ => (self.all_shards.as_slice(), &self.fallback_ring),
        }
    }

    /// Whether `collection` belongs to exactly one shard
    pub fn is_single_shard(&self, collection: &str) -> bool {
        matches!(self.routes.get(collection), Some(CollectionRoute::Single(_)))
    }

    fn ensure_shards(&self, target: impl FnOnce() -> String) -> RouterResult<()> {
        if self.all_shards.is_empty() {
            return Err(RouterError::unresolvable(target()));
        }
        Ok(())
    }
}

impl ShardResolutionStrategy for CollectionShardStrategy {
    fn resolve_for_entity(&self, collection: &str, id: &str) -> RouterResult<String> {
        self.ensure_shards(|| format!("{}:{}", collection, id))?;

        if let Some(CollectionRoute::Single(shard)) = self.routes.get(collection) {
            trace!(collection = %collection, id = %id, shard = %shard, "Resolved by collection");
            return Ok(shard.clone());
        }

        let (shards, ring) = self.candidates(collection);
        if let Some((tag, _)) = split_shard_tag(id) {
            if shards.iter().any(|s| s == tag) {
                trace!(collection = %collection, id = %id, shard = %tag, "Resolved by id tag");
                return Ok(tag.to_string());
            }
        }

        let shard = ring
            .locate(id)
            .ok_or_else(|| RouterError::unresolvable(format!("{}:{}", collection, id)))?;
        trace!(collection = %collection, id = %id, shard = %shard, "Resolved by hash ring");
        Ok(shard.to_string())
    }

    fn resolve_for_query(&self, collection: Option<&str>) -> RouterResult<Vec<String>> {
        self.ensure_shards(|| collection.unwrap_or("<all collections>").to_string())?;

        let shards = match collection.and_then(|c| self.routes.get(c)) {
            Some(CollectionRoute::Single(shard)) => vec![shard.clone()],
            Some(CollectionRoute::Split { shards, .. }) => shards.clone(),
            None => self.all_shards.clone(),
        };
        debug!(collection = ?collection, shards = ?shards, "Resolved query targets");
        Ok(shards)
    }

    fn place_new_entity(&self, collection: &str) -> RouterResult<Placement> {
        self.ensure_shards(|| collection.to_string())?;

        if let Some(CollectionRoute::Single(shard)) = self.routes.get(collection) {
            return Ok(Placement {
                shard: shard.clone(),
                tagged: false,
            });
        }

        let (shards, _) = self.candidates(collection);
        let turn = self.next_placement.fetch_add(1, Ordering::Relaxed);
        let shard = shards[turn % shards.len()].clone();
        debug!(collection = %collection, shard = %shard, "Placed new entity");
        Ok(Placement {
            shard,
            tagged: shards.len() > 1,
        })
    }
}
