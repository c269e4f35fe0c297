// Copyright (c) Docshard Contributors
// SPDX-License-Identifier: Apache-2.0

//! HiLo identity allocator
//!
//! One allocator per shard, one range per entity type. Ids are served
//! locally from the reserved range; only an exhausted or missing range costs
//! round trips:
//!
//! - cold: read the server mark, then reserve by compare-and-swap (2 calls)
//! - warm: the last reserved mark is known, reserve directly (1 call)
//! - contended: the CAS answers with the current mark and is retried
//!
//! Refills for one entity type are serialized by the slot mutex, so callers
//! arriving during a refill wait for it and then draw from the new range.

use crate::error::HiLoError;
use dashmap::DashMap;
use docshard_network::ShardConnection;
use docshard_types::{HiLoGrant, IdRange, ShardError};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

#[derive(Debug, Default)]
struct HiLoSlot {
    range: Option<IdRange>,
    next: u64,
    /// High mark this allocator reserved last
    reserved_max: Option<u64>,
}

impl HiLoSlot {
    fn take(&mut self) -> Option<u64> {
        let range = self.range?;
        if self.next > range.high {
            return None;
        }
        let id = self.next;
        self.next += 1;
        Some(id)
    }

    fn install(&mut self, range: IdRange) {
        self.range = Some(range);
        self.next = range.low;
        self.reserved_max = Some(range.high);
    }
}

/// Per-shard HiLo allocator
#[derive(Debug)]
pub struct HiLoAllocator {
    connection: ShardConnection,
    capacity: u64,
    max_conflict_retries: u32,
    slots: DashMap<String, Arc<Mutex<HiLoSlot>>>,
    refills: AtomicU64,
}

impl HiLoAllocator {
    pub fn new(connection: ShardConnection, capacity: u64, max_conflict_retries: u32) -> Self {
        Self {
            connection,
            capacity: capacity.max(1),
            max_conflict_retries,
            slots: DashMap::new(),
            refills: AtomicU64::new(0),
        }
    }

    pub fn shard(&self) -> &str {
        self.connection.shard()
    }

    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    /// Ranges reserved so far
    pub fn refill_count(&self) -> u64 {
        self.refills.load(Ordering::Relaxed)
    }

    /// Next id for `entity_type` on this shard
    pub async fn next_id(&self, entity_type: &str) -> Result<u64, HiLoError> {
        let slot = self
            .slots
            .entry(entity_type.to_string())
            .or_default()
            .clone();
        let mut slot = slot.lock().await;

        if let Some(id) = slot.take() {
            return Ok(id);
        }

        let range = self.reserve(entity_type, slot.reserved_max).await?;
        slot.install(range);
        slot.take().ok_or_else(|| HiLoError::ConflictRetriesExhausted {
            shard: self.shard().to_string(),
            entity_type: entity_type.to_string(),
            attempts: 0,
        })
    }

    async fn reserve(&self, entity_type: &str, known_max: Option<u64>) -> Result<IdRange, HiLoError> {
        let unavailable = |source: ShardError| HiLoError::ShardUnavailable {
            entity_type: entity_type.to_string(),
            source,
        };

        let mut expected = match known_max {
            Some(max) => max,
            None => self
                .connection
                .read_hilo(entity_type)
                .await
                .map_err(unavailable)?
                .unwrap_or(0),
        };

        let attempts = self.max_conflict_retries + 1;
        for attempt in 1..=attempts {
            let grant = self
                .connection
                .allocate_id_range(entity_type, expected, self.capacity)
                .await
                .map_err(unavailable)?;

            match grant {
                HiLoGrant::Granted(range) => {
                    self.refills.fetch_add(1, Ordering::Relaxed);
                    info!(
                        shard = %self.shard(),
                        entity_type = %entity_type,
                        low = range.low,
                        high = range.high,
                        "Reserved HiLo range"
                    );
                    return Ok(range);
                }
                HiLoGrant::Conflict { current_max } => {
                    debug!(
                        shard = %self.shard(),
                        entity_type = %entity_type,
                        expected,
                        current_max,
                        attempt,
                        "HiLo reservation contended"
                    );
                    expected = current_max;
                }
            }
        }

        warn!(
            shard = %self.shard(),
            entity_type = %entity_type,
            attempts,
            "Giving up on contended HiLo reservation"
        );
        Err(HiLoError::ConflictRetriesExhausted {
            shard: self.shard().to_string(),
            entity_type: entity_type.to_string(),
            attempts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docshard_network::ConnectionConfig;
    use docshard_storage::{FaultMode, MemoryShardStore, ShardBackend};
    use std::collections::HashSet;

    fn allocator(shard: &Arc<MemoryShardStore>, capacity: u64) -> HiLoAllocator {
        let connection = ShardConnection::new(shard.name(), shard.clone(), ConnectionConfig::default());
        HiLoAllocator::new(connection, capacity, 2)
    }

    #[tokio::test]
    async fn test_cold_then_local() {
        let shard = Arc::new(MemoryShardStore::new("Users"));
        let hilo = allocator(&shard, 4);

        assert_eq!(hilo.next_id("Users").await.unwrap(), 1);
        assert_eq!(hilo.connection.request_count(), 2);

        for expected in 2..=4 {
            assert_eq!(hilo.next_id("Users").await.unwrap(), expected);
        }
        assert_eq!(hilo.connection.request_count(), 2);
        assert_eq!(hilo.refill_count(), 1);
    }

    #[tokio::test]
    async fn test_warm_refill_is_one_round_trip() {
        let shard = Arc::new(MemoryShardStore::new("Users"));
        let hilo = allocator(&shard, 4);

        for _ in 0..4 {
            hilo.next_id("Users").await.unwrap();
        }
        assert_eq!(hilo.next_id("Users").await.unwrap(), 5);
        assert_eq!(hilo.connection.request_count(), 3);
        assert_eq!(hilo.refill_count(), 2);
        assert_eq!(shard.hilo_mark("Users"), Some(8));
    }

    #[tokio::test]
    async fn test_entity_types_are_independent() {
        let shard = Arc::new(MemoryShardStore::new("Shop"));
        let hilo = allocator(&shard, 4);

        assert_eq!(hilo.next_id("Users").await.unwrap(), 1);
        assert_eq!(hilo.next_id("Orders").await.unwrap(), 1);
        assert_eq!(hilo.refill_count(), 2);
    }

    #[tokio::test]
    async fn test_two_clients_never_share_ids() {
        let shard = Arc::new(MemoryShardStore::new("Users"));
        let a = allocator(&shard, 3);
        let b = allocator(&shard, 3);

        let mut seen = HashSet::new();
        for _ in 0..10 {
            assert!(seen.insert(a.next_id("Users").await.unwrap()));
            assert!(seen.insert(b.next_id("Users").await.unwrap()));
        }
    }

    #[tokio::test]
    async fn test_conflict_is_retried_with_current_mark() {
        let shard = Arc::new(MemoryShardStore::new("Users"));
        let hilo = allocator(&shard, 4);
        hilo.next_id("Users").await.unwrap();

        // Another client moves the mark past our last reservation
        shard.allocate_id_range("Users", 4, 10).await.unwrap();
        for _ in 0..3 {
            hilo.next_id("Users").await.unwrap();
        }
        assert_eq!(hilo.next_id("Users").await.unwrap(), 15);
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_refill() {
        let shard = Arc::new(MemoryShardStore::new("Users"));
        let hilo = Arc::new(allocator(&shard, 16));

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let hilo = hilo.clone();
                tokio::spawn(async move { hilo.next_id("Users").await.unwrap() })
            })
            .collect();

        let mut ids = HashSet::new();
        for handle in handles {
            ids.insert(handle.await.unwrap());
        }
        assert_eq!(ids.len(), 16);
        assert_eq!(hilo.refill_count(), 1);
    }

    #[tokio::test]
    async fn test_unreachable_shard() {
        let shard = Arc::new(MemoryShardStore::new("Users"));
        shard.set_fault(FaultMode::Unreachable);
        let hilo = allocator(&shard, 4);

        let err = hilo.next_id("Users").await.unwrap_err();
        assert!(matches!(err, HiLoError::ShardUnavailable { .. }));
        assert_eq!(hilo.refill_count(), 0);
    }
}
