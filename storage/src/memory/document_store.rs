//! In-memory implementation of ShardBackend
//!
//! This implementation uses DashMap for concurrent access, making it
//! suitable for tests, demos and embedded single-process deployments.
//! Fault injection lets tests simulate an unreachable shard, a lost
//! response after a write was applied, or a stalled shard.
//!
//! # Example
//! ```rust,ignore
//! use docshard_storage::{MemoryShardStore, ShardBackend};
//!
//! let shard = MemoryShardStore::new("Users");
//! let doc = shard.load(&EntityKey::new("Users", "users/1")).await?;
//! ```

use crate::backends::{ShardBackend, WriteBatch, WriteCommand};
use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use docshard_types::{
    Document, EntityKey, HiLoGrant, IdRange, Query, ShardError, ShardResult,
};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace};

/// Simulated failure behaviour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FaultMode {
    /// Serve every request normally
    #[default]
    Healthy,
    /// Refuse every request before doing any work
    Unreachable,
    /// Do the work, then lose the response
    LoseResponses,
    /// Wait this long before doing the work
    Stall(Duration),
}

#[derive(Debug, Clone)]
struct StoredDocument {
    /// Insertion sequence; gives unsorted queries a stable order
    sequence: u64,
    document: Document,
}

/// In-memory shard using DashMap for concurrent access
#[derive(Debug)]
pub struct MemoryShardStore {
    name: String,
    documents: Arc<DashMap<EntityKey, StoredDocument>>,
    /// HiLo high-water marks keyed by entity type
    hilo: Arc<DashMap<String, u64>>,
    next_sequence: AtomicU64,
    fault: RwLock<FaultMode>,
}

impl MemoryShardStore {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            documents: Arc::new(DashMap::new()),
            hilo: Arc::new(DashMap::new()),
            next_sequence: AtomicU64::new(0),
            fault: RwLock::new(FaultMode::Healthy),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get count of stored documents
    pub fn document_count(&self) -> usize {
        self.documents.len()
    }

    /// Check for a document without going through the backend contract
    pub fn contains(&self, key: &EntityKey) -> bool {
        self.documents.contains_key(key)
    }

    /// Current HiLo mark, read directly
    pub fn hilo_mark(&self, entity_type: &str) -> Option<u64> {
        self.hilo.get(entity_type).map(|v| *v)
    }

    /// Change the simulated failure behaviour
    pub fn set_fault(&self, fault: FaultMode) {
        debug!(shard = %self.name, fault = ?fault, "Setting fault mode");
        *self.fault.write() = fault;
    }

    pub fn fault(&self) -> FaultMode {
        *self.fault.read()
    }

    // ========== Fault injection helpers ==========

    async fn begin_request(&self) -> ShardResult<()> {
        let fault = self.fault();
        match fault {
            FaultMode::Healthy | FaultMode::LoseResponses => Ok(()),
            FaultMode::Unreachable => Err(ShardError::Unreachable {
                shard: self.name.clone(),
                reason: "connection refused".to_string(),
            }),
            FaultMode::Stall(delay) => {
                tokio::time::sleep(delay).await;
                Ok(())
            }
        }
    }

    fn finish_request<T>(&self, value: T) -> ShardResult<T> {
        if self.fault() == FaultMode::LoseResponses {
            return Err(ShardError::Transport {
                shard: self.name.clone(),
                reason: "response lost".to_string(),
            });
        }
        Ok(value)
    }

    fn rejected(&self, reason: impl Into<String>) -> ShardError {
        ShardError::Rejected {
            shard: self.name.clone(),
            reason: reason.into(),
        }
    }

    fn get_document(&self, key: &EntityKey) -> Option<Document> {
        self.documents.get(key).map(|d| d.document.clone())
    }

    fn put_document(&self, mut document: Document, key: EntityKey) {
        document.stamp_collection();
        match self.documents.entry(key) {
            Entry::Occupied(mut existing) => {
                existing.get_mut().document = document;
            }
            Entry::Vacant(slot) => {
                let sequence = self.next_sequence.fetch_add(1, Ordering::Relaxed);
                slot.insert(StoredDocument { sequence, document });
            }
        }
    }
}

#[async_trait]
impl ShardBackend for MemoryShardStore {
    async fn load(&self, key: &EntityKey) -> ShardResult<Option<Document>> {
        self.begin_request().await?;
        let doc = self.get_document(key);
        trace!(shard = %self.name, key = %key, found = doc.is_some(), "load");
        self.finish_request(doc)
    }

    async fn load_many(&self, keys: &[EntityKey]) -> ShardResult<Vec<Option<Document>>> {
        self.begin_request().await?;
        let docs = keys.iter().map(|k| self.get_document(k)).collect();
        self.finish_request(docs)
    }

    async fn store(&self, batch: WriteBatch) -> ShardResult<()> {
        self.begin_request().await?;

        // Validate the whole batch before applying anything
        let mut keyed = Vec::with_capacity(batch.len());
        for command in batch {
            let key = command
                .key()
                .ok_or_else(|| self.rejected("document without id in write batch"))?;
            keyed.push((key, command));
        }

        for (key, command) in keyed {
            match command {
                WriteCommand::Put(doc) => self.put_document(doc, key),
                WriteCommand::Delete(_) => {
                    self.documents.remove(&key);
                }
            }
        }
        debug!(shard = %self.name, documents = self.documents.len(), "Applied write batch");
        self.finish_request(())
    }

    async fn query(&self, query: &Query) -> ShardResult<Vec<Document>> {
        self.begin_request().await?;
        let mut candidates: Vec<(u64, Document)> = self
            .documents
            .iter()
            .map(|entry| (entry.sequence, entry.document.clone()))
            .collect();
        candidates.sort_by_key(|(sequence, _)| *sequence);
        let results = query.evaluate(candidates.into_iter().map(|(_, doc)| doc));
        self.finish_request(results)
    }

    async fn read_hilo(&self, entity_type: &str) -> ShardResult<Option<u64>> {
        self.begin_request().await?;
        let mark = self.hilo_mark(entity_type);
        self.finish_request(mark)
    }

    async fn allocate_id_range(
        &self,
        entity_type: &str,
        expected_max: u64,
        capacity: u64,
    ) -> ShardResult<HiLoGrant> {
        self.begin_request().await?;
        if capacity == 0 {
            return Err(self.rejected("HiLo capacity must be positive"));
        }

        let grant = match self.hilo.entry(entity_type.to_string()) {
            Entry::Occupied(mut mark) => {
                let current = *mark.get();
                if current != expected_max {
                    HiLoGrant::Conflict { current_max: current }
                } else {
                    let max = current
                        .checked_add(capacity)
                        .ok_or_else(|| self.rejected("HiLo range exhausted"))?;
                    *mark.get_mut() = max;
                    HiLoGrant::Granted(IdRange::new(current + 1, max))
                }
            }
            Entry::Vacant(slot) => {
                if expected_max != 0 {
                    HiLoGrant::Conflict { current_max: 0 }
                } else {
                    slot.insert(capacity);
                    HiLoGrant::Granted(IdRange::new(1, capacity))
                }
            }
        };
        debug!(shard = %self.name, entity_type = %entity_type, grant = ?grant, "HiLo allocation");
        self.finish_request(grant)
    }
}
