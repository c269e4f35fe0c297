// Copyright (c) Docshard Contributors
// SPDX-License-Identifier: Apache-2.0

//! Sharded session
//!
//! Unit of work over the sharded store. A session keeps an identity map of
//! the documents it has seen, the keys it knows to be absent, and the
//! writes it has yet to send. Every shard call it makes goes to exactly the
//! shards the resolution strategy names; multi-shard calls run concurrently
//! and are joined before returning.
//!
//! A session is single-writer: every operation takes `&mut self`.

use crate::error::{
    IndeterminateEntity, SessionError, SessionResult, ShardFailure, WriteFailureReport, WriteState,
};
use crate::store::StoreInner;
use docshard_network::ShardConnection;
use docshard_router::{PositionalBatch, ResultMerger, RouterError};
use docshard_storage::{WriteBatch, WriteCommand};
use docshard_types::{document_id, tagged_document_id, Document, EntityKey, Query, ShardError};
use futures::future::join_all;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
struct TrackedDocument {
    shard: String,
    document: Document,
    /// State last seen on the shard; None until first saved
    snapshot: Option<Document>,
}

impl TrackedDocument {
    fn is_modified(&self) -> bool {
        match &self.snapshot {
            Some(snapshot) => snapshot != &self.document,
            None => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriteOp {
    Put,
    Delete,
}

#[derive(Debug, Clone)]
struct PendingWrite {
    key: EntityKey,
    shard: String,
    op: WriteOp,
}

/// Unit of work over a [`ShardedDocumentStore`](crate::ShardedDocumentStore)
#[derive(Debug)]
pub struct ShardedSession {
    store: Arc<StoreInner>,
    tracked: HashMap<EntityKey, TrackedDocument>,
    known_missing: HashSet<EntityKey>,
    /// Recorded writes, oldest first; at most one per key
    pending: Vec<PendingWrite>,
}

impl ShardedSession {
    pub(crate) fn new(store: Arc<StoreInner>) -> Self {
        Self {
            store,
            tracked: HashMap::new(),
            known_missing: HashSet::new(),
            pending: Vec::new(),
        }
    }

    fn connection(&self, shard: &str) -> SessionResult<ShardConnection> {
        Ok(self.store.registry.get(shard)?.connection().clone())
    }

    // ========== Loading ==========

    /// Load one document. Touches only the owning shard, and nothing at all
    /// when the key is already tracked or known to be absent.
    pub async fn load(&mut self, collection: &str, id: &str) -> SessionResult<Option<Document>> {
        let key = EntityKey::new(collection, id);
        if let Some(tracked) = self.tracked.get(&key) {
            debug!(key = %key, "Load served from identity map");
            return Ok(Some(tracked.document.clone()));
        }
        if self.known_missing.contains(&key) {
            return Ok(None);
        }

        let shard = self.store.strategy.resolve_for_entity(collection, id)?;
        debug!(key = %key, shard = %shard, "Loading document");
        let found = self.connection(&shard)?.load(&key).await?;

        Ok(self.remember(key, shard, found))
    }

    /// Load several documents of one collection
    ///
    /// Issues one batched round trip per distinct owning shard. The result
    /// has one entry per requested id, in request order.
    pub async fn load_many<S: AsRef<str>>(
        &mut self,
        collection: &str,
        ids: &[S],
    ) -> SessionResult<Vec<Option<Document>>> {
        let mut local = PositionalBatch {
            positions: Vec::new(),
            results: Vec::new(),
        };
        // shard -> (positions, keys), in first-seen order
        let mut groups: Vec<(String, Vec<usize>, Vec<EntityKey>)> = Vec::new();

        for (position, id) in ids.iter().enumerate() {
            let key = EntityKey::new(collection, id.as_ref());
            if let Some(tracked) = self.tracked.get(&key) {
                local.positions.push(position);
                local.results.push(Some(tracked.document.clone()));
                continue;
            }
            if self.known_missing.contains(&key) {
                local.positions.push(position);
                local.results.push(None);
                continue;
            }

            let shard = self.store.strategy.resolve_for_entity(collection, key.id())?;
            match groups.iter_mut().find(|(s, _, _)| *s == shard) {
                Some((_, positions, keys)) => {
                    positions.push(position);
                    keys.push(key);
                }
                None => groups.push((shard, vec![position], vec![key])),
            }
        }

        let mut batches = vec![local];
        if !groups.is_empty() {
            groups.sort_by_key(|(shard, _, _)| self.store.registry.position(shard));
            let mut calls = Vec::with_capacity(groups.len());
            for (shard, positions, keys) in groups {
                let connection = self.connection(&shard)?;
                calls.push(async move {
                    let result = connection.load_many(&keys).await;
                    (shard, positions, keys, result)
                });
            }
            debug!(collection = %collection, shards = calls.len(), "Batched load");

            let single = calls.len() == 1;
            let mut failures = Vec::new();
            for (shard, positions, keys, result) in join_all(calls).await {
                match result {
                    Ok(found) => {
                        let mut results = Vec::with_capacity(keys.len());
                        for (i, key) in keys.into_iter().enumerate() {
                            let document = found.get(i).cloned().flatten();
                            results.push(self.remember(key, shard.clone(), document));
                        }
                        batches.push(PositionalBatch { positions, results });
                    }
                    Err(error) => failures.push(ShardFailure { shard, error }),
                }
            }
            if let Some(err) = fan_out_error(single, failures) {
                return Err(err);
            }
        }

        Ok(ResultMerger::merge_positional(ids.len(), batches))
    }

    /// Record a load answer in the identity map
    fn remember(&mut self, key: EntityKey, shard: String, found: Option<Document>) -> Option<Document> {
        match found {
            Some(document) => {
                if let Some(tracked) = self.tracked.get(&key) {
                    return Some(tracked.document.clone());
                }
                self.known_missing.remove(&key);
                self.tracked.insert(
                    key,
                    TrackedDocument {
                        shard,
                        snapshot: Some(document.clone()),
                        document: document.clone(),
                    },
                );
                Some(document)
            }
            None => {
                self.known_missing.insert(key);
                None
            }
        }
    }

    /// Tracked document, if this session holds one for `key`
    pub fn get(&self, key: &EntityKey) -> Option<&Document> {
        self.tracked.get(key).map(|t| &t.document)
    }

    /// Mutable access to a tracked document; edits are saved by `save_changes`
    pub fn get_mut(&mut self, key: &EntityKey) -> Option<&mut Document> {
        self.tracked.get_mut(key).map(|t| &mut t.document)
    }

    pub fn is_tracked(&self, key: &EntityKey) -> bool {
        self.tracked.contains_key(key)
    }

    // ========== Writing ==========

    /// Record a document for the next `save_changes`
    ///
    /// A document without an id is placed by the strategy and given a HiLo id
    /// from its target shard; no document write is sent yet.
    pub async fn store(&mut self, mut document: Document) -> SessionResult<EntityKey> {
        let collection = document.collection().to_string();
        if collection.trim().is_empty() {
            return Err(SessionError::InvalidDocument("collection must not be empty".to_string()));
        }

        let shard = match document.id() {
            Some(id) if id.trim().is_empty() => {
                return Err(SessionError::InvalidDocument("id must not be empty".to_string()));
            }
            Some(id) => self.store.strategy.resolve_for_entity(&collection, id)?,
            None => {
                let placement = self.store.strategy.place_new_entity(&collection)?;
                let allocator = self
                    .store
                    .allocators
                    .get(&placement.shard)
                    .ok_or_else(|| RouterError::UnknownShard(placement.shard.clone()))?;
                let number = allocator.next_id(&collection).await.map_err(|source| {
                    SessionError::IdAllocationFailure {
                        collection: collection.clone(),
                        source,
                    }
                })?;
                let id = if placement.tagged {
                    tagged_document_id(&placement.shard, &collection, number)
                } else {
                    document_id(&collection, number)
                };
                debug!(collection = %collection, id = %id, shard = %placement.shard, "Assigned id");
                document.assign_id(id);
                placement.shard
            }
        };

        let key = document
            .key()
            .ok_or_else(|| SessionError::InvalidDocument("document has no id".to_string()))?;

        document.stamp_collection();

        self.known_missing.remove(&key);
        match self.tracked.get_mut(&key) {
            Some(tracked) => tracked.document = document,
            None => {
                self.tracked.insert(
                    key.clone(),
                    TrackedDocument {
                        shard: shard.clone(),
                        document,
                        snapshot: None,
                    },
                );
            }
        }
        self.record(key.clone(), shard, WriteOp::Put);
        Ok(key)
    }

    /// Record a delete for the next `save_changes`
    pub fn delete(&mut self, collection: &str, id: &str) -> SessionResult<()> {
        let key = EntityKey::new(collection, id);
        let shard = match self.tracked.remove(&key) {
            Some(tracked) => tracked.shard,
            None => self.store.strategy.resolve_for_entity(collection, id)?,
        };
        self.known_missing.insert(key.clone());
        self.record(key, shard, WriteOp::Delete);
        Ok(())
    }

    fn record(&mut self, key: EntityKey, shard: String, op: WriteOp) {
        self.pending.retain(|w| w.key != key);
        self.pending.push(PendingWrite { key, shard, op });
    }

    /// Tracked documents edited since they were last loaded or saved
    fn modified_without_pending(&self) -> Vec<PendingWrite> {
        let mut modified: Vec<PendingWrite> = self
            .tracked
            .iter()
            .filter(|(key, tracked)| tracked.is_modified() && !self.pending.iter().any(|w| &w.key == *key))
            .map(|(key, tracked)| PendingWrite {
                key: key.clone(),
                shard: tracked.shard.clone(),
                op: WriteOp::Put,
            })
            .collect();
        modified.sort_by(|a, b| a.key.cmp(&b.key));
        modified
    }

    pub fn has_changes(&self) -> bool {
        !self.pending.is_empty() || self.tracked.values().any(TrackedDocument::is_modified)
    }

    /// Writes the next `save_changes` would send
    pub fn pending_count(&self) -> usize {
        self.pending.len() + self.modified_without_pending().len()
    }

    /// Send every recorded write
    ///
    /// One batch per shard with pending writes, sent concurrently; shards
    /// with nothing to write are not contacted. Batches that fail stay
    /// pending so the call can be retried.
    pub async fn save_changes(&mut self) -> SessionResult<()> {
        let modified = self.modified_without_pending();
        self.pending.extend(modified);
        if self.pending.is_empty() {
            return Ok(());
        }

        // Group by shard in registry order, FIFO within a shard
        let mut by_shard: Vec<(String, Vec<PendingWrite>)> = Vec::new();
        for write in &self.pending {
            match by_shard.iter_mut().find(|(s, _)| *s == write.shard) {
                Some((_, writes)) => writes.push(write.clone()),
                None => by_shard.push((write.shard.clone(), vec![write.clone()])),
            }
        }
        by_shard.sort_by_key(|(shard, _)| self.store.registry.position(shard));

        let mut calls = Vec::with_capacity(by_shard.len());
        for (shard, writes) in by_shard {
            let batch = self.batch_for(&writes)?;
            let connection = self.connection(&shard)?;
            calls.push(async move {
                let result = connection.store(batch).await;
                (shard, writes, result)
            });
        }
        debug!(shards = calls.len(), writes = self.pending.len(), "Saving changes");

        let mut committed = Vec::new();
        let mut failures = Vec::new();
        let mut entities = Vec::new();
        for (shard, writes, result) in join_all(calls).await {
            match result {
                Ok(()) => {
                    for write in &writes {
                        if let Some(tracked) = self.tracked.get_mut(&write.key) {
                            tracked.snapshot = Some(tracked.document.clone());
                        }
                    }
                    self.pending.retain(|w| w.shard != shard);
                    committed.push(shard);
                }
                Err(error) => {
                    let state = write_state(&error);
                    warn!(shard = %shard, writes = writes.len(), error = %error, "Shard batch failed");
                    entities.extend(writes.into_iter().map(|w| IndeterminateEntity {
                        key: w.key,
                        shard: shard.clone(),
                        state,
                    }));
                    failures.push(ShardFailure { shard, error });
                }
            }
        }

        if failures.is_empty() {
            return Ok(());
        }
        let all_failed = committed.is_empty();
        let report = WriteFailureReport {
            committed,
            failures,
            entities,
        };
        if all_failed {
            Err(SessionError::WriteFailure(report))
        } else {
            warn!(failed = ?report.failed_shards(), "Partial write failure");
            Err(SessionError::PartialWriteFailure(report))
        }
    }

    fn batch_for(&self, writes: &[PendingWrite]) -> SessionResult<WriteBatch> {
        writes
            .iter()
            .map(|write| match write.op {
                WriteOp::Delete => Ok(WriteCommand::Delete(write.key.clone())),
                WriteOp::Put => self
                    .tracked
                    .get(&write.key)
                    .map(|t| WriteCommand::Put(t.document.clone()))
                    .ok_or_else(|| {
                        SessionError::InvalidDocument(format!("{} is no longer tracked", write.key))
                    }),
            })
            .collect()
    }

    // ========== Querying ==========

    /// Run a query on every shard that may hold matches
    ///
    /// A single target shard answers verbatim. Several targets are queried
    /// concurrently with the sort and limit pushed down, then merged.
    pub async fn query(&mut self, query: Query) -> SessionResult<Vec<Document>> {
        let targets = self
            .store
            .strategy
            .resolve_for_query(query.collection.as_deref())?;

        let results = if let [shard] = targets.as_slice() {
            debug!(shard = %shard, collection = ?query.collection, "Single shard query");
            self.connection(shard)?.query(&query).await?
        } else {
            let mut calls = Vec::with_capacity(targets.len());
            for shard in &targets {
                let connection = self.connection(shard)?;
                let query = &query;
                calls.push(async move { connection.query(query).await });
            }
            debug!(shards = ?targets, collection = ?query.collection, "Broadcast query");

            let mut per_shard = Vec::with_capacity(targets.len());
            let mut failures = Vec::new();
            for (shard, result) in targets.iter().zip(join_all(calls).await) {
                match result {
                    Ok(documents) => per_shard.push(documents),
                    Err(error) => failures.push(ShardFailure {
                        shard: shard.clone(),
                        error,
                    }),
                }
            }
            if let Some(err) = fan_out_error(false, failures) {
                return Err(err);
            }
            ResultMerger::merge_query(per_shard, query.sort.as_ref(), query.limit)
        };

        Ok(results
            .into_iter()
            .filter_map(|doc| self.track_query_result(doc))
            .collect())
    }

    /// First match of a query, or None
    pub async fn query_first(&mut self, query: Query) -> SessionResult<Option<Document>> {
        Ok(self.query(query.take(1)).await?.into_iter().next())
    }

    /// Merge a query hit into the identity map. Hits deleted in this session
    /// but not yet saved are dropped.
    fn track_query_result(&mut self, document: Document) -> Option<Document> {
        let Some(key) = document.key() else {
            return Some(document);
        };
        if let Some(tracked) = self.tracked.get(&key) {
            return Some(tracked.document.clone());
        }
        if self.is_pending_delete(&key) {
            debug!(key = %key, "Query hit deleted in session");
            return None;
        }
        let shard = match self.store.strategy.resolve_for_entity(key.collection(), key.id()) {
            Ok(shard) => shard,
            Err(_) => return Some(document),
        };
        self.known_missing.remove(&key);
        self.tracked.insert(
            key,
            TrackedDocument {
                shard,
                snapshot: Some(document.clone()),
                document: document.clone(),
            },
        );
        Some(document)
    }

    fn is_pending_delete(&self, key: &EntityKey) -> bool {
        self.pending
            .iter()
            .any(|w| &w.key == key && w.op == WriteOp::Delete)
    }

    // ========== Housekeeping ==========

    /// Forget a key: its tracked document, absence and pending write
    pub fn evict(&mut self, key: &EntityKey) {
        self.tracked.remove(key);
        self.known_missing.remove(key);
        self.pending.retain(|w| &w.key != key);
    }

    /// Drop the identity map and every pending write
    pub fn clear(&mut self) {
        self.tracked.clear();
        self.known_missing.clear();
        self.pending.clear();
    }
}

fn write_state(error: &ShardError) -> WriteState {
    if error.is_ambiguous() {
        WriteState::Unknown
    } else {
        WriteState::NotSent
    }
}

fn fan_out_error(single: bool, mut failures: Vec<ShardFailure>) -> Option<SessionError> {
    match failures.len() {
        0 => None,
        1 if single => failures.pop().map(|f| SessionError::ShardUnavailable(f.error)),
        _ => Some(SessionError::FanOutFailure { failures }),
    }
}
