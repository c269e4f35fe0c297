// Copyright (c) Docshard Contributors
// SPDX-License-Identifier: Apache-2.0

//! Counted, time-bounded connection to one shard
//!
//! Every call on a [`ShardConnection`] is one round trip: it bumps the
//! shard's [`RequestCounter`] before dispatch, runs under the per-shard
//! deadline, and leaves a [`RequestRecord`] in the recent request log.

use crate::counters::{RequestCounter, RequestKind, RequestLog, RequestOutcome, RequestRecord};
use docshard_storage::{ShardBackend, WriteBatch};
use docshard_types::{Document, EntityKey, HiLoGrant, Query, ShardError, ShardResult};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Default per-shard round-trip deadline
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Default number of requests retained in the recent request log
pub const DEFAULT_REQUEST_LOG_CAPACITY: usize = 20;

/// Connection settings
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Deadline for a single round trip
    pub request_timeout: Duration,
    /// Length of the recent request log
    pub request_log_capacity: usize,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            request_log_capacity: DEFAULT_REQUEST_LOG_CAPACITY,
        }
    }
}

/// Connection handle to a single shard
#[derive(Debug, Clone)]
pub struct ShardConnection {
    shard: String,
    backend: Arc<dyn ShardBackend>,
    counter: RequestCounter,
    log: RequestLog,
    request_timeout: Duration,
}

impl ShardConnection {
    pub fn new(shard: impl Into<String>, backend: Arc<dyn ShardBackend>, config: ConnectionConfig) -> Self {
        Self {
            shard: shard.into(),
            backend,
            counter: RequestCounter::new(),
            log: RequestLog::new(config.request_log_capacity),
            request_timeout: config.request_timeout,
        }
    }

    pub fn shard(&self) -> &str {
        &self.shard
    }

    pub fn counter(&self) -> &RequestCounter {
        &self.counter
    }

    pub fn log(&self) -> &RequestLog {
        &self.log
    }

    /// Round trips issued since creation or the last reset
    pub fn request_count(&self) -> u64 {
        self.counter.count()
    }

    /// Most recent requests, oldest first
    pub fn last_requests(&self) -> Vec<RequestRecord> {
        self.log.all()
    }

    /// Reset the diagnostics attached to this connection
    pub fn reset(&self) {
        debug!(shard = %self.shard, "Resetting shard connection diagnostics");
        self.counter.reset();
        self.log.clear();
    }

    async fn round_trip<T, F>(&self, kind: RequestKind, detail: String, call: F) -> ShardResult<T>
    where
        F: Future<Output = ShardResult<T>>,
    {
        let sequence = self.counter.record_request();
        debug!(shard = %self.shard, sequence, kind = %kind, detail = %detail, "Shard round trip");

        let result = match tokio::time::timeout(self.request_timeout, call).await {
            Ok(result) => result,
            Err(_) => {
                self.counter.record_timeout();
                Err(ShardError::Timeout {
                    shard: self.shard.clone(),
                    timeout_ms: self.request_timeout.as_millis() as u64,
                })
            }
        };

        let outcome = match &result {
            Ok(_) => RequestOutcome::Completed,
            Err(e) => {
                self.counter.record_failure();
                warn!(shard = %self.shard, sequence, kind = %kind, error = %e, "Shard round trip failed");
                RequestOutcome::Failed(e.to_string())
            }
        };
        self.log.push(RequestRecord {
            sequence,
            kind,
            detail,
            outcome,
        });
        result
    }

    pub async fn load(&self, key: &EntityKey) -> ShardResult<Option<Document>> {
        self.round_trip(RequestKind::Load, key.to_string(), self.backend.load(key))
            .await
    }

    pub async fn load_many(&self, keys: &[EntityKey]) -> ShardResult<Vec<Option<Document>>> {
        let detail = format!("{} keys", keys.len());
        self.round_trip(RequestKind::LoadMany, detail, self.backend.load_many(keys))
            .await
    }

    pub async fn store(&self, batch: WriteBatch) -> ShardResult<()> {
        let detail = format!("batch of {}", batch.len());
        self.round_trip(RequestKind::Store, detail, self.backend.store(batch))
            .await
    }

    pub async fn query(&self, query: &Query) -> ShardResult<Vec<Document>> {
        let detail = query
            .collection
            .clone()
            .unwrap_or_else(|| "<all collections>".to_string());
        self.round_trip(RequestKind::Query, detail, self.backend.query(query))
            .await
    }

    pub async fn read_hilo(&self, entity_type: &str) -> ShardResult<Option<u64>> {
        self.round_trip(
            RequestKind::ReadHiLo,
            entity_type.to_string(),
            self.backend.read_hilo(entity_type),
        )
        .await
    }

    pub async fn allocate_id_range(
        &self,
        entity_type: &str,
        expected_max: u64,
        capacity: u64,
    ) -> ShardResult<HiLoGrant> {
        let detail = format!("{} from {} by {}", entity_type, expected_max, capacity);
        self.round_trip(
            RequestKind::AllocateIdRange,
            detail,
            self.backend.allocate_id_range(entity_type, expected_max, capacity),
        )
        .await
    }
}
