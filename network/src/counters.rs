// Copyright (c) Docshard Contributors
// SPDX-License-Identifier: Apache-2.0

//! Per-shard request counters and recent request log
//!
//! The counter is the ground truth for routing assertions: it moves by
//! exactly one for every round trip issued to the shard, whatever the
//! outcome, and only goes back to zero on an explicit reset.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Kind of round trip issued to a shard
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RequestKind {
    Load,
    LoadMany,
    Store,
    Query,
    ReadHiLo,
    AllocateIdRange,
}

impl fmt::Display for RequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RequestKind::Load => "LOAD",
            RequestKind::LoadMany => "LOAD_MANY",
            RequestKind::Store => "STORE",
            RequestKind::Query => "QUERY",
            RequestKind::ReadHiLo => "READ_HILO",
            RequestKind::AllocateIdRange => "ALLOCATE_IDS",
        };
        f.write_str(name)
    }
}

/// How a round trip ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequestOutcome {
    Completed,
    Failed(String),
}

/// One entry of the recent request log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestRecord {
    /// Issue order on this shard, starting at 1
    pub sequence: u64,
    pub kind: RequestKind,
    /// Human-readable target (key, collection, entity type, batch size)
    pub detail: String,
    pub outcome: RequestOutcome,
}

impl fmt::Display for RequestRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.outcome {
            RequestOutcome::Completed => {
                write!(f, "#{} {} {} -> ok", self.sequence, self.kind, self.detail)
            }
            RequestOutcome::Failed(reason) => {
                write!(f, "#{} {} {} -> failed: {}", self.sequence, self.kind, self.detail, reason)
            }
        }
    }
}

/// Request counter for one shard
#[derive(Debug, Clone)]
pub struct RequestCounter {
    inner: Arc<RequestCounterInner>,
}

#[derive(Debug)]
struct RequestCounterInner {
    requests: AtomicU64,
    failures: AtomicU64,
    timeouts: AtomicU64,
}

impl RequestCounter {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RequestCounterInner {
                requests: AtomicU64::new(0),
                failures: AtomicU64::new(0),
                timeouts: AtomicU64::new(0),
            }),
        }
    }

    /// Count a newly issued round trip, returning its sequence number
    pub fn record_request(&self) -> u64 {
        self.inner.requests.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn record_failure(&self) {
        self.inner.failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_timeout(&self) {
        self.inner.timeouts.fetch_add(1, Ordering::Relaxed);
    }

    /// Round trips issued since creation or the last reset
    pub fn count(&self) -> u64 {
        self.inner.requests.load(Ordering::SeqCst)
    }

    pub fn failures(&self) -> u64 {
        self.inner.failures.load(Ordering::Relaxed)
    }

    pub fn timeouts(&self) -> u64 {
        self.inner.timeouts.load(Ordering::Relaxed)
    }

    pub fn reset(&self) {
        self.inner.requests.store(0, Ordering::SeqCst);
        self.inner.failures.store(0, Ordering::Relaxed);
        self.inner.timeouts.store(0, Ordering::Relaxed);
    }
}

impl Default for RequestCounter {
    fn default() -> Self {
        Self::new()
    }
}

/// Bounded log of the most recent requests to one shard
#[derive(Debug, Clone)]
pub struct RequestLog {
    capacity: usize,
    records: Arc<Mutex<VecDeque<RequestRecord>>>,
}

impl RequestLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            records: Arc::new(Mutex::new(VecDeque::with_capacity(capacity))),
        }
    }

    pub fn push(&self, record: RequestRecord) {
        if self.capacity == 0 {
            return;
        }
        let mut records = self.records.lock();
        while records.len() >= self.capacity {
            records.pop_front();
        }
        records.push_back(record);
    }

    /// Up to `n` most recent records, oldest first
    pub fn recent(&self, n: usize) -> Vec<RequestRecord> {
        let records = self.records.lock();
        let skip = records.len().saturating_sub(n);
        records.iter().skip(skip).cloned().collect()
    }

    /// Every retained record, oldest first
    pub fn all(&self) -> Vec<RequestRecord> {
        self.records.lock().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.records.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(sequence: u64) -> RequestRecord {
        RequestRecord {
            sequence,
            kind: RequestKind::Load,
            detail: format!("Users:users/{}", sequence),
            outcome: RequestOutcome::Completed,
        }
    }

    #[test]
    fn test_counter_sequence_and_reset() {
        let counter = RequestCounter::new();
        assert_eq!(counter.record_request(), 1);
        assert_eq!(counter.record_request(), 2);
        counter.record_failure();
        assert_eq!(counter.count(), 2);
        assert_eq!(counter.failures(), 1);

        counter.reset();
        assert_eq!(counter.count(), 0);
        assert_eq!(counter.failures(), 0);
    }

    #[test]
    fn test_counter_clones_share_state() {
        let counter = RequestCounter::new();
        let clone = counter.clone();
        clone.record_request();
        assert_eq!(counter.count(), 1);
    }

    #[test]
    fn test_log_is_bounded() {
        let log = RequestLog::new(3);
        for i in 1..=5 {
            log.push(record(i));
        }
        let sequences: Vec<_> = log.all().iter().map(|r| r.sequence).collect();
        assert_eq!(sequences, vec![3, 4, 5]);

        let last_two: Vec<_> = log.recent(2).iter().map(|r| r.sequence).collect();
        assert_eq!(last_two, vec![4, 5]);
    }

    #[test]
    fn test_record_display() {
        let failed = RequestRecord {
            sequence: 2,
            kind: RequestKind::Store,
            detail: "batch of 3".to_string(),
            outcome: RequestOutcome::Failed("connection refused".to_string()),
        };
        assert_eq!(record(1).to_string(), "#1 LOAD Users:users/1 -> ok");
        assert_eq!(failed.to_string(), "#2 STORE batch of 3 -> failed: connection refused");
    }
}
