//! HiLo wire types exchanged with a shard

use serde::{Deserialize, Serialize};

/// Contiguous block of ids `[low, high]` reserved on one shard
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdRange {
    pub low: u64,
    pub high: u64,
}

impl IdRange {
    pub fn new(low: u64, high: u64) -> Self {
        Self { low, high }
    }

    /// Number of ids in the range
    pub fn len(&self) -> u64 {
        if self.high < self.low {
            0
        } else {
            self.high - self.low + 1
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Outcome of a compare-and-swap range reservation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HiLoGrant {
    /// The high-water mark moved from the expected value; the range is ours
    Granted(IdRange),
    /// Someone else moved the mark first; `current_max` is its present value
    Conflict { current_max: u64 },
}
