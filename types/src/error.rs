//! Shard round-trip errors

use thiserror::Error;

/// Result type for a single shard round trip
pub type ShardResult<T> = Result<T, ShardError>;

/// Transport-level failure of one round trip to one shard
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ShardError {
    /// Connection could not be established; the request never left the client
    #[error("shard {shard} unreachable: {reason}")]
    Unreachable { shard: String, reason: String },

    /// Request was sent but no answer arrived before the deadline
    #[error("shard {shard} timed out after {timeout_ms}ms")]
    Timeout { shard: String, timeout_ms: u64 },

    /// Request was sent but the answer was lost or malformed
    #[error("transport error talking to shard {shard}: {reason}")]
    Transport { shard: String, reason: String },

    /// The shard answered and refused the request
    #[error("shard {shard} rejected request: {reason}")]
    Rejected { shard: String, reason: String },
}

impl ShardError {
    /// Name of the shard the failed round trip was addressed to
    pub fn shard(&self) -> &str {
        match self {
            ShardError::Unreachable { shard, .. }
            | ShardError::Timeout { shard, .. }
            | ShardError::Transport { shard, .. }
            | ShardError::Rejected { shard, .. } => shard,
        }
    }

    /// Whether the shard may have applied the request despite the failure
    pub fn is_ambiguous(&self) -> bool {
        matches!(self, ShardError::Timeout { .. } | ShardError::Transport { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ambiguity() {
        let unreachable = ShardError::Unreachable {
            shard: "Users".into(),
            reason: "connection refused".into(),
        };
        let timeout = ShardError::Timeout {
            shard: "Users".into(),
            timeout_ms: 50,
        };

        assert!(!unreachable.is_ambiguous());
        assert!(timeout.is_ambiguous());
        assert_eq!(timeout.shard(), "Users");
        assert_eq!(timeout.to_string(), "shard Users timed out after 50ms");
    }
}
