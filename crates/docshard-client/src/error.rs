// Copyright (c) Docshard Contributors
// SPDX-License-Identifier: Apache-2.0

//! Client error types

use docshard_router::RouterError;
use docshard_types::{EntityKey, ShardError};
use std::fmt;
use thiserror::Error;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to access config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Invalid value for {var}: {value}")]
    InvalidEnv { var: String, value: String },

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// HiLo allocation errors
#[derive(Debug, Clone, Error)]
pub enum HiLoError {
    #[error("HiLo refill for {entity_type} failed: {source}")]
    ShardUnavailable {
        entity_type: String,
        #[source]
        source: ShardError,
    },

    #[error("HiLo range for {entity_type} on shard {shard} still contended after {attempts} attempts")]
    ConflictRetriesExhausted {
        shard: String,
        entity_type: String,
        attempts: u32,
    },
}

/// Store construction errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Router(#[from] RouterError),

    #[error("No backend supplied for shard {0}")]
    MissingBackend(String),
}

/// One shard's failed round trip within a fan-out
#[derive(Debug, Clone, PartialEq)]
pub struct ShardFailure {
    pub shard: String,
    pub error: ShardError,
}

impl fmt::Display for ShardFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.shard, self.error)
    }
}

/// What is known about a write that did not get a clean acknowledgement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteState {
    /// The batch may or may not have been applied
    Unknown,
    /// The shard refused the batch before applying it
    NotSent,
}

/// An entity left in an indeterminate state by a failed batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndeterminateEntity {
    pub key: EntityKey,
    pub shard: String,
    pub state: WriteState,
}

/// Outcome of a `save_changes` that did not fully succeed
#[derive(Debug, Clone, PartialEq)]
pub struct WriteFailureReport {
    /// Shards whose batch committed
    pub committed: Vec<String>,
    /// Shards whose batch failed, in registry order
    pub failures: Vec<ShardFailure>,
    /// Entities of the failed batches
    pub entities: Vec<IndeterminateEntity>,
}

impl WriteFailureReport {
    pub fn failed_shards(&self) -> Vec<&str> {
        self.failures.iter().map(|f| f.shard.as_str()).collect()
    }

    pub fn state_of(&self, key: &EntityKey) -> Option<WriteState> {
        self.entities.iter().find(|e| &e.key == key).map(|e| e.state)
    }
}

impl fmt::Display for WriteFailureReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} shard(s) failed [{}], {} entities indeterminate, {} shard(s) committed",
            self.failures.len(),
            join(&self.failures),
            self.entities.len(),
            self.committed.len()
        )
    }
}

/// Session errors
#[derive(Debug, Clone, Error)]
pub enum SessionError {
    #[error("Shard unavailable: {0}")]
    ShardUnavailable(#[from] ShardError),

    #[error("Fan-out failed on {} shard(s): {}", .failures.len(), join(.failures))]
    FanOutFailure { failures: Vec<ShardFailure> },

    #[error("Could not allocate an id for {collection}: {source}")]
    IdAllocationFailure {
        collection: String,
        #[source]
        source: HiLoError,
    },

    #[error("Partial write failure: {0}")]
    PartialWriteFailure(WriteFailureReport),

    #[error("Write failure: {0}")]
    WriteFailure(WriteFailureReport),

    #[error("No shard can serve {target}")]
    UnresolvableRoute { target: String },

    #[error("Routing failed: {0}")]
    Routing(RouterError),

    #[error("Invalid document: {0}")]
    InvalidDocument(String),
}

impl From<RouterError> for SessionError {
    fn from(err: RouterError) -> Self {
        match err {
            RouterError::UnresolvableRoute { target } => Self::UnresolvableRoute { target },
            other => Self::Routing(other),
        }
    }
}

impl SessionError {
    /// Failure report of a `save_changes` call, if this is one
    pub fn write_report(&self) -> Option<&WriteFailureReport> {
        match self {
            Self::PartialWriteFailure(report) | Self::WriteFailure(report) => Some(report),
            _ => None,
        }
    }
}

fn join(failures: &[ShardFailure]) -> String {
    failures
        .iter()
        .map(ShardFailure::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

pub type SessionResult<T> = Result<T, SessionError>;
