//! Storage backend traits
//!
//! This module defines the contract a shard exposes to the routing layer.
//! Implementations are provided in `memory/`.

pub mod shard;

pub use shard::{ShardBackend, WriteBatch, WriteCommand};
