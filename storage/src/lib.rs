//! Shard storage for docshard
//!
//! [`ShardBackend`] is the load/store/query/allocate contract a single
//! shard offers. [`MemoryShardStore`] implements it in memory.

pub mod backends;
pub mod memory;

pub use backends::{ShardBackend, WriteBatch, WriteCommand};
pub use memory::{FaultMode, MemoryShardStore};
