//! # Docshard Router
//!
//! Shard resolution for the docshard client.
//!
//! ## Architecture
//!
//! ```text
//! ShardedSession
//!   ├── ShardResolutionStrategy  collection table + consistent hash ring
//!   │     └── ShardRegistry      name -> connection, fixed order
//!   └── ResultMerger             positional | k-way | concatenate
//! ```

pub mod consistent_hash;
pub mod error;
pub mod merger;
pub mod registry;
pub mod strategy;

#[cfg(test)]
mod tests;

pub use consistent_hash::{HashRing, DEFAULT_VIRTUAL_NODES};
pub use error::{RouterError, RouterResult};
pub use merger::{PositionalBatch, ResultMerger};
pub use registry::{Shard, ShardRegistry, ShardRegistryBuilder};
pub use strategy::{CollectionShardStrategy, Placement, ShardResolutionStrategy};
