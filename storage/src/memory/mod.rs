//! In-memory storage implementations
//!
//! These implementations use DashMap for concurrent access.
//! Suitable for testing and single-process deployments without persistence.

pub mod document_store;

pub use document_store::{FaultMode, MemoryShardStore};
