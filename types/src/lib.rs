//! Shared types for the docshard sharded document store client
//!
//! - [`Document`] / [`EntityKey`]: what is stored and how it is addressed
//! - [`Query`]: collection narrowing, predicates, sort and limit
//! - [`IdRange`] / [`HiLoGrant`]: id range reservations
//! - [`ShardError`]: failure of a single shard round trip

pub mod document;
pub mod error;
pub mod hilo;
pub mod id;
pub mod query;

pub use document::{Document, EntityKey, COLLECTION_METADATA_KEY};
pub use error::{ShardError, ShardResult};
pub use hilo::{HiLoGrant, IdRange};
pub use id::{collection_prefix, document_id, split_shard_tag, tagged_document_id};
pub use query::{compare_values, CompareOp, Predicate, Query, SortDirection, SortSpec};
