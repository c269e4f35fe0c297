// Copyright (c) Docshard Contributors
// SPDX-License-Identifier: Apache-2.0

//! # Docshard Client
//!
//! Shard-aware document store client. Callers open a [`ShardedSession`]
//! on a [`ShardedDocumentStore`] and load, store and query as if talking to
//! a single store; the session routes every call to the owning shard(s).
//!
//! ```rust,ignore
//! let store = ShardedDocumentStore::in_memory(StoreConfig::default())?;
//! let mut session = store.open_session();
//! let key = session.store(Document::new("Users", json!({ "Name": "Oren" }))).await?;
//! session.save_changes().await?;
//! ```

pub mod config;
pub mod error;
pub mod hilo;
pub mod session;
pub mod store;

pub use config::{ShardSpec, StoreConfig};
pub use error::{
    ConfigError, HiLoError, IndeterminateEntity, SessionError, SessionResult, ShardFailure,
    StoreError, WriteFailureReport, WriteState,
};
pub use hilo::HiLoAllocator;
pub use session::ShardedSession;
pub use store::{ShardHandle, ShardedDocumentStore, StoreBuilder};

pub use docshard_network::{RequestKind, RequestRecord};
pub use docshard_types::{Document, EntityKey, Predicate, Query, SortSpec};
