// Copyright (c) Docshard Contributors
// SPDX-License-Identifier: Apache-2.0

//! # Docshard Network Module
//!
//! Connection layer between the routing core and individual shards.
//!
//! - **ShardConnection**: one handle per shard; every call is one counted,
//!   time-bounded round trip
//! - **RequestCounter**: per-shard round-trip counter used for diagnostics
//!   and routing assertions
//! - **RequestLog**: bounded log of the last requests issued to a shard

pub mod connection;
pub mod counters;

pub use connection::{
    ConnectionConfig, ShardConnection, DEFAULT_REQUEST_LOG_CAPACITY, DEFAULT_REQUEST_TIMEOUT,
};
pub use counters::{RequestCounter, RequestKind, RequestLog, RequestOutcome, RequestRecord};
