//! HiLo allocation through the session

mod common;

use common::Cluster;
use docshard_client::{Document, SessionError, StoreConfig};
use docshard_storage::FaultMode;
use serde_json::json;
use std::collections::HashSet;

fn user(n: u64) -> Document {
    Document::new("Users", json!({ "Name": format!("user {}", n) }))
}

#[tokio::test]
async fn test_range_exhaustion_costs_one_refill() {
    let cluster = Cluster::start(StoreConfig::default().with_hilo_capacity(4));
    let mut session = cluster.store.open_session();
    let users = cluster.store.shard("Users").unwrap();

    for n in 1..=4 {
        let key = session.store(user(n)).await.unwrap();
        assert_eq!(key.id(), format!("users/{}", n));
    }
    assert_eq!(users.hilo_refills(), 1);
    assert_eq!(users.request_count(), 2);

    let key = session.store(user(5)).await.unwrap();
    assert_eq!(key.id(), "users/5");
    assert_eq!(users.hilo_refills(), 2);
    assert_eq!(users.request_count(), 3);
    assert_eq!(cluster.count("Orders"), 0);
}

#[tokio::test]
async fn test_sessions_share_the_store_allocator() {
    let cluster = Cluster::start(StoreConfig::default().with_hilo_capacity(8));

    let mut first = cluster.store.open_session();
    first.store(user(1)).await.unwrap();

    let mut second = cluster.store.open_session();
    let key = second.store(user(2)).await.unwrap();

    assert_eq!(key.id(), "users/2");
    assert_eq!(cluster.store.shard("Users").unwrap().hilo_refills(), 1);
}

#[tokio::test]
async fn test_two_stores_on_one_shard_never_collide() {
    let a = Cluster::start(StoreConfig::default().with_hilo_capacity(3));
    // Second client over the very same shards
    let mut builder = docshard_client::ShardedDocumentStore::builder(
        StoreConfig::default().with_hilo_capacity(3),
    );
    for shard in &a.shards {
        builder = builder.backend(shard.name(), shard.clone());
    }
    let b = builder.build().unwrap();

    let mut ids = HashSet::new();
    let mut sa = a.store.open_session();
    let mut sb = b.open_session();
    for n in 0..10 {
        assert!(ids.insert(sa.store(user(n)).await.unwrap()));
        assert!(ids.insert(sb.store(user(n)).await.unwrap()));
    }
}

#[tokio::test]
async fn test_refill_failure_records_nothing() {
    let cluster = Cluster::users_and_orders();
    cluster.shard("Users").set_fault(FaultMode::Unreachable);
    let mut session = cluster.store.open_session();

    let err = session.store(user(1)).await.unwrap_err();
    assert!(matches!(err, SessionError::IdAllocationFailure { ref collection, .. } if collection == "Users"));
    assert!(!session.has_changes());
    assert_eq!(session.pending_count(), 0);
    assert_eq!(cluster.count("Orders"), 0);
}
