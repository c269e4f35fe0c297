//! Request counts for the basic Users/Orders topology
//!
//! Every assertion here is on per-shard round-trip counters: a load by id
//! touches only its owning shard and a new entity costs exactly the HiLo
//! refill plus one write.

mod common;

use common::Cluster;
use docshard_client::{Document, Query, RequestKind};
use serde_json::json;

#[tokio::test]
async fn test_load_missing_touches_only_owner() {
    let cluster = Cluster::users_and_orders();
    let mut session = cluster.store.open_session();

    let user = session.load("Users", "users/1").await.unwrap();

    assert!(user.is_none());
    assert_eq!(cluster.count("Users"), 1);
    assert_eq!(cluster.count("Orders"), 0);
}

#[tokio::test]
async fn test_load_many_is_one_batch() {
    let cluster = Cluster::users_and_orders();
    let mut session = cluster.store.open_session();

    let users = session.load_many("Users", &["users/1", "users/2"]).await.unwrap();

    assert_eq!(users, vec![None, None]);
    assert_eq!(cluster.count("Users"), 1);
    assert_eq!(cluster.count("Orders"), 0);
}

#[tokio::test]
async fn test_store_save_load_progression() {
    let cluster = Cluster::users_and_orders();
    let mut session = cluster.store.open_session();

    let key = session
        .store(Document::new("Users", json!({ "Name": "Fitzchak Yitzchaki" })))
        .await
        .unwrap();
    assert_eq!(key.id(), "users/1");
    assert_eq!(cluster.count("Users"), 2);
    assert_eq!(cluster.count("Orders"), 0);

    session.save_changes().await.unwrap();
    assert_eq!(cluster.count("Users"), 3);
    assert_eq!(cluster.count("Orders"), 0);

    let stored = session.get(&key).cloned().unwrap();
    let mut fresh = cluster.store.open_session();
    let loaded = fresh.load("Users", "users/1").await.unwrap();
    assert_eq!(loaded, Some(stored));
    assert_eq!(cluster.count("Users"), 4);
    assert_eq!(cluster.count("Orders"), 0);

    let kinds: Vec<RequestKind> = cluster
        .store
        .shard("Users")
        .unwrap()
        .last_requests()
        .iter()
        .map(|r| r.kind)
        .collect();
    assert_eq!(
        kinds,
        vec![
            RequestKind::ReadHiLo,
            RequestKind::AllocateIdRange,
            RequestKind::Store,
            RequestKind::Load
        ]
    );
}

#[tokio::test]
async fn test_second_store_is_free() {
    let cluster = Cluster::users_and_orders();
    let mut session = cluster.store.open_session();

    session.store(Document::new("Users", json!({ "Name": "Ayende" }))).await.unwrap();
    let second = session.store(Document::new("Users", json!({ "Name": "Oren" }))).await.unwrap();

    assert_eq!(second.id(), "users/2");
    assert_eq!(cluster.count("Users"), 2);

    session.save_changes().await.unwrap();
    assert_eq!(cluster.count("Users"), 3);
}

#[tokio::test]
async fn test_narrowed_query_stays_on_its_shard() {
    let cluster = Cluster::users_and_orders();
    let mut session = cluster.store.open_session();

    let none = session
        .query(Query::collection("Users").where_eq("Name", json!("nobody")))
        .await
        .unwrap();
    assert!(none.is_empty());
    assert_eq!(cluster.count("Users"), 1);
    assert_eq!(cluster.count("Orders"), 0);
}

#[tokio::test]
async fn test_save_contacts_only_shards_with_writes() {
    let cluster = Cluster::users_and_orders();
    let mut session = cluster.store.open_session();

    session.store(Document::new("Orders", json!({ "Total": 12 }))).await.unwrap();
    session.save_changes().await.unwrap();
    assert_eq!(cluster.count("Users"), 0);
    assert_eq!(cluster.count("Orders"), 3);

    // Nothing pending: no round trip at all
    session.save_changes().await.unwrap();
    assert_eq!(cluster.count("Orders"), 3);
}

#[tokio::test]
async fn test_request_counts_and_reset() {
    let cluster = Cluster::users_and_orders();
    let mut session = cluster.store.open_session();
    session.load("Orders", "orders/4").await.unwrap();

    assert_eq!(
        cluster.store.request_counts(),
        vec![("Users".to_string(), 0), ("Orders".to_string(), 1)]
    );

    cluster.store.shard("Orders").unwrap().reset_diagnostics();
    assert_eq!(cluster.count("Orders"), 0);
    assert!(cluster.store.shard("Orders").unwrap().last_requests().is_empty());
}
