//! Broadcast queries over a collection split across two shards

mod common;

use common::{users_split_config, Cluster};
use docshard_client::{Document, Query, SessionError, SortSpec, StoreConfig};
use docshard_storage::FaultMode;
use serde_json::json;
use std::time::Duration;

/// Ages alternate between Users-A (50, 40, 30) and Users-B (10, 20, 60)
async fn seed(cluster: &Cluster) {
    let mut session = cluster.store.open_session();
    for age in [50, 10, 40, 20, 30, 60] {
        session
            .store(Document::new("Users", json!({ "Age": age })))
            .await
            .unwrap();
    }
    session.save_changes().await.unwrap();
    cluster.store.reset_diagnostics();
}

fn ages(docs: &[Document]) -> Vec<i64> {
    docs.iter()
        .filter_map(|d| d.field("Age").and_then(|v| v.as_i64()))
        .collect()
}

#[tokio::test]
async fn test_new_entities_carry_their_shard() {
    let cluster = Cluster::start(users_split_config());
    let mut session = cluster.store.open_session();

    let a = session.store(Document::new("Users", json!({}))).await.unwrap();
    let b = session.store(Document::new("Users", json!({}))).await.unwrap();
    assert_eq!(a.id(), "Users-A/users/1");
    assert_eq!(b.id(), "Users-B/users/1");

    session.save_changes().await.unwrap();
    cluster.store.reset_diagnostics();

    let mut fresh = cluster.store.open_session();
    assert!(fresh.load("Users", b.id()).await.unwrap().is_some());
    assert_eq!(cluster.count("Users-A"), 0);
    assert_eq!(cluster.count("Users-B"), 1);
}

#[tokio::test]
async fn test_sorted_limit_is_globally_correct() {
    let cluster = Cluster::start(users_split_config());
    seed(&cluster).await;
    let mut session = cluster.store.open_session();

    let youngest = session
        .query(Query::collection("Users").order_by(SortSpec::asc("Age")).take(3))
        .await
        .unwrap();

    assert_eq!(ages(&youngest), vec![10, 20, 30]);
    assert_eq!(cluster.count("Users-A"), 1);
    assert_eq!(cluster.count("Users-B"), 1);
    assert_eq!(cluster.count("Orders"), 0);
}

#[tokio::test]
async fn test_descending_merge() {
    let cluster = Cluster::start(users_split_config());
    seed(&cluster).await;
    let mut session = cluster.store.open_session();

    let oldest = session
        .query(Query::collection("Users").order_by(SortSpec::desc("Age")))
        .await
        .unwrap();
    assert_eq!(ages(&oldest), vec![60, 50, 40, 30, 20, 10]);
}

#[tokio::test]
async fn test_unsorted_query_concatenates_in_registry_order() {
    let cluster = Cluster::start(users_split_config());
    seed(&cluster).await;
    let mut session = cluster.store.open_session();

    let all = session.query(Query::collection("Users")).await.unwrap();
    assert_eq!(ages(&all), vec![50, 40, 30, 10, 20, 60]);

    // Reproducible
    let again = session.query(Query::collection("Users")).await.unwrap();
    assert_eq!(ages(&again), ages(&all));
}

#[tokio::test]
async fn test_query_without_collection_broadcasts() {
    let cluster = Cluster::start(users_split_config());
    seed(&cluster).await;
    let mut session = cluster.store.open_session();

    let all = session.query(Query::all()).await.unwrap();
    assert_eq!(all.len(), 6);
    for shard in ["Users-A", "Users-B", "Orders"] {
        assert_eq!(cluster.count(shard), 1);
    }
}

#[tokio::test]
async fn test_query_first() {
    let cluster = Cluster::start(users_split_config());
    seed(&cluster).await;
    let mut session = cluster.store.open_session();

    let first = session
        .query_first(Query::collection("Users").order_by(SortSpec::asc("Age")))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(first.field("Age"), Some(&json!(10)));

    let none = session
        .query_first(Query::collection("Users").where_eq("Age", json!(11)))
        .await
        .unwrap();
    assert!(none.is_none());
}

#[tokio::test]
async fn test_fan_out_failure_is_aggregated() {
    let config = users_split_config().with_request_timeout(Duration::from_millis(50));
    let cluster = Cluster::start(config);
    cluster.shard("Users-A").set_fault(FaultMode::Unreachable);
    cluster
        .shard("Users-B")
        .set_fault(FaultMode::Stall(Duration::from_millis(500)));
    let mut session = cluster.store.open_session();

    let err = session.query(Query::collection("Users")).await.unwrap_err();
    match err {
        SessionError::FanOutFailure { failures } => {
            let shards: Vec<&str> = failures.iter().map(|f| f.shard.as_str()).collect();
            assert_eq!(shards, vec!["Users-A", "Users-B"]);
        }
        other => panic!("unexpected error: {}", other),
    }
}

#[tokio::test]
async fn test_unknown_collection_is_still_queryable() {
    let cluster = Cluster::start(StoreConfig::default());
    let mut session = cluster.store.open_session();

    let invoice = session
        .store(Document::new("Invoices", json!({ "Amount": 5 })))
        .await
        .unwrap();
    assert!(invoice.id().ends_with("/invoices/1"));
    session.save_changes().await.unwrap();

    let mut fresh = cluster.store.open_session();
    let found = fresh.query(Query::collection("Invoices")).await.unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].key(), Some(invoice));
}
