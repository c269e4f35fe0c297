//! Routing tests across registry, strategy and connections

use crate::{CollectionShardStrategy, ShardRegistry, ShardResolutionStrategy};
use docshard_storage::{MemoryShardStore, ShardBackend};
use docshard_types::{tagged_document_id, EntityKey};
use std::sync::Arc;

fn registry() -> ShardRegistry {
    let shard = |name: &str| -> Arc<dyn ShardBackend> { Arc::new(MemoryShardStore::new(name)) };
    ShardRegistry::builder()
        .shard("Users", shard("Users"), ["Users"])
        .shard("Orders", shard("Orders"), ["Orders"])
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_resolved_load_touches_only_owner() {
    let registry = registry();
    let strategy = CollectionShardStrategy::new(&registry, 150);

    let owner = strategy.resolve_for_entity("Users", "users/1").unwrap();
    let shard = registry.get(&owner).unwrap();
    let doc = shard
        .connection()
        .load(&EntityKey::new("Users", "users/1"))
        .await
        .unwrap();

    assert!(doc.is_none());
    assert_eq!(registry.get("Users").unwrap().connection().request_count(), 1);
    assert_eq!(registry.get("Orders").unwrap().connection().request_count(), 0);
}

#[test]
fn test_resolution_is_stable_across_strategies() {
    let registry = registry();
    let a = CollectionShardStrategy::new(&registry, 150);
    let b = CollectionShardStrategy::new(&registry, 150);

    for i in 0..50 {
        let id = format!("invoices/{}", i);
        assert_eq!(
            a.resolve_for_entity("Invoices", &id).unwrap(),
            b.resolve_for_entity("Invoices", &id).unwrap()
        );
    }
}

#[test]
fn test_placed_entity_resolves_back_to_its_shard() {
    let registry = registry();
    let strategy = CollectionShardStrategy::new(&registry, 150);

    for n in 1..=6 {
        let placement = strategy.place_new_entity("Invoices").unwrap();
        assert!(placement.tagged);
        let id = tagged_document_id(&placement.shard, "Invoices", n);
        assert_eq!(strategy.resolve_for_entity("Invoices", &id).unwrap(), placement.shard);
    }
}

#[test]
fn test_query_targets_follow_registry_order() {
    let registry = registry();
    let strategy = CollectionShardStrategy::new(&registry, 150);

    assert_eq!(strategy.resolve_for_query(None).unwrap(), registry.names());
    assert_eq!(strategy.resolve_for_query(Some("Orders")).unwrap(), vec!["Orders"]);
}
