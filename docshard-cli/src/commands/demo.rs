//! Routing walkthrough against in-memory shards

use anyhow::Result;
use colored::Colorize;
use docshard_client::{Document, ShardedDocumentStore, StoreConfig};
use serde_json::json;

pub async fn run(config: StoreConfig, capacity: Option<u64>) -> Result<()> {
    let mut config = StoreConfig {
        shards: StoreConfig::default().shards,
        ..config
    };
    if let Some(capacity) = capacity {
        config = config.with_hilo_capacity(capacity);
    }
    let store = ShardedDocumentStore::in_memory(config)?;

    println!("{}", "Docshard routing walkthrough".bold());
    println!(
        "  Shards: {}   HiLo capacity: {}",
        store.registry().names().join(", ").cyan(),
        store.config().hilo_capacity.to_string().cyan()
    );
    println!();

    let mut session = store.open_session();

    let missing = session.load("Users", "users/1").await?;
    step(&store, "load Users users/1", &format!("{:?}", missing.map(|d| d.body().clone())));

    let batch = session.load_many("Users", &["users/1", "users/2"]).await?;
    step(&store, "load_many Users [users/1, users/2]", &format!("{} results", batch.len()));

    let key = session
        .store(Document::new("Users", json!({ "Name": "Fitzchak Yitzchaki" })))
        .await?;
    step(&store, "store new User", key.id());

    session.save_changes().await?;
    step(&store, "save_changes", "committed");

    let mut fresh = store.open_session();
    let loaded = fresh.load("Users", key.id()).await?;
    step(
        &store,
        "load from a fresh session",
        if loaded.is_some() { "found" } else { "missing" },
    );

    println!();
    println!("{}", "Last requests on Users:".bold());
    if let Some(users) = store.shard("Users") {
        for record in users.last_requests() {
            println!("  {}", record.to_string().dimmed());
        }
    }
    Ok(())
}

fn step(store: &ShardedDocumentStore, label: &str, outcome: &str) {
    let counts = store
        .request_counts()
        .into_iter()
        .map(|(shard, count)| format!("{}={}", shard, count))
        .collect::<Vec<_>>()
        .join(" ");
    println!(
        "{} {:<36} {:<28} {}",
        "✓".green().bold(),
        label,
        outcome.cyan(),
        counts.yellow()
    );
}
