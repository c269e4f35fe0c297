//! Resolve command handler

use anyhow::Result;
use colored::Colorize;
use docshard_client::{ShardedDocumentStore, StoreConfig};

pub fn run(config: StoreConfig, collection: Option<&str>, id: Option<&str>) -> Result<()> {
    let store = ShardedDocumentStore::in_memory(config)?;
    let target = match (collection, id) {
        (Some(collection), Some(id)) => format!("{} {}", collection, id),
        (Some(collection), None) => format!("query on {}", collection),
        (None, _) => "query on all collections".to_string(),
    };

    match store.resolve(collection, id) {
        Ok(shards) => {
            let kind = if shards.len() == 1 { "single shard" } else { "broadcast" };
            println!("{} {} -> {} ({})", "✓".green().bold(), target, shards.join(", ").cyan(), kind);
        }
        Err(e) => {
            println!("{} {}: {}", "✗".red().bold(), target, e.to_string().red());
        }
    }
    Ok(())
}
