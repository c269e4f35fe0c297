//! Docshard CLI - inspect shard topologies and exercise routing
//!
//! Usage:
//!   docshard demo --capacity 4
//!   docshard resolve --collection Users --id users/1
//!   docshard config init

mod commands;
mod config;
mod logging;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "docshard")]
#[command(about = "Docshard CLI - inspect shard routing for a sharded document store", long_about = None)]
#[command(version)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file path
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the Users/Orders routing walkthrough against in-memory shards
    Demo {
        /// Ids reserved per HiLo refill
        #[arg(long)]
        capacity: Option<u64>,
    },

    /// Show which shard(s) a collection or document routes to
    Resolve {
        /// Collection name; omit to resolve a collection-less query
        #[arg(long)]
        collection: Option<String>,

        /// Document id
        #[arg(long)]
        id: Option<String>,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Write the default configuration
    Init {
        /// Output path (default: ~/.docshard/config.toml)
        #[arg(long)]
        path: Option<String>,
    },

    /// Print the effective configuration
    Show,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    logging::init(if cli.verbose { "debug" } else { "info" });

    let config = config::load(cli.config.as_deref())?;
    tracing::debug!(shards = config.shards.len(), "Loaded configuration");

    match cli.command {
        Commands::Demo { capacity } => {
            commands::demo::run(config, capacity).await?;
        }
        Commands::Resolve { collection, id } => {
            commands::resolve::run(config, collection.as_deref(), id.as_deref())?;
        }
        Commands::Config { action } => {
            commands::config::handle(action, cli.config.as_deref(), &config)?;
        }
    }

    Ok(())
}
