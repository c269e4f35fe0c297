//! Config command handlers

use crate::config::default_path;
use crate::ConfigAction;
use anyhow::Result;
use colored::Colorize;
use docshard_client::StoreConfig;
use std::path::PathBuf;

pub fn handle(action: ConfigAction, config_path: Option<&str>, config: &StoreConfig) -> Result<()> {
    match action {
        ConfigAction::Init { path } => {
            let path = match path {
                Some(p) => PathBuf::from(p),
                None => default_path()?,
            };
            if path.exists() {
                println!(
                    "{} Configuration already exists at: {}",
                    "✗".red().bold(),
                    path.display().to_string().cyan()
                );
                return Ok(());
            }
            StoreConfig::default().save(&path)?;
            println!(
                "{} Configuration initialized at: {}",
                "✓".green().bold(),
                path.display().to_string().cyan()
            );
            Ok(())
        }

        ConfigAction::Show => {
            let source = match config_path {
                Some(p) => p.to_string(),
                None => {
                    let default = default_path()?;
                    if default.exists() {
                        default.display().to_string()
                    } else {
                        "defaults + DOCSHARD_* environment".to_string()
                    }
                }
            };

            println!("{}", "Shards:".bold());
            for shard in &config.shards {
                println!("  {:<16} {}", shard.name.cyan(), shard.collections.join(", "));
            }
            println!();
            println!("{}", "Settings:".bold());
            println!("  HiLo capacity:        {}", config.hilo_capacity.to_string().cyan());
            println!("  HiLo CAS retries:     {}", config.hilo_max_conflict_retries.to_string().cyan());
            println!("  Request timeout (ms): {}", config.request_timeout_ms.to_string().cyan());
            println!("  Request log length:   {}", config.request_log_capacity.to_string().cyan());
            println!("  Virtual nodes:        {}", config.virtual_nodes.to_string().cyan());
            println!();
            println!("Source: {}", source.dimmed());
            println!();
            println!("{}", toml::to_string_pretty(config)?.dimmed());
            Ok(())
        }
    }
}
