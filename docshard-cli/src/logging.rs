//! Logging setup
//!
//! Filters come from `DOCSHARD_LOG` (e.g. `DOCSHARD_LOG=docshard_client=debug`),
//! falling back to the level given on the command line.

use tracing_subscriber::{fmt, EnvFilter};

pub fn init(default_level: &str) {
    let filter = EnvFilter::try_from_env("DOCSHARD_LOG")
        .unwrap_or_else(|_| EnvFilter::new(default_level));

    let _ = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .compact()
        .try_init();
}
