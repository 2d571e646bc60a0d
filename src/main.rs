//! Timed Cache - snapshot inspector
//!
//! Loads a cache snapshot, reports what is still live and prints the
//! snapshot again with expired entries dropped.
//!
//! Usage: `timed_cache [SNAPSHOT]` (falls back to `CACHE_SNAPSHOT`).

use std::fs;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use timed_cache::{Cache, Config, ImportOptions};

/// Main entry point for the snapshot inspector.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables
/// 3. Import the snapshot into a fresh cache
/// 4. Write the re-exported snapshot to stdout
#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so stdout carries only the snapshot
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "timed_cache=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = Config::from_env();
    debug!("Configuration loaded: {:?}", config);

    let path = match std::env::args_os().nth(1).map(PathBuf::from) {
        Some(path) => path,
        None => match config.snapshot_path.clone() {
            Some(path) => path,
            None => bail!("no snapshot given: pass a path or set CACHE_SNAPSHOT"),
        },
    };

    let raw = fs::read_to_string(&path)
        .with_context(|| format!("failed to read snapshot {}", path.display()))?;

    let cache: Cache<serde_json::Value> = Cache::from_config(&config);
    let options = ImportOptions {
        skip_duplicates: config.skip_duplicates,
    };
    let size = cache
        .import_json(&raw, options)
        .with_context(|| format!("failed to import snapshot {}", path.display()))?;

    info!("Loaded {} live entries from {}", size, path.display());
    for key in cache.keys() {
        debug!("live key: {}", key);
    }

    println!("{}", cache.export_json()?);
    Ok(())
}
