//! Prints the relayer health snapshot from the persisted state files.
//!
//! Reads `RELAYER_CACHE_PATH` and `RELAYER_HEALTH_PATH` (both optional) and
//! writes the snapshot as pretty JSON to stdout.

use std::path::PathBuf;

use anyhow::{Context, Result};
use dotenvy::dotenv;

use worboo_relayer::app::{RelayerMetrics, collect_health_snapshot};
use worboo_relayer::infra::JsonFileEventStore;

fn env_path(var: &str) -> Option<PathBuf> {
    std::env::var(var)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
}

async fn run() -> Result<()> {
    let cache_path = JsonFileEventStore::resolve_default_path(env_path("RELAYER_CACHE_PATH"));
    let health_path = RelayerMetrics::resolve_default_path(env_path("RELAYER_HEALTH_PATH"));

    // Retention is the daemon's concern; keep whatever is on disk
    let store = JsonFileEventStore::open(&cache_path, None).await;
    let metrics = RelayerMetrics::load_from_file(&health_path).await;

    let snapshot = collect_health_snapshot(&store, metrics, Some(&health_path)).await;
    let json = serde_json::to_string_pretty(&snapshot).context("Failed to render snapshot")?;
    println!("{}", json);
    Ok(())
}

#[tokio::main]
async fn main() {
    dotenv().ok();

    if let Err(e) = run().await {
        eprintln!("[relayer] status command failed: {:#}", e);
        std::process::exit(1);
    }
}
