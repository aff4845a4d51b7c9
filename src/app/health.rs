//! Builds the health snapshot served over HTTP and printed by the status CLI.

use std::path::Path;

use chrono::Utc;

use crate::domain::{EventStore, HealthSnapshot, MetricsSnapshot, RelayerStatus};

/// Combine the store size, the backing file size and the metrics into a
/// [`HealthSnapshot`].
///
/// Without metrics the counters are zero and the status is `unknown`.
pub async fn collect_health_snapshot(
    store: &dyn EventStore,
    metrics: Option<MetricsSnapshot>,
    health_path: Option<&Path>,
) -> HealthSnapshot {
    let cache_path = store.path();
    let cache_bytes = match cache_path {
        Some(path) => tokio::fs::metadata(path).await.ok().map(|m| m.len()),
        None => None,
    };

    let mut snapshot = HealthSnapshot {
        timestamp: Utc::now().timestamp_millis(),
        status: RelayerStatus::Unknown,
        queue_depth: 0,
        total_minted: 0,
        failure_count: 0,
        last_victory_at: None,
        last_mint_at: None,
        last_failure_at: None,
        last_error_message: None,
        processed_events: store.len(),
        cache_path: cache_path
            .map(|p| p.display().to_string())
            .unwrap_or_default(),
        cache_bytes,
        metrics_updated_at: None,
        health_path: health_path.map(|p| p.display().to_string()),
    };

    if let Some(metrics) = metrics {
        let metrics = metrics.with_derived_status();
        snapshot.status = metrics.status;
        snapshot.queue_depth = metrics.queue_depth;
        snapshot.total_minted = metrics.total_minted;
        snapshot.failure_count = metrics.failure_count;
        snapshot.last_victory_at = metrics.last_victory_at;
        snapshot.last_mint_at = metrics.last_mint_at;
        snapshot.last_failure_at = metrics.last_failure_at;
        snapshot.last_error_message = metrics.last_error_message;
        snapshot.metrics_updated_at = Some(metrics.updated_at);
    }

    snapshot
}
