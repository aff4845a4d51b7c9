//! Live relayer metrics with best-effort file persistence.
//!
//! Every mutation publishes the new snapshot on a watch channel. A single
//! persister task drains that channel and rewrites the metrics file, so
//! bursts of updates coalesce into one write and writes never race.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::Utc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::domain::{AppError, MetricsSnapshot};
use crate::infra::persist::{read_json, write_json_atomic};

const DEFAULT_FILE_NAME: &str = "health.json";

fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// In-memory relayer counters, optionally mirrored to a JSON file
#[derive(Debug)]
pub struct RelayerMetrics {
    health_path: Option<PathBuf>,
    pub(crate) state: Mutex<MetricsSnapshot>,
    updates: watch::Sender<MetricsSnapshot>,
    write_lock: tokio::sync::Mutex<()>,
}

impl RelayerMetrics {
    #[must_use]
    pub fn new(health_path: Option<PathBuf>) -> Self {
        let initial = MetricsSnapshot::empty(now_ms());
        let (updates, _) = watch::channel(initial.clone());
        Self {
            health_path,
            state: Mutex::new(initial),
            updates,
            write_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.health_path.as_deref()
    }

    /// A victory entered the pipeline
    pub fn record_queued(&self) {
        self.update(|state, now| {
            state.queue_depth += 1;
            state.last_victory_at = Some(now);
        });
    }

    /// A reward was minted and confirmed
    pub fn record_succeeded(&self) {
        self.update(|state, now| {
            state.queue_depth = state.queue_depth.saturating_sub(1);
            state.total_minted += 1;
            state.last_mint_at = Some(now);
        });
    }

    /// A mint attempt failed
    pub fn record_failed(&self, error: &AppError) {
        let message = error.message();
        self.update(|state, now| {
            state.failure_count += 1;
            state.last_failure_at = Some(now);
            state.last_error_message = Some(message);
        });
    }

    /// Copy of the current counters
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .with_derived_status()
    }

    /// Like [`snapshot`](Self::snapshot) but refuses state left behind by a
    /// panicked writer.
    pub fn try_snapshot(&self) -> Result<MetricsSnapshot, AppError> {
        self.state
            .lock()
            .map(|state| state.clone().with_derived_status())
            .map_err(|_| AppError::Internal("metrics state poisoned".to_string()))
    }

    pub fn subscribe(&self) -> watch::Receiver<MetricsSnapshot> {
        self.updates.subscribe()
    }

    /// Write the current snapshot to the metrics file, if one is configured.
    pub async fn persist(&self) -> Result<(), AppError> {
        let Some(path) = self.health_path.as_deref() else {
            return Ok(());
        };
        let _guard = self.write_lock.lock().await;
        // Taken under the lock so the newest state always lands last
        let snapshot = self.snapshot();
        write_json_atomic(path, &snapshot, true).await?;
        debug!(path = %path.display(), "Metrics persisted");
        Ok(())
    }

    /// Best-effort read of a persisted snapshot.
    ///
    /// Returns `None` when the file is missing, unreadable or not valid JSON.
    pub async fn load_from_file(path: &Path) -> Option<MetricsSnapshot> {
        match read_json::<MetricsSnapshot>(path).await {
            Ok(snapshot) => snapshot.map(MetricsSnapshot::with_derived_status),
            Err(e) => {
                debug!(path = %path.display(), error = %e, "Metrics file unusable");
                None
            }
        }
    }

    /// The provided path, or `.cache/health.json` under the working directory.
    #[must_use]
    pub fn resolve_default_path(provided: Option<PathBuf>) -> PathBuf {
        provided.unwrap_or_else(|| {
            std::env::current_dir()
                .unwrap_or_default()
                .join(".cache")
                .join(DEFAULT_FILE_NAME)
        })
    }

    fn update(&self, mutate: impl FnOnce(&mut MetricsSnapshot, i64)) {
        let snapshot = {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            let now = now_ms();
            mutate(&mut state, now);
            state.updated_at = now;
            *state = state.clone().with_derived_status();
            state.clone()
        };
        self.updates.send_replace(snapshot);
    }
}

/// Spawn the task that mirrors metric updates to disk.
///
/// Returns the task handle and a shutdown sender; sending `true` flushes the
/// latest snapshot and stops the task.
pub fn spawn_metrics_persister(metrics: Arc<RelayerMetrics>) -> (JoinHandle<()>, watch::Sender<bool>) {
    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
    let mut updates = metrics.subscribe();

    let handle = tokio::spawn(async move {
        let Some(path) = metrics.path().map(Path::to_path_buf) else {
            info!("Metrics persistence disabled (no health path)");
            return;
        };
        info!(path = %path.display(), "Metrics persister started");

        loop {
            tokio::select! {
                changed = updates.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    updates.borrow_and_update();
                    if let Err(e) = metrics.persist().await {
                        warn!(path = %path.display(), error = %e, "Failed to persist metrics");
                    }
                }
                stop = shutdown_rx.changed() => {
                    if stop.is_err() || *shutdown_rx.borrow() {
                        break;
                    }
                }
            }
        }

        if let Err(e) = metrics.persist().await {
            warn!(path = %path.display(), error = %e, "Failed to flush metrics on shutdown");
        }
        info!("Metrics persister stopped");
    });

    (handle, shutdown_tx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{BlockchainError, RelayerStatus};
    use std::time::Duration;
    use tempfile::tempdir;

    fn failure(msg: &str) -> AppError {
        AppError::Blockchain(BlockchainError::Transient(msg.to_string()))
    }

    #[tokio::test]
    async fn test_tracks_queue_depth_and_persists() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("health.json");
        let metrics = RelayerMetrics::new(Some(path.clone()));

        metrics.record_queued();
        metrics.record_queued();
        metrics.record_failed(&failure("network hiccup"));
        metrics.record_succeeded();
        metrics.persist().await.unwrap();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.queue_depth, 1);
        assert_eq!(snapshot.total_minted, 1);
        assert_eq!(snapshot.failure_count, 1);
        assert_eq!(snapshot.status, RelayerStatus::Degraded);
        assert_eq!(snapshot.last_error_message.as_deref(), Some("network hiccup"));
        assert!(snapshot.last_victory_at.is_some());
        assert!(snapshot.last_mint_at.is_some());
        assert!(snapshot.last_failure_at.is_some());
        assert_eq!(metrics.path(), Some(path.as_path()));

        let loaded = RelayerMetrics::load_from_file(&path).await.unwrap();
        assert_eq!(loaded.queue_depth, 1);
        assert_eq!(loaded.status, RelayerStatus::Degraded);
    }

    #[test]
    fn test_queue_depth_never_negative() {
        let metrics = RelayerMetrics::new(None);
        metrics.record_queued();
        for _ in 0..5 {
            metrics.record_succeeded();
        }
        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.queue_depth, 0);
        assert_eq!(snapshot.total_minted, 5);
        assert_eq!(snapshot.status, RelayerStatus::Idle);
    }

    #[test]
    fn test_status_transitions() {
        let metrics = RelayerMetrics::new(None);
        assert_eq!(metrics.snapshot().status, RelayerStatus::Idle);

        metrics.record_queued();
        assert_eq!(metrics.snapshot().status, RelayerStatus::Processing);

        metrics.record_failed(&failure("nonce too low"));
        assert_eq!(metrics.snapshot().status, RelayerStatus::Degraded);

        metrics.record_succeeded();
        assert_eq!(metrics.snapshot().status, RelayerStatus::Idle);
    }

    #[tokio::test]
    async fn test_load_missing_and_corrupt_files() {
        let dir = tempdir().unwrap();
        assert!(
            RelayerMetrics::load_from_file(&dir.path().join("missing.json"))
                .await
                .is_none()
        );

        let corrupt = dir.path().join("corrupt.json");
        tokio::fs::write(&corrupt, b"{\"queueDepth\": ").await.unwrap();
        assert!(RelayerMetrics::load_from_file(&corrupt).await.is_none());
    }

    #[tokio::test]
    async fn test_loaded_status_is_recomputed() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("health.json");
        tokio::fs::write(
            &path,
            br#"{"queueDepth":2,"totalMinted":0,"failureCount":0,"updatedAt":1,"status":"degraded"}"#,
        )
        .await
        .unwrap();

        let loaded = RelayerMetrics::load_from_file(&path).await.unwrap();
        assert_eq!(loaded.status, RelayerStatus::Processing);
    }

    #[tokio::test]
    async fn test_persister_mirrors_updates() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("health.json");
        let metrics = Arc::new(RelayerMetrics::new(Some(path.clone())));
        let (handle, shutdown) = spawn_metrics_persister(Arc::clone(&metrics));

        metrics.record_queued();
        metrics.record_queued();

        let mut persisted = None;
        for _ in 0..50 {
            if let Some(snapshot) = RelayerMetrics::load_from_file(&path).await {
                if snapshot.queue_depth == 2 {
                    persisted = Some(snapshot);
                    break;
                }
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert_eq!(persisted.map(|s| s.queue_depth), Some(2));

        metrics.record_succeeded();
        shutdown.send(true).unwrap();
        handle.await.unwrap();

        let flushed = RelayerMetrics::load_from_file(&path).await.unwrap();
        assert_eq!(flushed.queue_depth, 1);
        assert_eq!(flushed.total_minted, 1);
    }

    #[tokio::test]
    async fn test_persist_without_path_is_noop() {
        let metrics = RelayerMetrics::new(None);
        metrics.record_queued();
        assert!(metrics.persist().await.is_ok());
    }

    #[test]
    fn test_resolve_default_path() {
        assert!(RelayerMetrics::resolve_default_path(None).ends_with(".cache/health.json"));
        let custom = PathBuf::from("/var/lib/relayer/health.json");
        assert_eq!(
            RelayerMetrics::resolve_default_path(Some(custom.clone())),
            custom
        );
    }
}
