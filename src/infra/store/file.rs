//! File-backed processed-event store.
//!
//! Keeps a lock-free in-memory index for lookups and mirrors it to a JSON
//! array on disk, rewritten wholesale on every update.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::domain::{
    AppError, EventStore, ProcessedEventKey, ProcessedEventMetadata, ProcessedEventRecord,
};
use crate::infra::persist::{read_json, write_json_atomic};

/// Default number of records kept on disk
pub const DEFAULT_MAX_ENTRIES: usize = 100_000;

const DEFAULT_FILE_NAME: &str = "processed-events.json";

/// Processed-event store persisted as a JSON file.
#[derive(Debug)]
pub struct JsonFileEventStore {
    path: PathBuf,
    records: DashMap<ProcessedEventKey, ProcessedEventRecord>,
    /// Serializes file rewrites
    write_lock: Mutex<()>,
    /// `None` keeps every record
    max_entries: Option<usize>,
}

impl JsonFileEventStore {
    /// Open the store, loading existing records.
    ///
    /// A missing, unreadable or corrupt file yields an empty store. Starting
    /// empty after corruption can lead to duplicate rewards for events that
    /// are replayed, so that case is logged as a warning.
    pub async fn open(path: impl Into<PathBuf>, max_entries: Option<usize>) -> Self {
        let path = path.into();
        let records = DashMap::new();

        match read_json::<Vec<ProcessedEventRecord>>(&path).await {
            Ok(Some(loaded)) => {
                for record in loaded {
                    records.insert(record.key.clone(), record);
                }
                info!(
                    path = %path.display(),
                    count = records.len(),
                    "Processed-event store loaded"
                );
            }
            Ok(None) => {
                info!(path = %path.display(), "No processed-event history, starting empty");
            }
            Err(e) => {
                warn!(
                    path = %path.display(),
                    error = %e,
                    "Processed-event history unusable, starting empty; replayed events may be rewarded twice"
                );
            }
        }

        Self {
            path,
            records,
            write_lock: Mutex::new(()),
            max_entries: max_entries.filter(|n| *n > 0),
        }
    }

    /// The provided path, or `.cache/processed-events.json` under the working directory.
    #[must_use]
    pub fn resolve_default_path(provided: Option<PathBuf>) -> PathBuf {
        provided.unwrap_or_else(|| {
            std::env::current_dir()
                .unwrap_or_default()
                .join(".cache")
                .join(DEFAULT_FILE_NAME)
        })
    }

    /// Metadata recorded for a key
    #[must_use]
    pub fn metadata(&self, key: &ProcessedEventKey) -> Option<ProcessedEventMetadata> {
        self.records.get(key).map(|entry| entry.metadata.clone())
    }

    /// Apply the retention cap and return the records to write, oldest first.
    fn compact(&self, keep: &ProcessedEventKey) -> Vec<ProcessedEventRecord> {
        let mut all: Vec<ProcessedEventRecord> =
            self.records.iter().map(|entry| entry.value().clone()).collect();
        all.sort_by(|a, b| {
            a.processed_at
                .cmp(&b.processed_at)
                .then_with(|| a.key.cmp(&b.key))
        });

        if let Some(max) = self.max_entries {
            let mut excess = all.len().saturating_sub(max);
            if excess > 0 {
                let mut kept = Vec::with_capacity(max);
                for record in all {
                    if excess > 0 && &record.key != keep {
                        self.records.remove(&record.key);
                        excess -= 1;
                    } else {
                        kept.push(record);
                    }
                }
                debug!(retained = kept.len(), "Processed-event store compacted");
                return kept;
            }
        }

        all
    }
}

#[async_trait]
impl EventStore for JsonFileEventStore {
    fn has_processed(&self, key: &ProcessedEventKey) -> bool {
        self.records.contains_key(key)
    }

    async fn mark_processed(
        &self,
        key: ProcessedEventKey,
        metadata: ProcessedEventMetadata,
    ) -> Result<(), AppError> {
        let _guard = self.write_lock.lock().await;

        let record = ProcessedEventRecord {
            key: key.clone(),
            metadata,
            processed_at: Utc::now().timestamp_millis(),
        };
        self.records.insert(key.clone(), record);

        let snapshot = self.compact(&key);
        write_json_atomic(&self.path, &snapshot, false)
            .await
            .map_err(|e| {
                warn!(key = %key, error = %e, "Failed to persist processed-event store");
                AppError::from(e)
            })
    }

    fn len(&self) -> usize {
        self.records.len()
    }

    fn path(&self) -> Option<&Path> {
        Some(&self.path)
    }
}
