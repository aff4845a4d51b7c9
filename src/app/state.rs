//! Application state management.

use std::sync::Arc;

use crate::domain::EventStore;

use super::metrics::RelayerMetrics;

/// State shared with the health server
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn EventStore>,
    pub metrics: Arc<RelayerMetrics>,
}

impl AppState {
    #[must_use]
    pub fn new(store: Arc<dyn EventStore>, metrics: Arc<RelayerMetrics>) -> Self {
        Self { store, metrics }
    }
}
