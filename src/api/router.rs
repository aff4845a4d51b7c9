//! Router for the health server.

use std::sync::Arc;

use axum::{Router, routing::get};
use tower::limit::ConcurrencyLimitLayer;
use tower_http::trace::TraceLayer;

use crate::app::AppState;

use super::handlers::{healthz_handler, not_found_handler};

/// Upper bound on requests served at once
const MAX_CONCURRENT_REQUESTS: usize = 64;

/// Build the health router.
///
/// Only `GET /healthz` is served; every other path or method gets a JSON 404.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route(
            "/healthz",
            get(healthz_handler)
                .head(not_found_handler)
                .fallback(not_found_handler),
        )
        .fallback(not_found_handler)
        .layer(ConcurrencyLimitLayer::new(MAX_CONCURRENT_REQUESTS))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
