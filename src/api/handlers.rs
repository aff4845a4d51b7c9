//! HTTP handlers for the health endpoint with OpenAPI documentation.

use std::sync::Arc;

use axum::{
    Json,
    extract::State,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use tracing::error;
use utoipa::OpenApi;

use crate::app::{AppState, collect_health_snapshot};
use crate::domain::{AppError, ErrorResponse, HealthSnapshot, RelayerStatus};

/// OpenAPI documentation structure
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Worboo Relayer Health API",
        version = "0.1.0",
        description = "Health snapshot of the Worboo reward relayer",
        license(
            name = "MIT"
        )
    ),
    paths(healthz_handler),
    components(schemas(HealthSnapshot, RelayerStatus, ErrorResponse)),
    tags(
        (name = "health", description = "Health check endpoints")
    )
)]
pub struct ApiDoc;

/// Relayer health snapshot
///
/// Combines the live metrics with the size of the processed-event store.
/// Query strings are ignored.
#[utoipa::path(
    get,
    path = "/healthz",
    tag = "health",
    responses(
        (status = 200, description = "Current health snapshot", body = HealthSnapshot),
        (status = 500, description = "Snapshot could not be built", body = ErrorResponse)
    )
)]
pub async fn healthz_handler(State(state): State<Arc<AppState>>) -> Result<Response, AppError> {
    let metrics = state.metrics.try_snapshot()?;
    let snapshot =
        collect_health_snapshot(state.store.as_ref(), Some(metrics), state.metrics.path()).await;

    let mut response = Json(snapshot).into_response();
    response
        .headers_mut()
        .insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    Ok(response)
}

/// Fallback for unknown paths and unsupported methods
pub async fn not_found_handler() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, Json(ErrorResponse::new("not_found")))
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        error!(error = %self, "Health endpoint failed");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse::new("health_unavailable")),
        )
            .into_response()
    }
}
