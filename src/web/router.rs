//! Router configuration for the file service.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::DefaultBodyLimit,
    routing::get,
    Router,
};
use tower::ServiceBuilder;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use super::handlers::{
    delete_file, get_file, get_file_metadata, list_files, missing_file_id, root, update_file,
    upload_file, AppState,
};
use super::middleware::create_cors_layer;

/// Create the main API router.
///
/// Every request is bounded by `request_timeout`; when it elapses the
/// handler future, and with it any in-flight storage call, is dropped.
pub fn create_router(
    app_state: Arc<AppState>,
    cors_origins: &[String],
    request_timeout: Duration,
) -> Router {
    let body_limit = usize::try_from(app_state.upload.max_body_bytes()).unwrap_or(usize::MAX);

    let file_routes = Router::new()
        .route("/files", get(list_files).post(upload_file))
        .route(
            "/files/",
            get(missing_file_id)
                .put(missing_file_id)
                .delete(missing_file_id),
        )
        .route(
            "/files/:id",
            get(get_file).put(update_file).delete(delete_file),
        )
        .route("/files/:id/metadata", get(get_file_metadata))
        .layer(DefaultBodyLimit::max(body_limit));

    Router::new()
        .route("/", get(root))
        .merge(file_routes)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(create_cors_layer(cors_origins))
                .layer(TimeoutLayer::new(request_timeout)),
        )
        .with_state(app_state)
}

/// Create a health check router.
pub fn create_health_router() -> Router {
    Router::new().route("/health", get(health_check))
}

/// Health check handler.
async fn health_check() -> &'static str {
    "OK"
}
