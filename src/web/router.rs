//! Router configuration.

use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use super::handlers::{
    check_connection, current_user, delete_file, get_file, list_files, login, logout, sync,
    upload_files, view_file,
};
use super::middleware::{create_cors_layer, login_rate_limit};
use super::AppState;
use crate::file::UploadLimits;

/// Multipart overhead allowed on top of the file payload.
const UPLOAD_OVERHEAD_BYTES: usize = 1024 * 1024;

/// Request body limit for an upload carrying the maximum payload.
pub fn upload_body_limit(limits: UploadLimits) -> usize {
    let per_file = usize::try_from(limits.max_file_size).unwrap_or(usize::MAX);
    per_file
        .saturating_mul(limits.max_files)
        .saturating_add(UPLOAD_OVERHEAD_BYTES)
}

/// Create the API router.
pub fn create_router(state: Arc<AppState>, cors_origins: &[String]) -> Router {
    let rate_limit = state.rate_limit.clone();
    let login_routes = Router::new()
        .route("/login", post(login))
        .layer(middleware::from_fn(move |req, next| {
            let state = rate_limit.clone();
            login_rate_limit(state, req, next)
        }));

    let auth_routes = Router::new()
        .route("/logout", post(logout))
        .route("/user", get(current_user));

    let file_routes = Router::new()
        .route("/files", get(list_files))
        .route(
            "/files/upload",
            post(upload_files)
                .layer(DefaultBodyLimit::max(upload_body_limit(state.files.limits()))),
        )
        .route("/files/:id", get(get_file).delete(delete_file))
        .route("/files/:id/view", get(view_file));

    let ftp_routes = Router::new()
        .route("/ftp/check", get(check_connection))
        .route("/ftp/sync", post(sync));

    let api_routes = Router::new()
        .merge(login_routes)
        .merge(auth_routes)
        .merge(file_routes)
        .merge(ftp_routes);

    Router::new()
        .nest("/api", api_routes)
        .route("/health", get(health_check))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(create_cors_layer(cors_origins)),
        )
        .with_state(state)
}

/// Health check handler.
async fn health_check() -> &'static str {
    "OK"
}
