//! Remote mirror status and reconciliation.

use axum::{extract::State, Json};
use std::sync::Arc;

use crate::remote::SyncReport;
use crate::web::dto::FtpStatusResponse;
use crate::web::middleware::AuthUser;
use crate::web::AppState;

/// GET /api/ftp/check
pub async fn check_connection(
    State(state): State<Arc<AppState>>,
    AuthUser(_session): AuthUser,
) -> Json<FtpStatusResponse> {
    Json(FtpStatusResponse {
        connected: state.files.mirror_connected().await,
    })
}

/// POST /api/ftp/sync
pub async fn sync(
    State(state): State<Arc<AppState>>,
    AuthUser(session): AuthUser,
) -> Json<SyncReport> {
    tracing::info!(user_id = session.user_id, "Manual mirror sync requested");
    Json(state.files.sync().await)
}
