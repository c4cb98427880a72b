//! Login, logout and current-user handlers.

use axum::{extract::State, Json};
use chrono::Utc;
use std::sync::Arc;

use crate::auth::SessionManager;
use crate::web::dto::{LoginRequest, LoginResponse, MessageResponse, UserResponse, ValidatedJson};
use crate::web::error::ApiError;
use crate::web::middleware::{AuthUser, OptionalBearer};
use crate::web::AppState;

/// POST /api/login
pub async fn login(
    State(state): State<Arc<AppState>>,
    ValidatedJson(req): ValidatedJson<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let username = req.username.trim();
    if username.is_empty() {
        return Err(ApiError::bad_request("Username and password are required"));
    }

    let session = SessionManager::login_shared(&state.sessions, username, &req.password).await?;

    Ok(Json(LoginResponse::from(&session)))
}

/// POST /api/logout
///
/// Always succeeds; an unknown or missing token is not an error.
pub async fn logout(
    State(state): State<Arc<AppState>>,
    OptionalBearer(token): OptionalBearer,
) -> Json<MessageResponse> {
    if let Some(token) = token {
        state.sessions.lock().await.logout(&token);
    }
    Json(MessageResponse::new("Logged out successfully"))
}

/// GET /api/user
pub async fn current_user(AuthUser(session): AuthUser) -> Json<UserResponse> {
    Json(UserResponse::at(&session, Utc::now()))
}
