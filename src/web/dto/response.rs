//! Response DTOs.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::auth::{format_remaining, AuthSession};
use crate::file::FileRecord;

/// Login response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub id: i64,
    pub username: String,
    /// Expiry as Unix epoch milliseconds.
    pub expires_at: i64,
    /// Bearer token for subsequent requests.
    pub token: String,
}

impl From<&AuthSession> for LoginResponse {
    fn from(session: &AuthSession) -> Self {
        Self {
            id: session.user_id,
            username: session.username.clone(),
            expires_at: session.expires_at.timestamp_millis(),
            token: session.token.clone(),
        }
    }
}

/// Current user response (`GET /api/user`).
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: i64,
    pub username: String,
    /// Expiry as Unix epoch milliseconds.
    pub expires_at: i64,
    pub remaining_ms: i64,
    /// `MM:SS`
    pub remaining_text: String,
}

impl UserResponse {
    pub fn at(session: &AuthSession, now: DateTime<Utc>) -> Self {
        let remaining_ms = session.remaining_ms_at(now);
        Self {
            id: session.user_id,
            username: session.username.clone(),
            expires_at: session.expires_at.timestamp_millis(),
            remaining_ms,
            remaining_text: format_remaining(remaining_ms),
        }
    }
}

/// Plain acknowledgement.
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub files: Vec<FileRecord>,
}

#[derive(Debug, Serialize)]
pub struct FileResponse {
    pub file: FileRecord,
}

#[derive(Debug, Serialize)]
pub struct FtpStatusResponse {
    pub connected: bool,
}
