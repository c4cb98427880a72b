//! HTTP API for filedock.
//!
//! JSON endpoints for login, upload, listing, retrieval and delete, plus
//! status and reconciliation of the remote mirror.

pub mod dto;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod router;
pub mod server;

pub use error::ApiError;
pub use router::create_router;
pub use server::{build_file_service, WebServer};

use std::sync::Arc;

use tokio::sync::Mutex;

use crate::auth::SessionManager;
use crate::file::FileService;
use middleware::RateLimitState;

/// Application state shared across handlers.
pub struct AppState {
    pub files: FileService,
    pub sessions: Mutex<SessionManager>,
    pub rate_limit: Arc<RateLimitState>,
}

impl AppState {
    pub fn new(files: FileService, sessions: SessionManager, rate_limit: RateLimitState) -> Self {
        Self {
            files,
            sessions: Mutex::new(sessions),
            rate_limit: Arc::new(rate_limit),
        }
    }
}
