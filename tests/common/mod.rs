//! Shared setup for API integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::http::header::AUTHORIZATION;
use axum_test::multipart::{MultipartForm, Part};
use axum_test::TestServer;
use serde_json::{json, Value};
use tempfile::TempDir;

use filedock::auth::{hash_password, Credential, SessionManager};
use filedock::file::{
    ContentChain, ContentTarget, FileService, FileStorage, MemoryRegistry, UploadLimits,
};
use filedock::remote::{MemoryRemoteStore, RemoteContent, RemoteMirror};
use filedock::web::middleware::RateLimitState;
use filedock::web::{create_router, AppState};

pub const USERNAME: &str = "admin";
pub const PASSWORD: &str = "correct-horse-battery";
pub const UPLOADS_DIR: &str = "public_html/uploads";

/// Per-file cap used by the test app.
pub const MAX_FILE_SIZE: u64 = 64 * 1024;
pub const MAX_FILES: usize = 3;

/// Minimal PNG signature, enough for a content check.
pub const PNG_BYTES: &[u8] = b"\x89PNG\r\n\x1a\n-test-image-";

pub struct TestOptions {
    pub mirror: bool,
    pub login_rate_limit: u32,
    pub session_duration: Duration,
}

impl Default for TestOptions {
    fn default() -> Self {
        Self {
            mirror: true,
            login_rate_limit: 100,
            session_duration: Duration::from_secs(1800),
        }
    }
}

pub struct TestApp {
    pub server: TestServer,
    pub state: Arc<AppState>,
    pub registry: Arc<MemoryRegistry>,
    pub remote: Arc<MemoryRemoteStore>,
    pub storage: FileStorage,
    _dir: TempDir,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_options(TestOptions::default())
    }

    pub fn with_options(options: TestOptions) -> Self {
        let dir = TempDir::new().expect("temp dir");
        let storage = FileStorage::new(dir.path().join("uploads")).expect("storage");
        let registry = Arc::new(MemoryRegistry::new());
        let remote = Arc::new(MemoryRemoteStore::new());

        let mirror = options
            .mirror
            .then(|| RemoteMirror::new(remote.clone(), UPLOADS_DIR));

        let mut chain = ContentChain::new().with(Arc::new(storage.clone()));
        if let Some(mirror) = &mirror {
            chain = chain.with(Arc::new(RemoteContent::new(mirror.clone())));
        }

        let files = FileService::new(
            registry.clone(),
            ContentTarget::Local(storage.clone()),
            chain,
            mirror,
            UploadLimits {
                max_file_size: MAX_FILE_SIZE,
                max_files: MAX_FILES,
            },
        );

        let hash = hash_password(PASSWORD).expect("hash");
        let sessions = SessionManager::new(
            vec![Credential::new(1, USERNAME, hash)],
            options.session_duration,
        );

        let state = Arc::new(AppState::new(
            files,
            sessions,
            RateLimitState::new(options.login_rate_limit),
        ));
        let server = TestServer::new(create_router(state.clone(), &[])).expect("test server");

        Self {
            server,
            state,
            registry,
            remote,
            storage,
            _dir: dir,
        }
    }

    /// Log in with the configured credentials and return the token.
    pub async fn login(&self) -> String {
        let response = self
            .server
            .post("/api/login")
            .json(&json!({ "username": USERNAME, "password": PASSWORD }))
            .await;
        response.assert_status_ok();
        response.json::<Value>()["token"]
            .as_str()
            .expect("token")
            .to_string()
    }

    /// Upload `parts` with optional form fields and return the response body.
    pub async fn upload(&self, token: &str, form: MultipartForm) -> axum_test::TestResponse {
        self.server
            .post("/api/files/upload")
            .add_header(AUTHORIZATION, bearer(token))
            .multipart(form)
            .await
    }

    /// Upload one PNG and return its record.
    pub async fn upload_png(&self, token: &str, name: &str) -> Value {
        let response = self
            .upload(token, MultipartForm::new().add_part("files", png_part(name)))
            .await;
        response.assert_status_ok();
        response.json::<Value>()["files"][0].clone()
    }
}

pub fn bearer(token: &str) -> String {
    format!("Bearer {}", token)
}

pub fn png_part(name: &str) -> Part {
    Part::bytes(PNG_BYTES.to_vec())
        .file_name(name.to_string())
        .mime_type("image/png")
}

pub fn pdf_part(name: &str, content: &[u8]) -> Part {
    Part::bytes(content.to_vec())
        .file_name(name.to_string())
        .mime_type("application/pdf")
}
