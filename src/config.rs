//! Configuration module for filedock.

use serde::Deserialize;
use std::path::Path;

use crate::{FiledockError, Result};

/// HTTP server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port number to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
    /// CORS allowed origins. Empty means any origin.
    #[serde(default)]
    pub cors_origins: Vec<String>,
    /// Whether to serve a built UI bundle.
    #[serde(default)]
    pub serve_static: bool,
    /// Path to the static files directory.
    #[serde(default = "default_static_path")]
    pub static_path: String,
    /// Rate limit for the login endpoint (requests per minute per client).
    #[serde(default = "default_login_rate_limit")]
    pub login_rate_limit: u32,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    9000
}

fn default_static_path() -> String {
    "dist/public".to_string()
}

fn default_login_rate_limit() -> u32 {
    10
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origins: vec![],
            serve_static: false,
            static_path: default_static_path(),
            login_rate_limit: default_login_rate_limit(),
        }
    }
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Connection URL (`sqlite://...` or `postgres://...`).
    ///
    /// An empty URL disables the database; the registry and content store
    /// must then be `memory` and `local`.
    #[serde(default = "default_db_url")]
    pub url: String,
}

fn default_db_url() -> String {
    "sqlite://data/filedock.db".to_string()
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_db_url(),
        }
    }
}

/// Where file metadata records live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegistryBackend {
    /// Process-local ordered list; lost on restart.
    Memory,
    /// `files` table.
    Database,
}

/// Where uploaded bytes are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentBackend {
    /// Sharded files under `storage.path`.
    Local,
    /// Base64 rows in `file_blobs`.
    Database,
}

/// File storage configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_registry")]
    pub registry: RegistryBackend,
    #[serde(default = "default_content")]
    pub content: ContentBackend,
    /// Path to the local storage directory.
    #[serde(default = "default_storage_path")]
    pub path: String,
    /// Maximum size per uploaded file in megabytes.
    #[serde(default = "default_max_upload_size")]
    pub max_upload_size_mb: u64,
    /// Maximum number of files in one upload request.
    #[serde(default = "default_max_files")]
    pub max_files_per_upload: usize,
}

fn default_registry() -> RegistryBackend {
    RegistryBackend::Database
}

fn default_content() -> ContentBackend {
    ContentBackend::Local
}

fn default_storage_path() -> String {
    "data/uploads".to_string()
}

fn default_max_upload_size() -> u64 {
    10
}

fn default_max_files() -> usize {
    10
}

impl StorageConfig {
    /// Maximum size per uploaded file in bytes.
    pub fn max_upload_bytes(&self) -> u64 {
        self.max_upload_size_mb * 1024 * 1024
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            registry: default_registry(),
            content: default_content(),
            path: default_storage_path(),
            max_upload_size_mb: default_max_upload_size(),
            max_files_per_upload: default_max_files(),
        }
    }
}

/// FTP mirror configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct FtpConfig {
    /// Whether the mirror is used at all.
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub host: String,
    #[serde(default = "default_ftp_port")]
    pub port: u16,
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub password: String,
    /// Remote directory holding mirrored uploads.
    #[serde(default = "default_uploads_dir")]
    pub uploads_dir: String,
    /// Connect timeout in seconds.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

fn default_ftp_port() -> u16 {
    21
}

fn default_uploads_dir() -> String {
    "public_html/uploads".to_string()
}

fn default_connect_timeout() -> u64 {
    10
}

impl Default for FtpConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            host: String::new(),
            port: default_ftp_port(),
            user: String::new(),
            password: String::new(),
            uploads_dir: default_uploads_dir(),
            connect_timeout_secs: default_connect_timeout(),
        }
    }
}

/// A configured login.
#[derive(Debug, Clone, Deserialize)]
pub struct UserEntry {
    /// Stable user id. Defaults to the position in the list, starting at 1.
    #[serde(default)]
    pub id: Option<i64>,
    pub username: String,
    /// Argon2 PHC string.
    pub password_hash: String,
}

/// Authentication configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// Absolute session lifetime in seconds.
    #[serde(default = "default_session_duration")]
    pub session_duration_secs: u64,
    /// Interval between expired-session sweeps in seconds.
    #[serde(default = "default_cleanup_interval")]
    pub cleanup_interval_secs: u64,
    #[serde(default)]
    pub users: Vec<UserEntry>,
}

fn default_session_duration() -> u64 {
    1800 // 30 minutes
}

fn default_cleanup_interval() -> u64 {
    600
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            session_duration_secs: default_session_duration(),
            cleanup_interval_secs: default_cleanup_interval(),
            users: vec![],
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Path to the log file.
    #[serde(default = "default_log_file")]
    pub file: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_file() -> String {
    "logs/filedock.log".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: default_log_file(),
        }
    }
}

/// Main configuration structure.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub ftp: FtpConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(FiledockError::Io)?;
        Self::parse(&content)
    }

    /// Load configuration from a TOML file and apply environment variable overrides.
    pub fn load_with_env<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| FiledockError::Config(format!("parse error: {e}")))
    }

    /// Apply environment variable overrides to the configuration.
    ///
    /// Supported environment variables:
    /// - `FILEDOCK_DATABASE_URL`: override the database URL
    /// - `FILEDOCK_FTP_PASSWORD`: override the FTP password
    ///
    /// Empty values are ignored.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("FILEDOCK_DATABASE_URL") {
            if !url.is_empty() {
                self.database.url = url;
            }
        }
        if let Ok(password) = std::env::var("FILEDOCK_FTP_PASSWORD") {
            if !password.is_empty() {
                self.ftp.password = password;
            }
        }
    }

    /// Whether a database is configured.
    pub fn has_database(&self) -> bool {
        !self.database.url.trim().is_empty()
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if !self.has_database() {
            if self.storage.registry == RegistryBackend::Database {
                return Err(FiledockError::Config(
                    "storage.registry = \"database\" requires database.url".to_string(),
                ));
            }
            if self.storage.content == ContentBackend::Database {
                return Err(FiledockError::Config(
                    "storage.content = \"database\" requires database.url".to_string(),
                ));
            }
        }
        // Blob rows reference registry rows
        if self.storage.content == ContentBackend::Database
            && self.storage.registry != RegistryBackend::Database
        {
            return Err(FiledockError::Config(
                "storage.content = \"database\" requires storage.registry = \"database\""
                    .to_string(),
            ));
        }
        if self.ftp.enabled && self.ftp.host.trim().is_empty() {
            return Err(FiledockError::Config(
                "ftp is enabled but ftp.host is not set".to_string(),
            ));
        }
        if self.storage.max_upload_size_mb == 0 || self.storage.max_files_per_upload == 0 {
            return Err(FiledockError::Config(
                "storage upload limits must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}
