//! filedock - document upload and retrieval service
//!
//! Uploaded files are recorded in a registry (in memory or SQL), stored on
//! local disk or in the database, and mirrored to a remote FTP directory.

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod file;
pub mod logging;
pub mod remote;
pub mod web;

pub use auth::{hash_password, verify_password, AuthSession, SessionError, SessionManager};
pub use config::Config;
pub use db::Database;
pub use error::{FiledockError, Result};
pub use file::{FileRecord, FileService};
pub use web::WebServer;
