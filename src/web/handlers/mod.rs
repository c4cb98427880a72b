//! API handlers.

pub mod auth;
pub mod file;
pub mod ftp;

pub use auth::*;
pub use file::*;
pub use ftp::*;
