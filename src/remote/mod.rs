//! Remote mirror of uploaded files.
//!
//! The mirror is an FTP uploads directory. Uploads are pushed to it, its
//! contents are reconciled into the registry, and it is the last store
//! consulted when serving file content.

mod ftp;
pub mod listing;
mod memory;
mod sync;

pub use ftp::FtpStore;
pub use memory::MemoryRemoteStore;
pub use sync::{reconcile, SyncReport};

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::debug;

use crate::file::{ContentStore, FileContent, FileRecord};
use crate::Result;

/// Kind of a directory entry on the remote.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Directory,
    Symlink,
    Other,
}

/// One entry of a remote directory listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteEntry {
    pub name: String,
    pub kind: EntryKind,
    pub size: Option<u64>,
    pub modified: Option<DateTime<Utc>>,
}

/// A remote file opened for reading.
pub struct RemoteRead {
    pub reader: Box<dyn AsyncRead + Send + Unpin>,
    /// Size reported by the server, when it reports one.
    pub len: Option<u64>,
}

impl std::fmt::Debug for RemoteRead {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteRead").field("len", &self.len).finish_non_exhaustive()
    }
}

/// Operations needed from the remote file server.
///
/// Paths are relative to the login directory and use `/` separators.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Connect and log in, then disconnect.
    async fn check(&self) -> Result<()>;

    /// Create `dir` and its parents; existing directories are not an error.
    async fn ensure_dir(&self, dir: &str) -> Result<()>;

    async fn list(&self, dir: &str) -> Result<Vec<RemoteEntry>>;

    async fn put(&self, path: &str, content: &[u8]) -> Result<()>;

    /// Open a file for streaming, or `None` if it does not exist.
    ///
    /// The connection stays open until the reader reaches the end or is
    /// dropped.
    async fn open(&self, path: &str) -> Result<Option<RemoteRead>>;

    /// Download a whole file into memory.
    async fn get(&self, path: &str) -> Result<Option<Vec<u8>>> {
        let Some(mut remote) = self.open(path).await? else {
            return Ok(None);
        };
        let mut content = Vec::new();
        remote.reader.read_to_end(&mut content).await?;
        Ok(Some(content))
    }

    /// Returns `false` if the file did not exist.
    async fn delete(&self, path: &str) -> Result<bool>;
}

/// A remote store together with the uploads directory used on it.
#[derive(Clone)]
pub struct RemoteMirror {
    store: Arc<dyn RemoteStore>,
    uploads_dir: String,
}

impl RemoteMirror {
    pub fn new(store: Arc<dyn RemoteStore>, uploads_dir: impl Into<String>) -> Self {
        let uploads_dir = uploads_dir.into().trim_matches('/').to_string();
        Self { store, uploads_dir }
    }

    pub fn store(&self) -> &Arc<dyn RemoteStore> {
        &self.store
    }

    pub fn uploads_dir(&self) -> &str {
        &self.uploads_dir
    }

    /// Remote path for a file name inside the uploads directory.
    pub fn path_for(&self, name: &str) -> String {
        if self.uploads_dir.is_empty() {
            name.to_string()
        } else {
            format!("{}/{name}", self.uploads_dir)
        }
    }

    pub async fn is_connected(&self) -> bool {
        match self.store.check().await {
            Ok(()) => true,
            Err(e) => {
                debug!(error = %e, "Remote mirror check failed");
                false
            }
        }
    }

    /// Upload `content` as `name` in the uploads directory.
    ///
    /// Returns the remote path on success.
    pub async fn push(&self, name: &str, content: &[u8]) -> Result<String> {
        if let Err(e) = self.store.ensure_dir(&self.uploads_dir).await {
            debug!(dir = %self.uploads_dir, error = %e, "Could not ensure uploads directory");
        }
        let path = self.path_for(name);
        self.store.put(&path, content).await?;
        Ok(path)
    }
}

/// Content store reading from the remote mirror via `ftpPath`.
#[derive(Clone)]
pub struct RemoteContent {
    mirror: RemoteMirror,
}

impl RemoteContent {
    pub fn new(mirror: RemoteMirror) -> Self {
        Self { mirror }
    }
}

#[async_trait]
impl ContentStore for RemoteContent {
    fn name(&self) -> &'static str {
        "ftp"
    }

    async fn fetch(&self, record: &FileRecord) -> Result<Option<FileContent>> {
        let Some(path) = record.ftp_path.as_deref() else {
            return Ok(None);
        };
        Ok(self
            .mirror
            .store()
            .open(path)
            .await?
            .map(|remote| FileContent::Stream {
                reader: remote.reader,
                len: remote.len,
            }))
    }

    async fn remove(&self, record: &FileRecord) -> Result<bool> {
        match record.ftp_path.as_deref() {
            Some(path) => self.mirror.store().delete(path).await,
            None => Ok(false),
        }
    }
}
