//! Ordered content stores used for retrieval and delete.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::AsyncRead;
use tracing::{debug, warn};

use super::{BlobStore, FileRecord, FileStorage};
use crate::Result;

/// Bytes of a file as handed to the HTTP layer.
pub enum FileContent {
    /// Fully buffered content.
    Bytes(Vec<u8>),
    /// An open local file, streamed on demand.
    File { file: tokio::fs::File, len: u64 },
    /// A remote read proxied as it arrives.
    Stream {
        reader: Box<dyn AsyncRead + Send + Unpin>,
        len: Option<u64>,
    },
}

impl FileContent {
    /// Content length in bytes, when known up front.
    pub fn content_length(&self) -> Option<u64> {
        match self {
            FileContent::Bytes(bytes) => Some(bytes.len() as u64),
            FileContent::File { len, .. } => Some(*len),
            FileContent::Stream { len, .. } => *len,
        }
    }
}

impl std::fmt::Debug for FileContent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FileContent::Bytes(bytes) => f.debug_tuple("Bytes").field(&bytes.len()).finish(),
            FileContent::File { len, .. } => f.debug_struct("File").field("len", len).finish(),
            FileContent::Stream { len, .. } => {
                f.debug_struct("Stream").field("len", len).finish()
            }
        }
    }
}

/// A place that may hold a record's bytes.
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Fetch the bytes, or `None` if this store does not have them.
    async fn fetch(&self, record: &FileRecord) -> Result<Option<FileContent>>;

    /// Remove the bytes. Returns `false` if this store did not have them.
    async fn remove(&self, record: &FileRecord) -> Result<bool>;
}

#[async_trait]
impl ContentStore for BlobStore {
    fn name(&self) -> &'static str {
        "database"
    }

    async fn fetch(&self, record: &FileRecord) -> Result<Option<FileContent>> {
        Ok(self.load(&record.id).await?.map(FileContent::Bytes))
    }

    async fn remove(&self, record: &FileRecord) -> Result<bool> {
        self.delete(&record.id).await
    }
}

#[async_trait]
impl ContentStore for FileStorage {
    fn name(&self) -> &'static str {
        "local"
    }

    async fn fetch(&self, record: &FileRecord) -> Result<Option<FileContent>> {
        let Some(local_path) = record.local_path.as_deref() else {
            return Ok(None);
        };
        if !Path::new(local_path).is_file() {
            return Ok(None);
        }

        let file = tokio::fs::File::open(local_path).await?;
        let len = file.metadata().await?.len();
        Ok(Some(FileContent::File { file, len }))
    }

    async fn remove(&self, record: &FileRecord) -> Result<bool> {
        match record.local_path.as_deref() {
            Some(path) => FileStorage::remove(self, path).await,
            None => Ok(false),
        }
    }
}

/// Content stores consulted in order.
#[derive(Clone, Default)]
pub struct ContentChain {
    stores: Vec<Arc<dyn ContentStore>>,
}

impl ContentChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a store; earlier stores take precedence.
    pub fn with(mut self, store: Arc<dyn ContentStore>) -> Self {
        self.stores.push(store);
        self
    }

    pub fn store_names(&self) -> Vec<&'static str> {
        self.stores.iter().map(|s| s.name()).collect()
    }

    /// Return the content from the first store that has it.
    ///
    /// A failing store is logged and skipped.
    pub async fn fetch(&self, record: &FileRecord) -> Option<FileContent> {
        for store in &self.stores {
            match store.fetch(record).await {
                Ok(Some(content)) => {
                    debug!(file_id = %record.id, store = store.name(), "Serving content");
                    return Some(content);
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(file_id = %record.id, store = store.name(), error = %e, "Content store failed");
                }
            }
        }
        None
    }

    /// Remove the content from every store, logging failures.
    ///
    /// Returns the number of stores that removed something.
    pub async fn remove_all(&self, record: &FileRecord) -> usize {
        let mut removed = 0;
        for store in &self.stores {
            match store.remove(record).await {
                Ok(true) => removed += 1,
                Ok(false) => {}
                Err(e) => {
                    warn!(file_id = %record.id, store = store.name(), error = %e, "Failed to remove content");
                }
            }
        }
        removed
    }
}
