//! Local disk storage for uploaded files.
//!
//! Files are stored under a UUID name, sharded by the first two characters:
//!
//! ```text
//! {base_path}/
//! ├── 3f/
//! │   └── 3f2a9c1e-....pdf
//! └── b7/
//!     └── b71d04aa-....xlsx
//! ```

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::RwLock;
use uuid::Uuid;

use crate::Result;

/// Sharded file storage on local disk.
#[derive(Debug, Clone)]
pub struct FileStorage {
    base_path: PathBuf,
    /// Saves hold it shared; the empty-shard sweep holds it exclusively, so a
    /// shard cannot vanish between its creation and the write into it.
    shards: Arc<RwLock<()>>,
}

impl FileStorage {
    /// Create storage rooted at `base_path`, creating the directory.
    pub fn new(base_path: impl Into<PathBuf>) -> Result<Self> {
        let base_path = base_path.into();
        fs::create_dir_all(&base_path)?;
        Ok(Self {
            base_path,
            shards: Arc::new(RwLock::new(())),
        })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Write `content` under a fresh UUID name carrying the extension of
    /// `original_name`. Returns the full path of the written file.
    pub async fn save(&self, content: &[u8], original_name: &str) -> Result<PathBuf> {
        let stored_name = Self::generate_stored_name(original_name);
        let path = self.path_for(&stored_name);

        let _shards = self.shards.read().await;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, content).await?;

        Ok(path)
    }

    /// Remove a previously saved file.
    ///
    /// Returns `false` if it was already gone.
    pub async fn remove(&self, path: impl AsRef<Path>) -> Result<bool> {
        match tokio::fs::remove_file(path.as_ref()).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Full path for a stored name: `{base}/{shard}/{stored_name}`.
    pub fn path_for(&self, stored_name: &str) -> PathBuf {
        let shard = stored_name.get(..2).unwrap_or(stored_name);
        self.base_path.join(shard).join(stored_name)
    }

    /// Generate a UUID-based stored name, keeping a sane extension.
    pub fn generate_stored_name(original_name: &str) -> String {
        let ext = Path::new(original_name)
            .extension()
            .and_then(|s| s.to_str())
            .filter(|e| !e.is_empty() && e.chars().all(|c| c.is_ascii_alphanumeric()))
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_else(|| "bin".to_string());
        format!("{}.{ext}", Uuid::new_v4())
    }

    /// Remove empty shard directories. Returns how many were removed.
    ///
    /// Waits for in-flight saves to finish first.
    pub async fn cleanup_empty_dirs(&self) -> Result<usize> {
        let _shards = self.shards.write().await;

        let mut removed = 0;
        let mut entries = tokio::fs::read_dir(&self.base_path).await?;
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_dir() {
                continue;
            }
            let path = entry.path();
            let mut children = tokio::fs::read_dir(&path).await?;
            if children.next_entry().await?.is_none() && tokio::fs::remove_dir(&path).await.is_ok()
            {
                removed += 1;
            }
        }
        Ok(removed)
    }
}
