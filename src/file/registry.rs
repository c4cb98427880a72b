//! Registry abstraction over file metadata records.

use std::collections::HashSet;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::query::sort_newest_first;
use super::{FilePage, FileQuery, FileRecord};
use crate::{FiledockError, Result};

/// Authoritative collection of [`FileRecord`]s.
///
/// Implementations must be safe to share between request handlers and the
/// reconciliation task.
#[async_trait]
pub trait FileRegistry: Send + Sync {
    /// Append a record. Fails if the id already exists.
    async fn insert(&self, record: FileRecord) -> Result<()>;

    async fn get(&self, id: &str) -> Result<Option<FileRecord>>;

    /// All records, newest first.
    async fn list(&self) -> Result<Vec<FileRecord>>;

    /// Remove a record, returning it if it existed.
    async fn delete(&self, id: &str) -> Result<Option<FileRecord>>;

    /// Filtered, sorted and paginated listing.
    async fn search(&self, query: &FileQuery) -> Result<FilePage> {
        Ok(query.apply(self.list().await?))
    }

    /// Names of all records, used for reconciliation dedupe.
    async fn names(&self) -> Result<HashSet<String>> {
        Ok(self.list().await?.into_iter().map(|r| r.name).collect())
    }
}

/// In-process registry backed by an ordered list.
#[derive(Debug, Default)]
pub struct MemoryRegistry {
    records: RwLock<Vec<FileRecord>>,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl FileRegistry for MemoryRegistry {
    async fn insert(&self, record: FileRecord) -> Result<()> {
        let mut records = self.records.write().await;
        if records.iter().any(|r| r.id == record.id) {
            return Err(FiledockError::Validation(format!(
                "duplicate file id {}",
                record.id
            )));
        }
        records.push(record);
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<FileRecord>> {
        Ok(self.records.read().await.iter().find(|r| r.id == id).cloned())
    }

    async fn list(&self) -> Result<Vec<FileRecord>> {
        let mut records = self.records.read().await.clone();
        sort_newest_first(&mut records);
        Ok(records)
    }

    async fn delete(&self, id: &str) -> Result<Option<FileRecord>> {
        let mut records = self.records.write().await;
        Ok(records
            .iter()
            .position(|r| r.id == id)
            .map(|idx| records.remove(idx)))
    }

    async fn search(&self, query: &FileQuery) -> Result<FilePage> {
        let records = self.records.read().await;
        let matching: Vec<FileRecord> = records
            .iter()
            .filter(|r| query.matches(r))
            .cloned()
            .collect();
        Ok(query.apply(matching))
    }

    async fn names(&self) -> Result<HashSet<String>> {
        Ok(self
            .records
            .read()
            .await
            .iter()
            .map(|r| r.name.clone())
            .collect())
    }
}
