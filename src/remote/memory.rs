//! In-process remote store.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::{EntryKind, RemoteEntry, RemoteRead, RemoteStore};
use crate::{FiledockError, Result};

#[derive(Debug, Clone)]
struct StoredFile {
    content: Vec<u8>,
    modified: DateTime<Utc>,
}

/// Remote store kept in memory, with a switch to simulate an outage.
#[derive(Debug)]
pub struct MemoryRemoteStore {
    files: Mutex<BTreeMap<String, StoredFile>>,
    dirs: Mutex<BTreeSet<String>>,
    online: AtomicBool,
}

impl Default for MemoryRemoteStore {
    fn default() -> Self {
        Self::new()
    }
}

fn normalize(path: &str) -> String {
    path.trim_matches('/').to_string()
}

fn parent_of(path: &str) -> &str {
    path.rsplit_once('/').map(|(parent, _)| parent).unwrap_or("")
}

fn base_name(path: &str) -> &str {
    path.rsplit_once('/').map(|(_, name)| name).unwrap_or(path)
}

impl MemoryRemoteStore {
    pub fn new() -> Self {
        Self {
            files: Mutex::new(BTreeMap::new()),
            dirs: Mutex::new(BTreeSet::new()),
            online: AtomicBool::new(true),
        }
    }

    /// Simulate the server becoming reachable or unreachable.
    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    /// Place a file directly, bypassing the online check.
    pub fn insert_file(&self, path: &str, content: &[u8]) {
        self.insert_file_at(path, content, Utc::now());
    }

    pub fn insert_file_at(&self, path: &str, content: &[u8], modified: DateTime<Utc>) {
        let path = normalize(path);
        self.add_dirs(parent_of(&path));
        self.lock_files().insert(
            path,
            StoredFile {
                content: content.to_vec(),
                modified,
            },
        );
    }

    /// Create a directory directly, bypassing the online check.
    pub fn insert_dir(&self, path: &str) {
        self.add_dirs(&normalize(path));
    }

    pub fn contains(&self, path: &str) -> bool {
        self.lock_files().contains_key(&normalize(path))
    }

    pub fn file_count(&self) -> usize {
        self.lock_files().len()
    }

    fn add_dirs(&self, dir: &str) {
        let mut dirs = self.lock_dirs();
        let mut current = String::new();
        for part in dir.split('/').filter(|p| !p.is_empty()) {
            if !current.is_empty() {
                current.push('/');
            }
            current.push_str(part);
            dirs.insert(current.clone());
        }
    }

    fn lock_files(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, StoredFile>> {
        self.files.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn lock_dirs(&self) -> std::sync::MutexGuard<'_, BTreeSet<String>> {
        self.dirs.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn ensure_online(&self) -> Result<()> {
        if self.online.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(FiledockError::Remote("connection refused".to_string()))
        }
    }
}

#[async_trait]
impl RemoteStore for MemoryRemoteStore {
    async fn check(&self) -> Result<()> {
        self.ensure_online()
    }

    async fn ensure_dir(&self, dir: &str) -> Result<()> {
        self.ensure_online()?;
        self.add_dirs(&normalize(dir));
        Ok(())
    }

    async fn list(&self, dir: &str) -> Result<Vec<RemoteEntry>> {
        self.ensure_online()?;
        let dir = normalize(dir);

        let mut entries: Vec<RemoteEntry> = self
            .lock_dirs()
            .iter()
            .filter(|d| parent_of(d) == dir && d.as_str() != dir)
            .map(|d| RemoteEntry {
                name: base_name(d).to_string(),
                kind: EntryKind::Directory,
                size: None,
                modified: None,
            })
            .collect();

        entries.extend(
            self.lock_files()
                .iter()
                .filter(|(path, _)| parent_of(path) == dir)
                .map(|(path, file)| RemoteEntry {
                    name: base_name(path).to_string(),
                    kind: EntryKind::File,
                    size: Some(file.content.len() as u64),
                    modified: Some(file.modified),
                }),
        );

        Ok(entries)
    }

    async fn put(&self, path: &str, content: &[u8]) -> Result<()> {
        self.ensure_online()?;
        let path = normalize(path);
        if !parent_of(&path).is_empty() && !self.lock_dirs().contains(parent_of(&path)) {
            return Err(FiledockError::Remote(format!(
                "550 {}: no such directory",
                parent_of(&path)
            )));
        }
        self.lock_files().insert(
            path,
            StoredFile {
                content: content.to_vec(),
                modified: Utc::now(),
            },
        );
        Ok(())
    }

    async fn open(&self, path: &str) -> Result<Option<RemoteRead>> {
        self.ensure_online()?;
        Ok(self
            .lock_files()
            .get(&normalize(path))
            .map(|f| RemoteRead {
                len: Some(f.content.len() as u64),
                reader: Box::new(std::io::Cursor::new(f.content.clone())),
            }))
    }

    async fn delete(&self, path: &str) -> Result<bool> {
        self.ensure_online()?;
        Ok(self.lock_files().remove(&normalize(path)).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_list_returns_files_and_subdirectories() {
        let store = MemoryRemoteStore::new();
        store.insert_file("up/a.pdf", b"aa");
        store.insert_file("up/nested/b.pdf", b"b");
        store.insert_file("other/c.pdf", b"c");

        let mut entries = store.list("up").await.unwrap();
        entries.sort_by(|a, b| a.name.cmp(&b.name));

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].name, "a.pdf");
        assert_eq!(entries[0].kind, EntryKind::File);
        assert_eq!(entries[0].size, Some(2));
        assert_eq!(entries[1].name, "nested");
        assert_eq!(entries[1].kind, EntryKind::Directory);
    }

    #[tokio::test]
    async fn test_put_requires_directory() {
        let store = MemoryRemoteStore::new();
        assert!(store.put("missing/a.pdf", b"x").await.is_err());

        store.ensure_dir("missing").await.unwrap();
        store.put("missing/a.pdf", b"x").await.unwrap();
        assert!(store.contains("missing/a.pdf"));
    }

    #[tokio::test]
    async fn test_offline_rejects_everything() {
        let store = MemoryRemoteStore::new();
        store.insert_file("a.pdf", b"x");
        store.set_online(false);

        assert!(store.check().await.is_err());
        assert!(store.list("").await.is_err());
        assert!(store.get("a.pdf").await.is_err());
        assert!(store.delete("a.pdf").await.is_err());

        store.set_online(true);
        assert_eq!(store.get("a.pdf").await.unwrap(), Some(b"x".to_vec()));
        assert!(store.delete("a.pdf").await.unwrap());
        assert_eq!(store.file_count(), 0);
    }
}
