//! Reconciliation of the remote uploads directory into the registry.

use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use super::{EntryKind, RemoteEntry, RemoteMirror};
use crate::file::{
    category_for_extension, extension_of, FileRecord, FileRegistry, StorageSource,
    MIRRORED_EXTENSIONS,
};

/// Outcome of one reconciliation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    /// Whether the remote could be listed.
    pub reachable: bool,
    pub listed: usize,
    pub added: usize,
    pub skipped_existing: usize,
    /// Directories, hidden files and unsupported extensions.
    pub skipped_filtered: usize,
}

fn mime_for_extension(ext: &str) -> &'static str {
    match ext {
        ".pdf" => "application/pdf",
        _ => "application/octet-stream",
    }
}

/// Extension of a mirrorable entry, or `None` if it should be ignored.
fn mirrored_extension(entry: &RemoteEntry) -> Option<String> {
    if entry.kind != EntryKind::File || entry.name.starts_with('.') {
        return None;
    }
    extension_of(&entry.name).filter(|ext| MIRRORED_EXTENSIONS.contains(&ext.as_str()))
}

fn record_for(entry: &RemoteEntry, ext: &str, mirror: &RemoteMirror) -> FileRecord {
    FileRecord {
        id: Uuid::new_v4().to_string(),
        name: entry.name.clone(),
        original_name: entry.name.clone(),
        size: entry.size.unwrap_or(0).min(i64::MAX as u64) as i64,
        mime_type: mime_for_extension(ext).to_string(),
        category: category_for_extension(ext).to_string(),
        amount: None,
        uploaded_at: entry.modified.unwrap_or_else(FileRecord::timestamp_now),
        is_processed: true,
        source: StorageSource::Ftp,
        local_path: None,
        ftp_path: Some(mirror.path_for(&entry.name)),
        sha256: None,
    }
}

/// Add a registry record for every mirrored file not yet known by name.
///
/// Existing records are never modified. Failures are logged and end the
/// pass early; this function never returns an error.
pub async fn reconcile(registry: &dyn FileRegistry, mirror: &RemoteMirror) -> SyncReport {
    let mut report = SyncReport::default();
    let store = mirror.store();

    if let Err(e) = store.ensure_dir(mirror.uploads_dir()).await {
        warn!(error = %e, "Remote mirror unreachable, skipping sync");
        return report;
    }

    let entries = match store.list(mirror.uploads_dir()).await {
        Ok(entries) => entries,
        Err(e) => {
            warn!(error = %e, dir = %mirror.uploads_dir(), "Failed to list remote mirror, skipping sync");
            return report;
        }
    };
    report.reachable = true;
    report.listed = entries.len();

    let mut known = match registry.names().await {
        Ok(names) => names,
        Err(e) => {
            warn!(error = %e, "Failed to read registry, skipping sync");
            return report;
        }
    };

    for entry in &entries {
        let Some(ext) = mirrored_extension(entry) else {
            report.skipped_filtered += 1;
            continue;
        };
        if known.contains(&entry.name) {
            report.skipped_existing += 1;
            continue;
        }

        let record = record_for(entry, &ext, mirror);
        match registry.insert(record).await {
            Ok(()) => {
                known.insert(entry.name.clone());
                report.added += 1;
            }
            Err(e) => warn!(name = %entry.name, error = %e, "Failed to register remote file"),
        }
    }

    info!(
        listed = report.listed,
        added = report.added,
        skipped = report.skipped_existing + report.skipped_filtered,
        "Synced {} files from remote mirror",
        report.added
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::file::MemoryRegistry;
    use crate::remote::MemoryRemoteStore;
    use chrono::{TimeZone, Utc};
    use std::sync::Arc;

    fn setup() -> (Arc<MemoryRemoteStore>, RemoteMirror, MemoryRegistry) {
        let store = Arc::new(MemoryRemoteStore::new());
        let mirror = RemoteMirror::new(store.clone(), "public_html/uploads");
        (store, mirror, MemoryRegistry::new())
    }

    #[tokio::test]
    async fn test_adds_supported_files() {
        let (store, mirror, registry) = setup();
        let modified = Utc.with_ymd_and_hms(2024, 2, 3, 4, 5, 6).unwrap();
        store.insert_file_at("public_html/uploads/Invoice.PDF", b"12345", modified);
        store.insert_file("public_html/uploads/photo.jpeg", b"jpg");

        let report = reconcile(&registry, &mirror).await;
        assert!(report.reachable);
        assert_eq!(report.added, 2);

        let records = registry.list().await.unwrap();
        let invoice = records.iter().find(|r| r.name == "Invoice.PDF").unwrap();
        assert_eq!(invoice.original_name, "Invoice.PDF");
        assert_eq!(invoice.size, 5);
        assert_eq!(invoice.mime_type, "application/pdf");
        assert_eq!(invoice.category, "pdf");
        assert_eq!(invoice.uploaded_at, modified);
        assert_eq!(invoice.source, StorageSource::Ftp);
        assert!(invoice.is_processed);
        assert_eq!(
            invoice.ftp_path.as_deref(),
            Some("public_html/uploads/Invoice.PDF")
        );
        assert!(invoice.local_path.is_none());

        let photo = records.iter().find(|r| r.name == "photo.jpeg").unwrap();
        assert_eq!(photo.mime_type, "application/octet-stream");
        assert_eq!(photo.category, "image");
    }

    #[tokio::test]
    async fn test_filters_directories_hidden_and_unsupported() {
        let (store, mirror, registry) = setup();
        store.insert_dir("public_html/uploads/archive.pdf");
        store.insert_file("public_html/uploads/.secret.pdf", b"x");
        store.insert_file("public_html/uploads/notes.txt", b"x");
        store.insert_file("public_html/uploads/noext", b"x");
        store.insert_file("public_html/uploads/ok.xlsx", b"x");

        let report = reconcile(&registry, &mirror).await;
        assert_eq!(report.listed, 5);
        assert_eq!(report.added, 1);
        assert_eq!(report.skipped_filtered, 4);
        assert_eq!(registry.list().await.unwrap()[0].name, "ok.xlsx");
    }

    #[tokio::test]
    async fn test_is_idempotent() {
        let (store, mirror, registry) = setup();
        store.insert_file("public_html/uploads/a.pdf", b"a");
        store.insert_file("public_html/uploads/b.doc", b"b");

        assert_eq!(reconcile(&registry, &mirror).await.added, 2);
        let second = reconcile(&registry, &mirror).await;
        assert_eq!(second.added, 0);
        assert_eq!(second.skipped_existing, 2);
        assert_eq!(registry.len().await, 2);
    }

    #[tokio::test]
    async fn test_existing_records_are_untouched() {
        let (store, mirror, registry) = setup();
        let existing = FileRecord {
            id: "local-1".to_string(),
            name: "a.pdf".to_string(),
            original_name: "a (1).pdf".to_string(),
            size: 99,
            mime_type: "application/pdf".to_string(),
            category: "invoices".to_string(),
            amount: Some("5".to_string()),
            uploaded_at: Utc::now(),
            is_processed: true,
            source: StorageSource::Local,
            local_path: Some("/tmp/a.pdf".to_string()),
            ftp_path: Some("public_html/uploads/a.pdf".to_string()),
            sha256: None,
        };
        registry.insert(existing.clone()).await.unwrap();
        store.insert_file("public_html/uploads/a.pdf", b"remote");

        let report = reconcile(&registry, &mirror).await;
        assert_eq!(report.added, 0);
        assert_eq!(registry.get("local-1").await.unwrap(), Some(existing));
    }

    #[tokio::test]
    async fn test_unreachable_remote_is_a_no_op() {
        let (store, mirror, registry) = setup();
        store.insert_file("public_html/uploads/a.pdf", b"a");
        store.set_online(false);

        let report = reconcile(&registry, &mirror).await;
        assert_eq!(report, SyncReport::default());
        assert!(registry.is_empty().await);
    }
}
