//! Reconciliation of a remote mirror into the SQL registry.

#![cfg(feature = "sqlite")]

use std::sync::Arc;

use filedock::db::Database;
use filedock::file::{FileQuery, FileRegistry, SqlFileRegistry, StorageSource};
use filedock::remote::{reconcile, MemoryRemoteStore, RemoteMirror};

const DIR: &str = "public_html/uploads";

async fn setup() -> (Database, SqlFileRegistry, Arc<MemoryRemoteStore>, RemoteMirror) {
    let db = Database::open_in_memory().await.unwrap();
    let registry = SqlFileRegistry::new(db.pool().clone());
    let store = Arc::new(MemoryRemoteStore::new());
    let mirror = RemoteMirror::new(store.clone(), DIR);
    (db, registry, store, mirror)
}

#[tokio::test]
async fn test_reconcile_twice_adds_no_duplicates() {
    let (_db, registry, store, mirror) = setup().await;
    store.insert_file(&format!("{DIR}/a.pdf"), b"a");
    store.insert_file(&format!("{DIR}/b b.xlsx"), b"bb");
    store.insert_file(&format!("{DIR}/.hidden.pdf"), b"h");

    let first = reconcile(&registry, &mirror).await;
    assert!(first.reachable);
    assert_eq!(first.added, 2);

    let second = reconcile(&registry, &mirror).await;
    assert_eq!(second.added, 0);
    assert_eq!(second.skipped_existing, 2);

    let records = registry.list().await.unwrap();
    assert_eq!(records.len(), 2);
    assert!(records.iter().all(|r| r.source == StorageSource::Ftp));
    assert!(records.iter().any(|r| r.name == "b b.xlsx"));
}

#[tokio::test]
async fn test_reconcile_picks_up_new_remote_files() {
    let (_db, registry, store, mirror) = setup().await;
    store.insert_file(&format!("{DIR}/first.pdf"), b"1");
    reconcile(&registry, &mirror).await;

    store.insert_file(&format!("{DIR}/second.pdf"), b"2");
    let report = reconcile(&registry, &mirror).await;
    assert_eq!(report.added, 1);

    let page = registry
        .search(&FileQuery::default().with_source(Some(StorageSource::Ftp)))
        .await
        .unwrap();
    assert_eq!(page.total, 2);
}

#[tokio::test]
async fn test_reconcile_unreachable_mirror() {
    let (_db, registry, store, mirror) = setup().await;
    store.insert_file(&format!("{DIR}/a.pdf"), b"a");
    store.set_online(false);

    let report = reconcile(&registry, &mirror).await;
    assert!(!report.reachable);
    assert!(registry.list().await.unwrap().is_empty());
}
