//! File content stored in the database as base64 text.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::db::DbPool;
use crate::{FiledockError, Result};

/// Blob store over the `file_blobs` table.
///
/// Rows reference `files(id)`, so a record must be inserted before its blob
/// and the blob goes away with the record.
#[derive(Debug, Clone)]
pub struct BlobStore {
    pool: DbPool,
}

impl BlobStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Insert or replace the content for `file_id`.
    pub async fn save(&self, file_id: &str, content: &[u8]) -> Result<()> {
        sqlx::query(
            "INSERT INTO file_blobs (file_id, content) VALUES ($1, $2)
             ON CONFLICT (file_id) DO UPDATE SET content = excluded.content",
        )
        .bind(file_id)
        .bind(STANDARD.encode(content))
        .execute(&self.pool)
        .await
        .map_err(|e| FiledockError::Database(e.to_string()))?;
        Ok(())
    }

    pub async fn load(&self, file_id: &str) -> Result<Option<Vec<u8>>> {
        let encoded: Option<String> =
            sqlx::query_scalar("SELECT content FROM file_blobs WHERE file_id = $1")
                .bind(file_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| FiledockError::Database(e.to_string()))?;

        encoded
            .map(|text| {
                STANDARD.decode(text.as_bytes()).map_err(|e| {
                    FiledockError::Database(format!("corrupt blob for {file_id}: {e}"))
                })
            })
            .transpose()
    }

    /// Returns `false` if there was no blob.
    pub async fn delete(&self, file_id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM file_blobs WHERE file_id = $1")
            .bind(file_id)
            .execute(&self.pool)
            .await
            .map_err(|e| FiledockError::Database(e.to_string()))?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(all(test, feature = "sqlite"))]
mod tests {
    use super::*;
    use crate::db::Database;

    async fn setup() -> (Database, BlobStore) {
        let db = Database::open_in_memory().await.unwrap();
        sqlx::query(
            "INSERT INTO files (id, name, original_name, mime_type, size, category, uploaded_at, is_processed, source)
             VALUES ('f1', 'a.png', 'a.png', 'image/png', 4, 'image', '2024-01-01T00:00:00.000Z', TRUE, 'db')",
        )
        .execute(db.pool())
        .await
        .unwrap();
        let store = BlobStore::new(db.pool().clone());
        (db, store)
    }

    #[tokio::test]
    async fn test_save_and_load_binary() {
        let (_db, store) = setup().await;
        let content = vec![0x89, 0x50, 0x4E, 0x47, 0x00, 0xFF];
        store.save("f1", &content).await.unwrap();

        assert_eq!(store.load("f1").await.unwrap(), Some(content));
        assert_eq!(store.load("missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_save_replaces_existing() {
        let (_db, store) = setup().await;
        store.save("f1", b"first").await.unwrap();
        store.save("f1", b"second").await.unwrap();

        assert_eq!(store.load("f1").await.unwrap(), Some(b"second".to_vec()));
    }

    #[tokio::test]
    async fn test_save_requires_file_row() {
        let (_db, store) = setup().await;
        assert!(store.save("unknown", b"x").await.is_err());
    }

    #[tokio::test]
    async fn test_delete() {
        let (_db, store) = setup().await;
        store.save("f1", b"x").await.unwrap();

        assert!(store.delete("f1").await.unwrap());
        assert!(!store.delete("f1").await.unwrap());
    }
}
