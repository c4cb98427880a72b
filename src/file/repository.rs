//! SQL-backed file registry.

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::QueryBuilder;

use super::{FilePage, FileQuery, FileRecord, FileRegistry, StorageSource};
use crate::db::{DbBackend, DbPool};
use crate::{FiledockError, Result};

const FILE_COLUMNS: &str = "id, name, original_name, mime_type, size, category, amount, \
     uploaded_at, is_processed, source, local_path, ftp_path, sha256";

/// Row of the `files` table.
#[derive(Debug, Clone, sqlx::FromRow)]
struct FileRow {
    id: String,
    name: String,
    original_name: String,
    mime_type: String,
    size: i64,
    category: String,
    amount: Option<String>,
    uploaded_at: String,
    is_processed: bool,
    source: String,
    local_path: Option<String>,
    ftp_path: Option<String>,
    sha256: Option<String>,
}

impl FileRow {
    fn into_record(self) -> Result<FileRecord> {
        let uploaded_at = DateTime::parse_from_rfc3339(&self.uploaded_at)
            .map_err(|e| {
                FiledockError::Database(format!("invalid uploaded_at for {}: {e}", self.id))
            })?
            .with_timezone(&Utc);
        let source = StorageSource::parse(&self.source).ok_or_else(|| {
            FiledockError::Database(format!("invalid source for {}: {}", self.id, self.source))
        })?;

        Ok(FileRecord {
            id: self.id,
            name: self.name,
            original_name: self.original_name,
            size: self.size,
            mime_type: self.mime_type,
            category: self.category,
            amount: self.amount,
            uploaded_at,
            is_processed: self.is_processed,
            source,
            local_path: self.local_path,
            ftp_path: self.ftp_path,
            sha256: self.sha256,
        })
    }
}

/// Persisted timestamp format. Fixed width, so text order is time order.
fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Escape `%`, `_` and `\` for a `LIKE ... ESCAPE '\'` pattern.
fn like_pattern(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len() + 2);
    escaped.push('%');
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

fn push_filters(builder: &mut QueryBuilder<'_, DbBackend>, query: &FileQuery) {
    if let Some(term) = &query.search {
        let pattern = like_pattern(term);
        builder
            .push(" AND (name_lc LIKE ")
            .push_bind(pattern.clone())
            .push(" ESCAPE '\\' OR original_name_lc LIKE ")
            .push_bind(pattern)
            .push(" ESCAPE '\\')");
    }
    if let Some(category) = &query.category {
        builder.push(" AND category = ").push_bind(category.clone());
    }
    if let Some(source) = query.source {
        builder.push(" AND source = ").push_bind(source.as_str());
    }
}

/// Registry stored in the `files` table.
///
/// Holds its own pool handle so it can live behind `Arc<dyn FileRegistry>`.
#[derive(Debug, Clone)]
pub struct SqlFileRegistry {
    pool: DbPool,
}

impl SqlFileRegistry {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Fill the search columns of rows written before they existed.
    ///
    /// Returns the number of rows updated.
    pub async fn backfill_search_names(&self) -> Result<u64> {
        let rows: Vec<(String, String, String)> = sqlx::query_as(
            "SELECT id, name, original_name FROM files
             WHERE name_lc IS NULL OR original_name_lc IS NULL",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| FiledockError::Database(e.to_string()))?;

        let mut updated = 0;
        for (id, name, original_name) in rows {
            updated += sqlx::query(
                "UPDATE files SET name_lc = $1, original_name_lc = $2 WHERE id = $3",
            )
            .bind(name.to_lowercase())
            .bind(original_name.to_lowercase())
            .bind(&id)
            .execute(&self.pool)
            .await
            .map_err(|e| FiledockError::Database(e.to_string()))?
            .rows_affected();
        }

        if updated > 0 {
            tracing::info!(updated, "Backfilled file search names");
        }
        Ok(updated)
    }
}

#[async_trait]
impl FileRegistry for SqlFileRegistry {
    async fn insert(&self, record: FileRecord) -> Result<()> {
        sqlx::query(
            "INSERT INTO files (id, name, original_name, mime_type, size, category, amount,
                                uploaded_at, is_processed, source, local_path, ftp_path, sha256,
                                name_lc, original_name_lc)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)",
        )
        .bind(&record.id)
        .bind(&record.name)
        .bind(&record.original_name)
        .bind(&record.mime_type)
        .bind(record.size)
        .bind(&record.category)
        .bind(&record.amount)
        .bind(format_timestamp(&record.uploaded_at))
        .bind(record.is_processed)
        .bind(record.source.as_str())
        .bind(&record.local_path)
        .bind(&record.ftp_path)
        .bind(&record.sha256)
        .bind(record.name.to_lowercase())
        .bind(record.original_name.to_lowercase())
        .execute(&self.pool)
        .await
        .map_err(|e| FiledockError::Database(e.to_string()))?;

        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<FileRecord>> {
        let row = sqlx::query_as::<_, FileRow>(&format!(
            "SELECT {FILE_COLUMNS} FROM files WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| FiledockError::Database(e.to_string()))?;

        row.map(FileRow::into_record).transpose()
    }

    async fn list(&self) -> Result<Vec<FileRecord>> {
        let rows = sqlx::query_as::<_, FileRow>(&format!(
            "SELECT {FILE_COLUMNS} FROM files ORDER BY uploaded_at DESC, id DESC"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| FiledockError::Database(e.to_string()))?;

        rows.into_iter().map(FileRow::into_record).collect()
    }

    async fn delete(&self, id: &str) -> Result<Option<FileRecord>> {
        let Some(record) = self.get(id).await? else {
            return Ok(None);
        };

        let result = sqlx::query("DELETE FROM files WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| FiledockError::Database(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        Ok(Some(record))
    }

    async fn search(&self, query: &FileQuery) -> Result<FilePage> {
        let mut count: QueryBuilder<DbBackend> =
            QueryBuilder::new("SELECT COUNT(*) FROM files WHERE 1 = 1");
        push_filters(&mut count, query);
        let total = count
            .build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await
            .map_err(|e| FiledockError::Database(e.to_string()))?;

        let mut select: QueryBuilder<DbBackend> =
            QueryBuilder::new(format!("SELECT {FILE_COLUMNS} FROM files WHERE 1 = 1"));
        push_filters(&mut select, query);
        select
            .push(" ORDER BY uploaded_at DESC, id DESC LIMIT ")
            .push_bind(query.limit as i64)
            .push(" OFFSET ")
            .push_bind(query.offset() as i64);

        let rows = select
            .build_query_as::<FileRow>()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| FiledockError::Database(e.to_string()))?;

        let files = rows
            .into_iter()
            .map(FileRow::into_record)
            .collect::<Result<Vec<_>>>()?;

        Ok(FilePage::new(files, total.max(0) as u64, query))
    }

    async fn names(&self) -> Result<HashSet<String>> {
        let names: Vec<String> = sqlx::query_scalar("SELECT name FROM files")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| FiledockError::Database(e.to_string()))?;
        Ok(names.into_iter().collect())
    }
}

#[cfg(all(test, feature = "sqlite"))]
mod tests {
    use super::*;
    use crate::db::Database;
    use chrono::{Duration, TimeZone};

    fn record(id: &str, name: &str, minutes: i64, category: &str) -> FileRecord {
        FileRecord {
            id: id.to_string(),
            name: name.to_string(),
            original_name: name.replace('_', " "),
            size: 512,
            mime_type: "application/pdf".to_string(),
            category: category.to_string(),
            amount: Some("10.00".to_string()),
            uploaded_at: Utc.with_ymd_and_hms(2024, 6, 1, 8, 0, 0).unwrap()
                + Duration::minutes(minutes),
            is_processed: true,
            source: StorageSource::Local,
            local_path: Some(format!("data/uploads/{id}.pdf")),
            ftp_path: None,
            sha256: Some("ab".repeat(32)),
        }
    }

    async fn setup() -> (Database, SqlFileRegistry) {
        let db = Database::open_in_memory().await.unwrap();
        let registry = SqlFileRegistry::new(db.pool().clone());
        (db, registry)
    }

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("abc"), "%abc%");
        assert_eq!(like_pattern("50%_off\\"), "%50\\%\\_off\\\\%");
    }

    #[tokio::test]
    async fn test_insert_and_get_preserves_fields() {
        let (_db, registry) = setup().await;
        let original = record("f1", "Contract_Final.pdf", 0, "pdf");
        registry.insert(original.clone()).await.unwrap();

        let loaded = registry.get("f1").await.unwrap().unwrap();
        assert_eq!(loaded, original);
    }

    #[tokio::test]
    async fn test_insert_duplicate_id_fails() {
        let (_db, registry) = setup().await;
        registry.insert(record("f1", "a.pdf", 0, "pdf")).await.unwrap();
        let result = registry.insert(record("f1", "b.pdf", 0, "pdf")).await;
        assert!(matches!(result, Err(FiledockError::Database(_))));
    }

    #[tokio::test]
    async fn test_list_newest_first() {
        let (_db, registry) = setup().await;
        registry.insert(record("f1", "a.pdf", 0, "pdf")).await.unwrap();
        registry.insert(record("f2", "b.pdf", 30, "pdf")).await.unwrap();
        registry.insert(record("f3", "c.pdf", 15, "pdf")).await.unwrap();

        let ids: Vec<_> = registry
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ids, vec!["f2", "f3", "f1"]);
    }

    #[tokio::test]
    async fn test_search_filters_and_paginates() {
        let (_db, registry) = setup().await;
        registry.insert(record("f1", "Invoice_Jan.pdf", 0, "pdf")).await.unwrap();
        registry.insert(record("f2", "invoice_feb.pdf", 10, "pdf")).await.unwrap();
        registry.insert(record("f3", "invoice_mar.pdf", 20, "receipts")).await.unwrap();
        registry.insert(record("f4", "photo.png", 30, "image")).await.unwrap();

        let query = FileQuery::new(Some(1), Some(2)).with_search(Some("INVOICE"));
        let page = registry.search(&query).await.unwrap();
        assert_eq!(page.total, 3);
        assert_eq!(page.total_pages, 2);
        let ids: Vec<_> = page.files.iter().map(|f| f.id.as_str()).collect();
        assert_eq!(ids, vec!["f3", "f2"]);

        let query = FileQuery::new(Some(2), Some(2)).with_search(Some("invoice"));
        let page = registry.search(&query).await.unwrap();
        assert_eq!(page.files.len(), 1);
        assert_eq!(page.files[0].id, "f1");

        let query = FileQuery::default()
            .with_search(Some("invoice"))
            .with_category(Some("pdf"));
        assert_eq!(registry.search(&query).await.unwrap().total, 2);

        let query = FileQuery::default().with_source(Some(StorageSource::Ftp));
        let page = registry.search(&query).await.unwrap();
        assert_eq!(page.total, 0);
        assert_eq!(page.total_pages, 1);
    }

    #[tokio::test]
    async fn test_search_treats_wildcards_literally() {
        let (_db, registry) = setup().await;
        registry.insert(record("f1", "100%_done.pdf", 0, "pdf")).await.unwrap();
        registry.insert(record("f2", "100x_done.pdf", 1, "pdf")).await.unwrap();

        let query = FileQuery::default().with_search(Some("100%"));
        let page = registry.search(&query).await.unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.files[0].id, "f1");
    }

    #[tokio::test]
    async fn test_search_folds_non_ascii_names() {
        let (_db, registry) = setup().await;
        registry.insert(record("f1", "Ärger_Rechnung.pdf", 0, "pdf")).await.unwrap();
        registry.insert(record("f2", "ÉTÉ.pdf", 1, "pdf")).await.unwrap();
        registry.insert(record("f3", "summer.pdf", 2, "pdf")).await.unwrap();

        for (term, id) in [("ärger", "f1"), ("ÄRGER", "f1"), ("été", "f2"), ("ÉtÉ", "f2")] {
            let query = FileQuery::default().with_search(Some(term));
            let page = registry.search(&query).await.unwrap();
            assert_eq!(page.total, 1, "search for {term}");
            assert_eq!(page.files[0].id, id);
        }

        let query = FileQuery::default().with_search(Some("ärger rechnung"));
        let page = registry.search(&query).await.unwrap();
        assert_eq!(page.total, 1, "original name has a space");
    }

    #[tokio::test]
    async fn test_backfill_search_names() {
        let (db, registry) = setup().await;
        registry.insert(record("f1", "Ärger.pdf", 0, "pdf")).await.unwrap();
        sqlx::query("UPDATE files SET name_lc = NULL, original_name_lc = NULL")
            .execute(db.pool())
            .await
            .unwrap();

        let query = FileQuery::default().with_search(Some("ärger"));
        assert_eq!(registry.search(&query).await.unwrap().total, 0);

        assert_eq!(registry.backfill_search_names().await.unwrap(), 1);
        assert_eq!(registry.backfill_search_names().await.unwrap(), 0);
        assert_eq!(registry.search(&query).await.unwrap().total, 1);
    }

    #[tokio::test]
    async fn test_delete_and_names() {
        let (_db, registry) = setup().await;
        registry.insert(record("f1", "a.pdf", 0, "pdf")).await.unwrap();
        registry.insert(record("f2", "b.pdf", 1, "pdf")).await.unwrap();

        let removed = registry.delete("f1").await.unwrap();
        assert_eq!(removed.map(|r| r.name), Some("a.pdf".to_string()));
        assert!(registry.delete("f1").await.unwrap().is_none());

        let names = registry.names().await.unwrap();
        assert_eq!(names.len(), 1);
        assert!(names.contains("b.pdf"));
    }
}
