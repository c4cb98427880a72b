//! Database connectivity and migration management.
//!
//! SQLite is the default backend; PostgreSQL is available behind the
//! `postgres` feature.

mod schema;

pub use schema::MIGRATIONS;

use chrono::{SecondsFormat, Utc};
use tracing::{debug, info};

use crate::{FiledockError, Result};

/// Connection pool for the enabled backend.
#[cfg(feature = "sqlite")]
pub type DbPool = sqlx::SqlitePool;
#[cfg(all(feature = "postgres", not(feature = "sqlite")))]
pub type DbPool = sqlx::PgPool;

/// sqlx database type for the enabled backend.
#[cfg(feature = "sqlite")]
pub type DbBackend = sqlx::Sqlite;
#[cfg(all(feature = "postgres", not(feature = "sqlite")))]
pub type DbBackend = sqlx::Postgres;

/// Database handle owning the connection pool.
#[derive(Clone)]
pub struct Database {
    pool: DbPool,
}

impl Database {
    /// Connect to the database at `url` and apply pending migrations.
    ///
    /// For SQLite the database file and its parent directory are created
    /// when missing.
    #[cfg(feature = "sqlite")]
    pub async fn connect(url: &str) -> Result<Self> {
        use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
        use std::str::FromStr;

        info!(url, "Opening database");

        if let Some(parent) = sqlite_file_path(url).and_then(|p| p.parent().map(|p| p.to_owned()))
        {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(&parent)?;
            }
        }

        let options = SqliteConnectOptions::from_str(url)
            .map_err(|e| FiledockError::DatabaseConnection(e.to_string()))?
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(|e| FiledockError::DatabaseConnection(e.to_string()))?;

        let db = Self { pool };
        db.migrate().await?;
        Ok(db)
    }

    /// Connect to the database at `url` and apply pending migrations.
    #[cfg(all(feature = "postgres", not(feature = "sqlite")))]
    pub async fn connect(url: &str) -> Result<Self> {
        use sqlx::postgres::PgPoolOptions;

        info!("Opening PostgreSQL database");
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(url)
            .await
            .map_err(|e| FiledockError::DatabaseConnection(e.to_string()))?;

        let db = Self { pool };
        db.migrate().await?;
        Ok(db)
    }

    /// Open a migrated in-memory SQLite database.
    ///
    /// The pool holds a single connection that never expires, so every
    /// query sees the same database.
    #[cfg(feature = "sqlite")]
    pub async fn open_in_memory() -> Result<Self> {
        use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
        use std::str::FromStr;

        debug!("Opening in-memory database");
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(|e| FiledockError::DatabaseConnection(e.to_string()))?
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .map_err(|e| FiledockError::DatabaseConnection(e.to_string()))?;

        let db = Self { pool };
        db.migrate().await?;
        Ok(db)
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    /// Get the current schema version (0 when nothing is applied).
    pub async fn schema_version(&self) -> Result<i64> {
        self.ensure_version_table().await?;
        let version: i64 =
            sqlx::query_scalar("SELECT COALESCE(MAX(version), 0) FROM schema_version")
                .fetch_one(&self.pool)
                .await?;
        Ok(version)
    }

    async fn ensure_version_table(&self) -> Result<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS schema_version (
                version     BIGINT PRIMARY KEY,
                applied_at  TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Apply pending migrations, each inside its own transaction.
    pub async fn migrate(&self) -> Result<()> {
        let current = self.schema_version().await?;
        let target = MIGRATIONS.len() as i64;

        if current >= target {
            debug!(version = current, "Database is up to date");
            return Ok(());
        }

        info!(from = current, to = target, "Migrating database");

        for (i, migration) in MIGRATIONS.iter().enumerate().skip(current as usize) {
            let version = (i + 1) as i64;
            info!(version, "Applying migration");

            let mut tx = self.pool.begin().await?;
            sqlx::raw_sql(migration).execute(&mut *tx).await?;
            sqlx::query("INSERT INTO schema_version (version, applied_at) VALUES ($1, $2)")
                .bind(version)
                .bind(Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true))
                .execute(&mut *tx)
                .await?;
            tx.commit().await?;
        }

        Ok(())
    }
}

/// Extract the file path from a SQLite URL, if it names a file.
#[cfg(feature = "sqlite")]
fn sqlite_file_path(url: &str) -> Option<std::path::PathBuf> {
    let rest = url
        .strip_prefix("sqlite://")
        .or_else(|| url.strip_prefix("sqlite:"))?;
    let path = rest.split('?').next().unwrap_or_default();
    if path.is_empty() || path == ":memory:" {
        return None;
    }
    Some(std::path::PathBuf::from(path))
}

#[cfg(all(test, feature = "sqlite"))]
mod tests {
    use super::*;

    #[test]
    fn test_sqlite_file_path() {
        assert_eq!(
            sqlite_file_path("sqlite://data/filedock.db"),
            Some(std::path::PathBuf::from("data/filedock.db"))
        );
        assert_eq!(
            sqlite_file_path("sqlite:app.db?mode=rwc"),
            Some(std::path::PathBuf::from("app.db"))
        );
        assert_eq!(sqlite_file_path("sqlite::memory:"), None);
        assert_eq!(sqlite_file_path("postgres://localhost/db"), None);
    }

    #[tokio::test]
    async fn test_open_in_memory_applies_migrations() {
        let db = Database::open_in_memory().await.unwrap();
        assert_eq!(db.schema_version().await.unwrap(), MIGRATIONS.len() as i64);

        let tables: Vec<String> = sqlx::query_scalar(
            "SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name",
        )
        .fetch_all(db.pool())
        .await
        .unwrap();
        assert!(tables.contains(&"files".to_string()));
        assert!(tables.contains(&"file_blobs".to_string()));
    }

    #[tokio::test]
    async fn test_migrate_is_idempotent() {
        let db = Database::open_in_memory().await.unwrap();
        db.migrate().await.unwrap();
        db.migrate().await.unwrap();

        let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM schema_version")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(rows, MIGRATIONS.len() as i64);
    }

    #[tokio::test]
    async fn test_connect_creates_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("filedock.db");
        let url = format!("sqlite://{}", path.display());

        let db = Database::connect(&url).await.unwrap();
        assert_eq!(db.schema_version().await.unwrap(), MIGRATIONS.len() as i64);
        assert!(path.exists());
    }

    #[tokio::test]
    async fn test_blob_cascade_on_file_delete() {
        let db = Database::open_in_memory().await.unwrap();
        sqlx::query(
            "INSERT INTO files (id, name, original_name, mime_type, size, category, uploaded_at, is_processed, source)
             VALUES ('f1', 'a.pdf', 'a.pdf', 'application/pdf', 3, 'pdf', '2024-01-01T00:00:00.000Z', TRUE, 'db')",
        )
        .execute(db.pool())
        .await
        .unwrap();
        sqlx::query("INSERT INTO file_blobs (file_id, content) VALUES ('f1', 'YWJj')")
            .execute(db.pool())
            .await
            .unwrap();

        sqlx::query("DELETE FROM files WHERE id = 'f1'")
            .execute(db.pool())
            .await
            .unwrap();

        let blobs: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM file_blobs")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(blobs, 0);
    }
}
