//! Database schema and migrations.
//!
//! Migrations are applied in order when the database is opened. The
//! statements stay within the SQL subset shared by SQLite and PostgreSQL.

/// Database migrations.
///
/// The `schema_version` table records which entries have been applied.
pub const MIGRATIONS: &[&str] = &[
    // v1: file metadata registry
    r#"
CREATE TABLE files (
    id              TEXT PRIMARY KEY,
    name            TEXT NOT NULL,
    original_name   TEXT NOT NULL,
    mime_type       TEXT NOT NULL,
    size            BIGINT NOT NULL DEFAULT 0,
    category        TEXT NOT NULL,
    amount          TEXT,
    uploaded_at     TEXT NOT NULL,           -- RFC 3339, UTC, millisecond precision
    is_processed    BOOLEAN NOT NULL DEFAULT TRUE,
    source          TEXT NOT NULL,           -- 'local', 'ftp', 'db'
    local_path      TEXT,
    ftp_path        TEXT,
    sha256          TEXT
);

CREATE INDEX idx_files_uploaded_at ON files(uploaded_at);
CREATE INDEX idx_files_category ON files(category);
CREATE INDEX idx_files_source ON files(source);
CREATE INDEX idx_files_name ON files(name);
"#,
    // v2: blob content for database-backed storage
    r#"
CREATE TABLE file_blobs (
    file_id     TEXT PRIMARY KEY REFERENCES files(id) ON DELETE CASCADE,
    content     TEXT NOT NULL                -- base64
);
"#,
    // v3: lower-cased names for search, folded in Rust since SQLite's LOWER()
    // only handles ASCII. Older rows stay NULL until SqlFileRegistry backfills them.
    r#"
ALTER TABLE files ADD COLUMN name_lc TEXT;
ALTER TABLE files ADD COLUMN original_name_lc TEXT;
"#,
];
