//! Relational schema for hybrid-storage.
//!
//! Statements are idempotent and run on every startup. Existing tables are
//! never dropped.

use super::dialect::SqlDialect;

/// Schema statements for `dialect`, in execution order.
pub fn statements(dialect: SqlDialect) -> Vec<String> {
    vec![
        r#"
-- One row per logical file
CREATE TABLE IF NOT EXISTS metadata (
    file_id     TEXT PRIMARY KEY,
    filename    TEXT NOT NULL,
    extension   TEXT NOT NULL DEFAULT '',
    created_at  BIGINT NOT NULL,   -- unix seconds
    updated_at  BIGINT NOT NULL    -- unix seconds
)"#
        .to_string(),
        "CREATE INDEX IF NOT EXISTS idx_metadata_created_at ON metadata(created_at, file_id)"
            .to_string(),
        format!(
            r#"
-- One row per uploaded chunk, concatenated by chunk number on read
CREATE TABLE IF NOT EXISTS file_chunks (
    file_id     TEXT NOT NULL,
    chunk       BIGINT NOT NULL,
    data        {blob} NOT NULL,
    UNIQUE (file_id, chunk)
)"#,
            blob = dialect.blob_type()
        ),
    ]
}
