//! Relational storage backend for SQLite and PostgreSQL.
//!
//! Metadata lives in the `metadata` table, one row per file. Content lives
//! in `file_chunks`, one row per uploaded chunk keyed by `(file_id, chunk)`
//! and concatenated by chunk number on read. A retransmitted chunk number
//! violates the unique key and surfaces as a conflict.
//!
//! Queries are written once with `?` placeholders and translated per
//! dialect through a [`QueryCache`] owned by the backend.

mod dialect;
mod schema;

pub use dialect::{QueryCache, SqlDialect};

use std::path::Path;
use std::sync::Arc;

use axum::async_trait;
use sqlx::any::AnyPoolOptions;
use sqlx::AnyPool;
use tracing::{debug, info};

use super::chunk::Chunk;
use super::pagination::{Page, PageRequest};
use super::types::{unix_now, FileMetadata, FileUpdate, StoredFile, UploadResult};
use super::FileStorageBackend;
use crate::{Error, Result};

const SELECT_METADATA: &str =
    "SELECT file_id, filename, extension, created_at, updated_at FROM metadata WHERE file_id = ?";
const INSERT_METADATA: &str = "INSERT INTO metadata (file_id, filename, extension, created_at, updated_at) VALUES (?, ?, ?, ?, ?)";
const INSERT_CHUNK: &str = "INSERT INTO file_chunks (file_id, chunk, data) VALUES (?, ?, ?)";
const TOUCH_METADATA: &str = "UPDATE metadata SET updated_at = ? WHERE file_id = ?";
const DELETE_CHUNKS: &str = "DELETE FROM file_chunks WHERE file_id = ?";

#[derive(Debug, sqlx::FromRow)]
struct MetadataRow {
    file_id: String,
    filename: String,
    extension: String,
    created_at: i64,
    updated_at: i64,
}

impl From<MetadataRow> for FileMetadata {
    fn from(row: MetadataRow) -> Self {
        Self {
            file_id: row.file_id,
            filename: row.filename,
            extension: row.extension,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Storage backend over a SQLite or PostgreSQL connection pool.
pub struct SqlBackend {
    pool: AnyPool,
    dialect: SqlDialect,
    cache: Arc<QueryCache>,
}

impl SqlBackend {
    /// Connect with a fresh query cache.
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self> {
        Self::with_cache(url, max_connections, Arc::new(QueryCache::new())).await
    }

    /// Connect using an existing query cache.
    ///
    /// The schema is created if it does not exist yet.
    pub async fn with_cache(
        url: &str,
        max_connections: u32,
        cache: Arc<QueryCache>,
    ) -> Result<Self> {
        let dialect = SqlDialect::from_url(url)?;
        if dialect == SqlDialect::Sqlite {
            create_sqlite_parent_dir(url)?;
        }

        sqlx::any::install_default_drivers();
        let pool = AnyPoolOptions::new()
            .max_connections(max_connections.max(1))
            .connect(url)
            .await?;

        let backend = Self {
            pool,
            dialect,
            cache,
        };
        backend.migrate().await?;

        info!(dialect = %dialect, "Connected to relational storage");
        Ok(backend)
    }

    /// Dialect of the connected database.
    pub fn dialect(&self) -> SqlDialect {
        self.dialect
    }

    /// Query cache shared by this backend.
    pub fn cache(&self) -> &Arc<QueryCache> {
        &self.cache
    }

    /// Query text in this backend's dialect.
    fn sql(&self, sql: &str) -> String {
        self.cache.get(self.dialect, sql)
    }

    async fn migrate(&self) -> Result<()> {
        for statement in schema::statements(self.dialect) {
            sqlx::query(&statement).execute(&self.pool).await?;
        }
        Ok(())
    }

    async fn fetch_metadata(&self, file_id: &str) -> Result<FileMetadata> {
        let sql = self.sql(SELECT_METADATA);
        sqlx::query_as::<_, MetadataRow>(&sql)
            .bind(file_id)
            .fetch_optional(&self.pool)
            .await?
            .map(FileMetadata::from)
            .ok_or_else(|| Error::file_not_found(file_id))
    }

    /// Create metadata and the first chunk in one transaction.
    async fn create(&self, chunk: &Chunk) -> Result<UploadResult> {
        let metadata = &chunk.metadata;
        let insert_metadata = self.sql(INSERT_METADATA);
        let insert_chunk = self.sql(INSERT_CHUNK);

        let mut tx = self.pool.begin().await?;
        sqlx::query(&insert_metadata)
            .bind(&chunk.file_id)
            .bind(&metadata.filename)
            .bind(&metadata.extension)
            .bind(metadata.created_at)
            .bind(metadata.updated_at)
            .execute(&mut *tx)
            .await?;
        sqlx::query(&insert_chunk)
            .bind(&chunk.file_id)
            .bind(i64::from(chunk.ordinal))
            .bind(&chunk.data)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        debug!(file_id = %chunk.file_id, bytes = chunk.data.len(), "Created file");
        Ok(UploadResult::new(chunk.file_id.clone()))
    }

    /// Insert a continuation chunk and advance `updated_at`.
    async fn append(&self, file_id: &str, chunk: &Chunk) -> Result<UploadResult> {
        let touch = self.sql(TOUCH_METADATA);
        let insert_chunk = self.sql(INSERT_CHUNK);

        let mut tx = self.pool.begin().await?;
        let touched = sqlx::query(&touch)
            .bind(unix_now())
            .bind(file_id)
            .execute(&mut *tx)
            .await?;
        if touched.rows_affected() == 0 {
            return Err(Error::file_not_found(file_id));
        }

        sqlx::query(&insert_chunk)
            .bind(file_id)
            .bind(i64::from(chunk.ordinal))
            .bind(&chunk.data)
            .execute(&mut *tx)
            .await
            .map_err(|e| match Error::from(e) {
                Error::Conflict(_) => Error::Conflict(format!(
                    "chunk {} of file {file_id} was already uploaded",
                    chunk.ordinal
                )),
                other => other,
            })?;
        tx.commit().await?;

        debug!(file_id = %file_id, chunk = chunk.ordinal, bytes = chunk.data.len(), "Appended chunk");
        Ok(UploadResult::new(file_id))
    }

    /// Replace all chunks with `chunk` and refresh the name.
    async fn replace(&self, file_id: &str, chunk: &Chunk) -> Result<UploadResult> {
        let select = self.sql(SELECT_METADATA);
        let update = self.sql(
            "UPDATE metadata SET filename = ?, extension = ?, updated_at = ? WHERE file_id = ?",
        );
        let delete_chunks = self.sql(DELETE_CHUNKS);
        let insert_chunk = self.sql(INSERT_CHUNK);

        let mut tx = self.pool.begin().await?;
        let existing: FileMetadata = sqlx::query_as::<_, MetadataRow>(&select)
            .bind(file_id)
            .fetch_optional(&mut *tx)
            .await?
            .map(FileMetadata::from)
            .ok_or_else(|| Error::file_not_found(file_id))?;
        let replaced = existing.replaced_by(&chunk.metadata, unix_now());

        sqlx::query(&update)
            .bind(&replaced.filename)
            .bind(&replaced.extension)
            .bind(replaced.updated_at)
            .bind(file_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query(&delete_chunks)
            .bind(file_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query(&insert_chunk)
            .bind(file_id)
            .bind(i64::from(chunk.ordinal))
            .bind(&chunk.data)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        debug!(file_id = %file_id, bytes = chunk.data.len(), "Replaced content");
        Ok(UploadResult::new(file_id))
    }
}

/// SQLite creates the database file but not its directory.
fn create_sqlite_parent_dir(url: &str) -> Result<()> {
    let rest = url
        .strip_prefix("sqlite://")
        .or_else(|| url.strip_prefix("sqlite:"))
        .unwrap_or(url);
    let path = rest.split('?').next().unwrap_or("");
    if path.is_empty() || path.starts_with(':') {
        return Ok(());
    }

    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

#[async_trait]
impl FileStorageBackend for SqlBackend {
    fn name(&self) -> &'static str {
        self.dialect.as_str()
    }

    async fn upload_file(&self, chunk: Chunk) -> Result<UploadResult> {
        if chunk.is_first() {
            self.create(&chunk).await
        } else {
            let file_id = chunk.continuation_id()?.to_string();
            self.append(&file_id, &chunk).await
        }
    }

    async fn get_file(&self, file_id: &str) -> Result<StoredFile> {
        let metadata = self.fetch_metadata(file_id).await?;

        let sql = self.sql("SELECT data FROM file_chunks WHERE file_id = ? ORDER BY chunk");
        let chunks: Vec<Vec<u8>> = sqlx::query_scalar(&sql)
            .bind(file_id)
            .fetch_all(&self.pool)
            .await?;
        if chunks.is_empty() {
            return Err(Error::file_not_found(file_id));
        }

        Ok(StoredFile {
            content: chunks.concat(),
            metadata,
        })
    }

    async fn get_file_metadata(&self, file_id: &str) -> Result<FileMetadata> {
        self.fetch_metadata(file_id).await
    }

    async fn get_all_files(&self, request: PageRequest) -> Result<Page<FileMetadata>> {
        let sql = self.sql(
            "SELECT file_id, filename, extension, created_at, updated_at FROM metadata \
             ORDER BY created_at, file_id LIMIT ? OFFSET ?",
        );
        let rows = sqlx::query_as::<_, MetadataRow>(&sql)
            .bind(i64::try_from(request.fetch_limit()).unwrap_or(i64::MAX))
            .bind(i64::try_from(request.offset()).unwrap_or(i64::MAX))
            .fetch_all(&self.pool)
            .await?;

        let records = rows.into_iter().map(FileMetadata::from).collect();
        Ok(Page::from_overfetch(records, request))
    }

    async fn update_file(&self, file_id: &str, update: FileUpdate) -> Result<UploadResult> {
        match update {
            FileUpdate::Metadata(update) => {
                let sql =
                    self.sql("UPDATE metadata SET filename = ?, updated_at = ? WHERE file_id = ?");
                let result = sqlx::query(&sql)
                    .bind(&update.filename)
                    .bind(unix_now())
                    .bind(file_id)
                    .execute(&self.pool)
                    .await?;
                if result.rows_affected() == 0 {
                    return Err(Error::file_not_found(file_id));
                }
                debug!(file_id = %file_id, "Renamed file");
                Ok(UploadResult::new(file_id))
            }
            FileUpdate::Content(chunk) if chunk.is_first() => self.replace(file_id, &chunk).await,
            FileUpdate::Content(chunk) => self.append(file_id, &chunk).await,
        }
    }

    async fn delete_file(&self, file_id: &str) -> Result<bool> {
        let delete_chunks = self.sql(DELETE_CHUNKS);
        let delete_metadata = self.sql("DELETE FROM metadata WHERE file_id = ?");

        let mut tx = self.pool.begin().await?;
        sqlx::query(&delete_chunks)
            .bind(file_id)
            .execute(&mut *tx)
            .await?;
        let deleted = sqlx::query(&delete_metadata)
            .bind(file_id)
            .execute(&mut *tx)
            .await?;
        if deleted.rows_affected() == 0 {
            return Err(Error::file_not_found(file_id));
        }
        tx.commit().await?;

        debug!(file_id = %file_id, "Deleted file");
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::chunk::{ChunkAssembler, ChunkForm};
    use tempfile::TempDir;

    fn sqlite_url(temp: &TempDir) -> String {
        format!("sqlite://{}?mode=rwc", temp.path().join("store.db").display())
    }

    async fn setup() -> (TempDir, SqlBackend) {
        let temp = TempDir::new().unwrap();
        let backend = SqlBackend::connect(&sqlite_url(&temp), 2).await.unwrap();
        (temp, backend)
    }

    fn chunk(number: u32, total: u32, file_id: &str, data: &[u8]) -> Chunk {
        let form = ChunkForm {
            file: Some(data.to_vec()),
            chunk_number: Some(number.to_string()),
            total_chunks: Some(total.to_string()),
            filename: Some("data.bin".to_string()),
            file_id: Some(file_id.to_string()),
        };
        ChunkAssembler::assemble(form, file_id, unix_now()).unwrap()
    }

    #[tokio::test]
    async fn test_backend_name() {
        let (_temp, backend) = setup().await;
        assert_eq!(backend.name(), "sqlite");
        assert_eq!(backend.dialect(), SqlDialect::Sqlite);
    }

    #[tokio::test]
    async fn test_duplicate_chunk_is_conflict() {
        let (_temp, backend) = setup().await;
        backend.upload_file(chunk(1, 3, "id", b"a")).await.unwrap();
        backend.upload_file(chunk(2, 3, "id", b"b")).await.unwrap();

        let result = backend.upload_file(chunk(2, 3, "id", b"b")).await;
        assert!(matches!(result, Err(Error::Conflict(_))));

        let stored = backend.get_file("id").await.unwrap();
        assert_eq!(stored.content, b"ab");
    }

    #[tokio::test]
    async fn test_duplicate_first_chunk_leaves_original() {
        let (_temp, backend) = setup().await;
        backend.upload_file(chunk(1, 1, "id", b"first")).await.unwrap();

        let result = backend.upload_file(chunk(1, 1, "id", b"second")).await;
        assert!(matches!(result, Err(Error::Conflict(_))));

        let stored = backend.get_file("id").await.unwrap();
        assert_eq!(stored.content, b"first");
    }

    #[tokio::test]
    async fn test_chunks_read_in_ordinal_order() {
        let (_temp, backend) = setup().await;
        backend.upload_file(chunk(1, 3, "id", b"1")).await.unwrap();
        backend.upload_file(chunk(3, 3, "id", b"3")).await.unwrap();
        backend.upload_file(chunk(2, 3, "id", b"2")).await.unwrap();

        let stored = backend.get_file("id").await.unwrap();
        assert_eq!(stored.content, b"123");
    }

    #[tokio::test]
    async fn test_data_survives_reconnect() {
        let temp = TempDir::new().unwrap();
        let url = sqlite_url(&temp);
        {
            let backend = SqlBackend::connect(&url, 1).await.unwrap();
            backend.upload_file(chunk(1, 1, "kept", b"data")).await.unwrap();
        }

        let backend = SqlBackend::connect(&url, 1).await.unwrap();
        let stored = backend.get_file("kept").await.unwrap();
        assert_eq!(stored.content, b"data");
    }

    #[tokio::test]
    async fn test_injected_cache_is_used() {
        let temp = TempDir::new().unwrap();
        let cache = Arc::new(QueryCache::new());
        let backend = SqlBackend::with_cache(&sqlite_url(&temp), 1, Arc::clone(&cache))
            .await
            .unwrap();

        backend.upload_file(chunk(1, 1, "id", b"x")).await.unwrap();
        backend.get_file_metadata("id").await.unwrap();

        assert!(!cache.is_empty());
        assert!(Arc::ptr_eq(backend.cache(), &cache));
    }

    #[tokio::test]
    async fn test_creates_parent_directory() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested").join("dir").join("store.db");
        let url = format!("sqlite://{}?mode=rwc", path.display());

        SqlBackend::connect(&url, 1).await.unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_create_sqlite_parent_dir_ignores_memory() {
        assert!(create_sqlite_parent_dir("sqlite::memory:").is_ok());
    }
}
