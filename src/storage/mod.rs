//! Storage backends for hybrid-storage.
//!
//! Every engine implements [`FileStorageBackend`] with identical external
//! semantics, so the HTTP layer never needs to know which one is active:
//!
//! - [`FilesystemBackend`]: one directory per file with a `metadata.json`
//!   sidecar
//! - [`SqlBackend`]: SQLite or PostgreSQL, one row per chunk
//! - [`DocumentBackend`]: MongoDB, one document per chunk
//!
//! The backend is chosen once at startup by [`open_backend`] and shared as
//! an `Arc<dyn FileStorageBackend>` for the lifetime of the process.

pub mod chunk;
pub mod document;
pub mod filesystem;
pub mod pagination;
pub mod sql;
pub mod types;

use std::sync::Arc;

use axum::async_trait;
use tracing::info;

pub use chunk::{split_filename, Chunk, ChunkAssembler, ChunkForm};
pub use document::DocumentBackend;
pub use filesystem::FilesystemBackend;
pub use pagination::{Page, PageRequest};
pub use sql::{QueryCache, SqlBackend, SqlDialect};
pub use types::{
    new_file_id, unix_now, FileId, FileMetadata, FileUpdate, MetadataUpdate, StoredFile,
    UploadResult,
};

use crate::config::{BackendKind, StorageConfig};
use crate::Result;

/// The contract every storage engine satisfies.
#[async_trait]
pub trait FileStorageBackend: Send + Sync {
    /// Short engine name used in logs.
    fn name(&self) -> &'static str;

    /// Persist one chunk.
    ///
    /// Ordinal 1 creates the metadata record and the stored content.
    /// Later ordinals append to the content of `chunk.file_id` and advance
    /// `updatedAt`; the file must already exist.
    async fn upload_file(&self, chunk: Chunk) -> Result<UploadResult>;

    /// Full content and metadata. NotFound when either half is missing.
    async fn get_file(&self, file_id: &str) -> Result<StoredFile>;

    /// Metadata record of one file.
    async fn get_file_metadata(&self, file_id: &str) -> Result<FileMetadata>;

    /// One page of metadata records in a stable order.
    async fn get_all_files(&self, request: PageRequest) -> Result<Page<FileMetadata>>;

    /// Rename a file or replace its content in place.
    async fn update_file(&self, file_id: &str, update: FileUpdate) -> Result<UploadResult>;

    /// Remove content and metadata. NotFound when no metadata existed.
    async fn delete_file(&self, file_id: &str) -> Result<bool>;
}

/// Open the backend selected by the configuration.
pub async fn open_backend(config: &StorageConfig) -> Result<Arc<dyn FileStorageBackend>> {
    let backend: Arc<dyn FileStorageBackend> = match config.backend {
        BackendKind::Filesystem => Arc::new(FilesystemBackend::open(&config.files_dir).await?),
        BackendKind::Sqlite | BackendKind::Postgres => Arc::new(
            SqlBackend::connect(&config.database_url, config.max_connections).await?,
        ),
        BackendKind::Mongodb => Arc::new(
            DocumentBackend::connect(&config.mongodb_uri, &config.mongodb_database).await?,
        ),
    };

    info!(backend = backend.name(), "Storage backend ready");
    Ok(backend)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_open_filesystem_backend() {
        let temp = TempDir::new().unwrap();
        let config = StorageConfig {
            files_dir: temp.path().join("files").to_string_lossy().into_owned(),
            ..StorageConfig::default()
        };

        let backend = open_backend(&config).await.unwrap();
        assert_eq!(backend.name(), "filesystem");
        assert!(temp.path().join("files").is_dir());
    }

    #[tokio::test]
    async fn test_open_sqlite_backend() {
        let temp = TempDir::new().unwrap();
        let config = StorageConfig {
            backend: BackendKind::Sqlite,
            database_url: format!("sqlite://{}?mode=rwc", temp.path().join("db.sqlite").display()),
            ..StorageConfig::default()
        };

        let backend = open_backend(&config).await.unwrap();
        assert_eq!(backend.name(), "sqlite");
    }
}
