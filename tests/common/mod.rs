//! Test helpers shared by the integration tests.
//!
//! Provides backend constructors, chunk builders and an HTTP test server
//! wired to a real storage backend.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum_test::multipart::{MultipartForm, Part};
use axum_test::TestServer;
use tempfile::TempDir;

use hybrid_storage::config::{PaginationConfig, UploadConfig};
use hybrid_storage::storage::{
    Chunk, ChunkAssembler, ChunkForm, FileStorageBackend, FilesystemBackend, SqlBackend,
};
use hybrid_storage::web::handlers::AppState;
use hybrid_storage::web::router::{create_health_router, create_router};

/// Default timeout applied to requests in tests.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Open a directory-tree backend rooted inside `temp`.
pub async fn filesystem_backend(temp: &TempDir) -> Arc<dyn FileStorageBackend> {
    let backend = FilesystemBackend::open(temp.path().join("files"))
        .await
        .expect("Failed to open filesystem backend");
    Arc::new(backend)
}

/// Open a SQLite backend stored inside `temp`.
pub async fn sqlite_backend(temp: &TempDir) -> Arc<dyn FileStorageBackend> {
    let url = format!(
        "sqlite://{}?mode=rwc",
        temp.path().join("storage.db").display()
    );
    let backend = SqlBackend::connect(&url, 2)
        .await
        .expect("Failed to open sqlite backend");
    Arc::new(backend)
}

/// Build a chunk the way the upload handler does.
///
/// `file_id` is used as the generated identifier for chunk 1 and as the
/// client-reported identifier for later chunks.
pub fn chunk_at(
    number: u32,
    total: u32,
    filename: &str,
    file_id: &str,
    data: &[u8],
    now: i64,
) -> Chunk {
    let form = ChunkForm {
        file: Some(data.to_vec()),
        chunk_number: Some(number.to_string()),
        total_chunks: Some(total.to_string()),
        filename: Some(filename.to_string()),
        file_id: Some(file_id.to_string()),
    };
    ChunkAssembler::assemble(form, file_id, now).expect("Failed to assemble chunk")
}

/// Build a chunk stamped with the current time.
pub fn chunk(number: u32, total: u32, filename: &str, file_id: &str, data: &[u8]) -> Chunk {
    chunk_at(
        number,
        total,
        filename,
        file_id,
        data,
        hybrid_storage::storage::unix_now(),
    )
}

/// Create a test server over `backend` with default limits.
pub fn create_test_server(backend: Arc<dyn FileStorageBackend>) -> TestServer {
    create_test_server_with(backend, UploadConfig::default())
}

/// Create a test server over `backend` with the given upload limits.
pub fn create_test_server_with(
    backend: Arc<dyn FileStorageBackend>,
    upload: UploadConfig,
) -> TestServer {
    let app_state = Arc::new(
        AppState::new(backend)
            .with_upload_config(upload)
            .with_pagination_config(PaginationConfig::default()),
    );
    let router = create_router(app_state, &[], DEFAULT_TIMEOUT).merge(create_health_router());
    TestServer::new(router).expect("Failed to create test server")
}

/// Multipart form for one chunk upload.
pub fn chunk_form(
    number: &str,
    total: &str,
    filename: &str,
    file_id: Option<&str>,
    data: &[u8],
) -> MultipartForm {
    let mut form = MultipartForm::new()
        .add_text("chunkNumber", number.to_string())
        .add_text("totalChunks", total.to_string())
        .add_text("filename", filename.to_string());
    if let Some(id) = file_id {
        form = form.add_text("fileId", id.to_string());
    }
    form.add_part(
        "file",
        Part::bytes(data.to_vec())
            .file_name(filename.to_string())
            .mime_type("application/octet-stream"),
    )
}
