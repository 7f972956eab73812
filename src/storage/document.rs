//! Document-store backend on MongoDB.
//!
//! Two collections:
//! - `metadata`: one [`FileMetadata`] document per file, unique on `fileId`
//! - `file_chunks`: one document per chunk, unique on `(fileId, chunk)`,
//!   read back sorted by `chunk` and concatenated
//!
//! MongoDB has no multi-collection transaction on a standalone server, so
//! new files are written content first and the chunks are removed again
//! when the metadata insert fails.

use axum::async_trait;
use futures::TryStreamExt;
use mongodb::bson::spec::BinarySubtype;
use mongodb::bson::{doc, Binary};
use mongodb::options::{CountOptions, FindOptions, IndexOptions};
use mongodb::{Client, Collection, Database, IndexModel};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::chunk::Chunk;
use super::pagination::{Page, PageRequest};
use super::types::{unix_now, FileMetadata, FileUpdate, StoredFile, UploadResult};
use super::FileStorageBackend;
use crate::{Error, Result};

const METADATA_COLLECTION: &str = "metadata";
const CHUNKS_COLLECTION: &str = "file_chunks";

/// One stored chunk.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChunkDocument {
    file_id: String,
    chunk: i64,
    data: Binary,
}

impl ChunkDocument {
    fn new(file_id: &str, chunk: &Chunk) -> Self {
        Self {
            file_id: file_id.to_string(),
            chunk: i64::from(chunk.ordinal),
            data: Binary {
                subtype: BinarySubtype::Generic,
                bytes: chunk.data.clone(),
            },
        }
    }
}

/// Storage backend over a MongoDB database.
pub struct DocumentBackend {
    metadata: Collection<FileMetadata>,
    chunks: Collection<ChunkDocument>,
}

impl DocumentBackend {
    /// Connect to `uri` and use the database `name`.
    ///
    /// Indexes are created if missing; existing data is kept.
    pub async fn connect(uri: &str, name: &str) -> Result<Self> {
        let client = Client::with_uri_str(uri).await?;
        let backend = Self::from_database(client.database(name));
        backend.ensure_indexes().await?;

        info!(database = name, "Connected to document storage");
        Ok(backend)
    }

    /// Use an already configured database handle.
    pub fn from_database(database: Database) -> Self {
        Self {
            metadata: database.collection(METADATA_COLLECTION),
            chunks: database.collection(CHUNKS_COLLECTION),
        }
    }

    async fn ensure_indexes(&self) -> Result<()> {
        let unique = || IndexOptions::builder().unique(true).build();

        self.metadata
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "fileId": 1 })
                    .options(unique())
                    .build(),
                None,
            )
            .await?;
        self.metadata
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "createdAt": 1, "fileId": 1 })
                    .build(),
                None,
            )
            .await?;
        self.chunks
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "fileId": 1, "chunk": 1 })
                    .options(unique())
                    .build(),
                None,
            )
            .await?;
        Ok(())
    }

    async fn fetch_metadata(&self, file_id: &str) -> Result<FileMetadata> {
        self.metadata
            .find_one(doc! { "fileId": file_id }, None)
            .await?
            .ok_or_else(|| Error::file_not_found(file_id))
    }

    async fn remove_chunks(&self, file_id: &str) -> Result<u64> {
        let result = self
            .chunks
            .delete_many(doc! { "fileId": file_id }, None)
            .await?;
        Ok(result.deleted_count)
    }

    /// Write the first chunk, then the metadata document.
    async fn create(&self, chunk: &Chunk) -> Result<UploadResult> {
        self.chunks
            .insert_one(ChunkDocument::new(&chunk.file_id, chunk), None)
            .await?;

        if let Err(e) = self.metadata.insert_one(&chunk.metadata, None).await {
            warn!(file_id = %chunk.file_id, error = %e, "Metadata insert failed, removing chunks");
            if let Err(cleanup) = self.remove_chunks(&chunk.file_id).await {
                warn!(file_id = %chunk.file_id, error = %cleanup, "Failed to remove orphaned chunks");
            }
            return Err(e.into());
        }

        debug!(file_id = %chunk.file_id, bytes = chunk.data.len(), "Created file");
        Ok(UploadResult::new(chunk.file_id.clone()))
    }

    async fn append(&self, file_id: &str, chunk: &Chunk) -> Result<UploadResult> {
        self.fetch_metadata(file_id).await?;

        self.chunks
            .insert_one(ChunkDocument::new(file_id, chunk), None)
            .await
            .map_err(|e| match Error::from(e) {
                Error::Conflict(_) => Error::Conflict(format!(
                    "chunk {} of file {file_id} was already uploaded",
                    chunk.ordinal
                )),
                other => other,
            })?;
        self.metadata
            .update_one(
                doc! { "fileId": file_id },
                doc! { "$set": { "updatedAt": unix_now() } },
                None,
            )
            .await?;

        debug!(file_id = %file_id, chunk = chunk.ordinal, bytes = chunk.data.len(), "Appended chunk");
        Ok(UploadResult::new(file_id))
    }

    async fn replace(&self, file_id: &str, chunk: &Chunk) -> Result<UploadResult> {
        let existing = self.fetch_metadata(file_id).await?;
        let replaced = existing.replaced_by(&chunk.metadata, unix_now());

        self.remove_chunks(file_id).await?;
        self.chunks
            .insert_one(ChunkDocument::new(file_id, chunk), None)
            .await?;
        self.metadata
            .update_one(
                doc! { "fileId": file_id },
                doc! { "$set": {
                    "filename": replaced.filename.as_str(),
                    "extension": replaced.extension.as_str(),
                    "updatedAt": replaced.updated_at,
                } },
                None,
            )
            .await?;

        debug!(file_id = %file_id, bytes = chunk.data.len(), "Replaced content");
        Ok(UploadResult::new(file_id))
    }
}

#[async_trait]
impl FileStorageBackend for DocumentBackend {
    fn name(&self) -> &'static str {
        "mongodb"
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

        let options = FindOptions::builder().sort(doc! { "chunk": 1 }).build();
        let chunks: Vec<ChunkDocument> = self
            .chunks
            .find(doc! { "fileId": file_id }, options)
            .await?
            .try_collect()
            .await?;
        if chunks.is_empty() {
            return Err(Error::file_not_found(file_id));
        }

        let content = chunks.into_iter().flat_map(|c| c.data.bytes).collect();
        Ok(StoredFile { content, metadata })
    }

    async fn get_file_metadata(&self, file_id: &str) -> Result<FileMetadata> {
        self.fetch_metadata(file_id).await
    }

    async fn get_all_files(&self, request: PageRequest) -> Result<Page<FileMetadata>> {
        let offset = request.offset();
        let options = FindOptions::builder()
            .sort(doc! { "createdAt": 1, "fileId": 1 })
            .skip(offset)
            .limit(i64::from(request.page_size))
            .build();
        let items: Vec<FileMetadata> = self
            .metadata
            .find(doc! {}, options)
            .await?
            .try_collect()
            .await?;

        let beyond = CountOptions::builder()
            .skip(offset.saturating_add(u64::from(request.page_size)))
            .limit(1)
            .build();
        let has_next_page = self.metadata.count_documents(doc! {}, beyond).await? > 0;

        Ok(Page::new(items, request, has_next_page))
    }

    async fn update_file(&self, file_id: &str, update: FileUpdate) -> Result<UploadResult> {
        match update {
            FileUpdate::Metadata(update) => {
                let result = self
                    .metadata
                    .update_one(
                        doc! { "fileId": file_id },
                        doc! { "$set": { "filename": update.filename, "updatedAt": unix_now() } },
                        None,
                    )
                    .await?;
                if result.matched_count == 0 {
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
        self.remove_chunks(file_id).await?;
        let result = self
            .metadata
            .delete_one(doc! { "fileId": file_id }, None)
            .await?;
        if result.deleted_count == 0 {
            return Err(Error::file_not_found(file_id));
        }

        debug!(file_id = %file_id, "Deleted file");
        Ok(true)
    }
}
