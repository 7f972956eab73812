//! Directory-tree storage backend.
//!
//! Each file lives in its own directory:
//! ```text
//! {root}/
//! ├── 0b7f3c1e-.../
//! │   ├── file            (concatenated chunk bytes)
//! │   └── metadata.json   (FileMetadata, camelCase JSON)
//! └── ...
//! ```
//! Chunks after the first are appended to `file` in arrival order; the
//! ordinal itself is not checked against the stored length.

use std::io;
use std::path::{Path, PathBuf};

use axum::async_trait;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use super::chunk::Chunk;
use super::pagination::{Page, PageRequest};
use super::types::{unix_now, FileMetadata, FileUpdate, StoredFile, UploadResult};
use super::FileStorageBackend;
use crate::{Error, Result};

const CONTENT_FILE: &str = "file";
const METADATA_FILE: &str = "metadata.json";

/// Storage backend keeping every file in its own directory.
#[derive(Debug, Clone)]
pub struct FilesystemBackend {
    root: PathBuf,
}

impl FilesystemBackend {
    /// Open the backend, creating the root directory if needed.
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root).await?;
        debug!(root = %root.display(), "Opened filesystem storage");
        Ok(Self { root })
    }

    /// Root directory of this backend.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory of one file.
    ///
    /// Identifiers that could escape the root can never name a stored file.
    fn file_dir(&self, file_id: &str) -> Result<PathBuf> {
        let valid = !file_id.is_empty()
            && file_id != "."
            && file_id != ".."
            && !file_id.contains(['/', '\\', '\0']);
        if !valid {
            return Err(Error::file_not_found(file_id));
        }
        Ok(self.root.join(file_id))
    }

    async fn read_metadata(&self, dir: &Path, file_id: &str) -> Result<FileMetadata> {
        match fs::read(dir.join(METADATA_FILE)).await {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Err(Error::file_not_found(file_id)),
            Err(e) => Err(e.into()),
        }
    }

    async fn write_metadata(&self, dir: &Path, metadata: &FileMetadata) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(metadata)?;
        write_replace(&dir.join(METADATA_FILE), &bytes).await
    }

    async fn append_content(&self, dir: &Path, data: &[u8]) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(dir.join(CONTENT_FILE))
            .await?;
        file.write_all(data).await?;
        file.flush().await?;
        Ok(())
    }

    /// Create a new file from its first chunk.
    ///
    /// Content is written before metadata; if the metadata write fails the
    /// orphaned content is removed again.
    async fn create(&self, chunk: &Chunk) -> Result<UploadResult> {
        let dir = self.file_dir(&chunk.file_id)?;
        fs::create_dir_all(&dir).await?;
        fs::write(dir.join(CONTENT_FILE), &chunk.data).await?;

        if let Err(e) = self.write_metadata(&dir, &chunk.metadata).await {
            warn!(file_id = %chunk.file_id, error = %e, "Metadata write failed, removing content");
            if let Err(cleanup) = fs::remove_dir_all(&dir).await {
                warn!(file_id = %chunk.file_id, error = %cleanup, "Failed to remove orphaned content");
            }
            return Err(e);
        }

        debug!(file_id = %chunk.file_id, bytes = chunk.data.len(), "Created file");
        Ok(UploadResult::new(chunk.file_id.clone()))
    }

    /// Append a continuation chunk to an existing file.
    async fn append(&self, file_id: &str, chunk: &Chunk) -> Result<UploadResult> {
        let dir = self.file_dir(file_id)?;
        let mut metadata = self.read_metadata(&dir, file_id).await?;

        self.append_content(&dir, &chunk.data).await?;
        metadata.updated_at = unix_now();
        self.write_metadata(&dir, &metadata).await?;

        debug!(file_id = %file_id, chunk = chunk.ordinal, bytes = chunk.data.len(), "Appended chunk");
        Ok(UploadResult::new(file_id))
    }
}

/// Replace a file's content by writing a sibling and renaming it over the
/// original.
async fn write_replace(path: &Path, bytes: &[u8]) -> Result<()> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    fs::write(&tmp, bytes).await?;
    if let Err(e) = fs::rename(&tmp, path).await {
        let _ = fs::remove_file(&tmp).await;
        return Err(e.into());
    }
    Ok(())
}

#[async_trait]
impl FileStorageBackend for FilesystemBackend {
    fn name(&self) -> &'static str {
        "filesystem"
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
        let dir = self.file_dir(file_id)?;
        let metadata = self.read_metadata(&dir, file_id).await?;
        let content = match fs::read(dir.join(CONTENT_FILE)).await {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(Error::file_not_found(file_id))
            }
            Err(e) => return Err(e.into()),
        };

        Ok(StoredFile { content, metadata })
    }

    async fn get_file_metadata(&self, file_id: &str) -> Result<FileMetadata> {
        let dir = self.file_dir(file_id)?;
        self.read_metadata(&dir, file_id).await
    }

    async fn get_all_files(&self, request: PageRequest) -> Result<Page<FileMetadata>> {
        let mut names = Vec::new();
        let mut entries = fs::read_dir(&self.root).await?;
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_dir() {
                continue;
            }
            if !fs::try_exists(entry.path().join(METADATA_FILE)).await? {
                continue;
            }
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        names.sort();

        let offset = usize::try_from(request.offset()).unwrap_or(usize::MAX);
        let limit = usize::try_from(request.fetch_limit()).unwrap_or(usize::MAX);

        let mut records = Vec::new();
        for name in names.into_iter().skip(offset).take(limit) {
            let dir = self.root.join(&name);
            match self.read_metadata(&dir, &name).await {
                Ok(metadata) => records.push(metadata),
                // Deleted between the directory scan and this read.
                Err(Error::NotFound(_)) => continue,
                Err(e) => return Err(e),
            }
        }

        Ok(Page::from_overfetch(records, request))
    }

    async fn update_file(&self, file_id: &str, update: FileUpdate) -> Result<UploadResult> {
        let dir = self.file_dir(file_id)?;
        let metadata = self.read_metadata(&dir, file_id).await?;

        match update {
            FileUpdate::Metadata(update) => {
                let renamed = FileMetadata {
                    filename: update.filename,
                    updated_at: unix_now(),
                    ..metadata
                };
                self.write_metadata(&dir, &renamed).await?;
                debug!(file_id = %file_id, "Renamed file");
                Ok(UploadResult::new(file_id))
            }
            FileUpdate::Content(chunk) if chunk.is_first() => {
                write_replace(&dir.join(CONTENT_FILE), &chunk.data).await?;
                let replaced = metadata.replaced_by(&chunk.metadata, unix_now());
                self.write_metadata(&dir, &replaced).await?;
                debug!(file_id = %file_id, bytes = chunk.data.len(), "Replaced content");
                Ok(UploadResult::new(file_id))
            }
            FileUpdate::Content(chunk) => self.append(file_id, &chunk).await,
        }
    }

    async fn delete_file(&self, file_id: &str) -> Result<bool> {
        let dir = self.file_dir(file_id)?;
        if !fs::try_exists(dir.join(METADATA_FILE)).await? {
            return Err(Error::file_not_found(file_id));
        }

        match fs::remove_file(dir.join(CONTENT_FILE)).await {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        fs::remove_dir_all(&dir).await?;

        debug!(file_id = %file_id, "Deleted file");
        Ok(true)
    }
}
