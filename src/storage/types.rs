//! Shared storage types.
//!
//! These are the shapes every backend persists and returns. The JSON field
//! names are part of the client contract and must not change between
//! backends.

use serde::{Deserialize, Serialize};
use validator::Validate;

use super::chunk::Chunk;

/// Opaque unique identifier naming one logical file.
pub type FileId = String;

/// Generate a new file identifier.
pub fn new_file_id() -> FileId {
    uuid::Uuid::new_v4().to_string()
}

/// Current time in unix seconds.
pub fn unix_now() -> i64 {
    chrono::Utc::now().timestamp()
}

/// Descriptive state associated with one file identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileMetadata {
    /// File identifier (join key with the stored content).
    pub file_id: FileId,
    /// File name without extension.
    pub filename: String,
    /// Extension including the leading dot, or empty.
    pub extension: String,
    /// Creation time in unix seconds.
    pub created_at: i64,
    /// Last content or metadata mutation in unix seconds.
    pub updated_at: i64,
}

impl FileMetadata {
    /// Create a metadata record stamped with `now`.
    pub fn new(
        file_id: impl Into<FileId>,
        filename: impl Into<String>,
        extension: impl Into<String>,
        now: i64,
    ) -> Self {
        Self {
            file_id: file_id.into(),
            filename: filename.into(),
            extension: extension.into(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Full display name (`filename` + `extension`).
    pub fn display_name(&self) -> String {
        format!("{}{}", self.filename, self.extension)
    }

    /// Apply a content replacement: take the new name from `payload`, keep
    /// `created_at`, and advance `updated_at`.
    pub fn replaced_by(&self, payload: &FileMetadata, now: i64) -> Self {
        Self {
            file_id: self.file_id.clone(),
            filename: payload.filename.clone(),
            extension: payload.extension.clone(),
            created_at: self.created_at,
            updated_at: now,
        }
    }
}

/// Result of an upload or update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResult {
    /// Identifier of the file that was written.
    pub file_id: FileId,
}

impl UploadResult {
    /// Create a new result.
    pub fn new(file_id: impl Into<FileId>) -> Self {
        Self {
            file_id: file_id.into(),
        }
    }
}

/// Full file content together with its metadata.
#[derive(Debug, Clone)]
pub struct StoredFile {
    /// Concatenated content of all chunks.
    pub content: Vec<u8>,
    /// Metadata record.
    pub metadata: FileMetadata,
}

/// Metadata-only update payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct MetadataUpdate {
    /// New file name (without extension).
    #[validate(
        length(min = 1, max = 255, message = "filename must be 1-255 characters"),
        custom(function = "crate::web::dto::no_control_chars")
    )]
    pub filename: String,
}

impl MetadataUpdate {
    /// Create a new metadata update.
    pub fn new(filename: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
        }
    }
}

/// The two mutually exclusive update modes.
#[derive(Debug, Clone)]
pub enum FileUpdate {
    /// Rename only; content stays byte-for-byte unchanged.
    Metadata(MetadataUpdate),
    /// Replace content in place with a new chunk sequence.
    Content(Chunk),
}
