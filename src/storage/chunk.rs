//! Chunk assembly for multi-part uploads.
//!
//! A client uploads one logical file as a sequence of multipart requests.
//! Each request carries one chunk plus the form fields `chunkNumber`,
//! `totalChunks`, `filename` and (after the first chunk) `fileId`. The
//! assembler turns those raw values into a normalized [`Chunk`] that any
//! backend can persist.
//!
//! Ordering is the client's responsibility: chunks are appended in the
//! order they arrive and are never buffered or reordered here.

use tracing::debug;

use super::types::{FileId, FileMetadata};
use crate::{Error, Result};

/// Raw multipart values for one chunk request.
#[derive(Debug, Clone, Default)]
pub struct ChunkForm {
    /// Bytes of the `file` part, if present.
    pub file: Option<Vec<u8>>,
    /// `chunkNumber` field.
    pub chunk_number: Option<String>,
    /// `totalChunks` field.
    pub total_chunks: Option<String>,
    /// `filename` field (may include a path).
    pub filename: Option<String>,
    /// `fileId` field; only meaningful after the first chunk.
    pub file_id: Option<String>,
}

/// One normalized chunk, ready to be persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// File this chunk belongs to. Empty only when a continuation chunk
    /// arrived without a `fileId`; backends reject that.
    pub file_id: FileId,
    /// 1-based ordinal declared by the client.
    pub ordinal: u32,
    /// Total chunk count declared by the client, verbatim.
    pub total_count: String,
    /// Raw bytes of this chunk.
    pub data: Vec<u8>,
    /// Whether the client declared this to be the final chunk.
    pub is_last: bool,
    /// Metadata derived from the form; only used for ordinal 1.
    pub metadata: FileMetadata,
}

impl Chunk {
    /// Whether this chunk starts a new logical file.
    pub fn is_first(&self) -> bool {
        self.ordinal == 1
    }

    /// File identifier of a continuation chunk.
    ///
    /// Continuation chunks must name the file they extend.
    pub fn continuation_id(&self) -> Result<&str> {
        if self.file_id.trim().is_empty() {
            return Err(Error::BadRequest(format!(
                "fileId is required for chunk {}",
                self.ordinal
            )));
        }
        Ok(&self.file_id)
    }
}

/// Builds [`Chunk`]s from raw form values.
pub struct ChunkAssembler;

impl ChunkAssembler {
    /// Assemble one chunk.
    ///
    /// `generated_id` becomes the file identifier when this is the first
    /// chunk; later chunks take the identifier from the form instead.
    pub fn assemble(form: ChunkForm, generated_id: &str, now: i64) -> Result<Chunk> {
        let data = form
            .file
            .ok_or_else(|| Error::BadRequest("error reading file".to_string()))?;
        let ordinal = parse_ordinal(form.chunk_number.as_deref())?;

        let file_id = if ordinal > 1 {
            form.file_id.unwrap_or_default().trim().to_string()
        } else {
            generated_id.to_string()
        };

        let is_last = match (&form.chunk_number, &form.total_chunks) {
            (Some(number), Some(total)) => number.trim() == total.trim(),
            _ => false,
        };

        let (filename, extension) = split_filename(form.filename.as_deref().unwrap_or(""));
        let total_count = form.total_chunks.unwrap_or_default();

        debug!(
            file_id = %file_id,
            chunk = ordinal,
            total = %total_count,
            bytes = data.len(),
            "Assembled chunk"
        );

        Ok(Chunk {
            metadata: FileMetadata::new(file_id.clone(), filename, extension, now),
            file_id,
            ordinal,
            total_count,
            data,
            is_last,
        })
    }
}

/// Parse a client-declared ordinal as a positive integer.
fn parse_ordinal(value: Option<&str>) -> Result<u32> {
    value
        .and_then(|v| v.trim().parse::<u32>().ok())
        .filter(|n| *n >= 1)
        .ok_or_else(|| Error::UnprocessableEntity("expected int for chunk number".to_string()))
}

/// Split a client filename into base name and extension.
///
/// The base name is whatever follows the last `/` or `\`; the extension is
/// the suffix starting at the last dot of the base name, so a dotfile such
/// as `.bashrc` is all extension.
pub fn split_filename(raw: &str) -> (String, String) {
    let base = raw.rsplit(['/', '\\']).next().unwrap_or("");

    match base.rfind('.') {
        Some(idx) => (base[..idx].to_string(), base[idx..].to_string()),
        None => (base.to_string(), String::new()),
    }
}
