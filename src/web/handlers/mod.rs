//! API handlers for the file service.

pub mod file;

pub use file::*;

use std::sync::Arc;

use crate::config::{PaginationConfig, UploadConfig};
use crate::storage::FileStorageBackend;

/// Application state shared across handlers.
pub struct AppState {
    /// Storage backend selected at startup.
    pub backend: Arc<dyn FileStorageBackend>,
    /// Chunk upload limits.
    pub upload: UploadConfig,
    /// Listing pagination limits.
    pub pagination: PaginationConfig,
}

impl AppState {
    /// Create application state with default limits.
    pub fn new(backend: Arc<dyn FileStorageBackend>) -> Self {
        Self {
            backend,
            upload: UploadConfig::default(),
            pagination: PaginationConfig::default(),
        }
    }

    /// Set the upload configuration.
    pub fn with_upload_config(mut self, upload: UploadConfig) -> Self {
        self.upload = upload;
        self
    }

    /// Set the pagination configuration.
    pub fn with_pagination_config(mut self, pagination: PaginationConfig) -> Self {
        self.pagination = pagination;
        self
    }
}
