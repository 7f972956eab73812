//! Response DTOs for Web API.

use serde::Serialize;

/// `{"status": true}` acknowledgement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatusResponse {
    /// Always true on success.
    pub status: bool,
}

impl StatusResponse {
    /// Successful acknowledgement.
    pub fn ok() -> Self {
        Self { status: true }
    }
}
