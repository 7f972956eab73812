//! Web API module for hybrid-storage.
//!
//! This module exposes the storage backend over HTTP: chunked multipart
//! uploads, downloads, paginated listings, renames and deletions.

pub mod dto;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod multipart;
pub mod router;
pub mod server;

pub use error::ApiError;
pub use router::{create_health_router, create_router};
pub use server::WebServer;
