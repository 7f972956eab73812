//! hybrid-storage - chunked file storage service.
//!
//! Files are uploaded as a sequence of multipart chunks and stored by one of
//! several interchangeable backends (a directory tree, SQLite/PostgreSQL, or
//! MongoDB) behind the [`storage::FileStorageBackend`] trait.

pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod storage;
pub mod web;

pub use config::{BackendKind, Config};
pub use error::{Error, ErrorKind, Result};
pub use storage::{open_backend, FileStorageBackend};
pub use web::WebServer;
