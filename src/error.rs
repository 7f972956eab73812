//! Error types for hybrid-storage.

use thiserror::Error;

/// Classification of an [`Error`], shared by every storage backend.
///
/// The web layer maps each kind onto exactly one HTTP status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed chunk metadata or oversized body.
    BadRequest,
    /// Unparseable chunk ordinal.
    UnprocessableEntity,
    /// Missing file content or metadata.
    NotFound,
    /// Duplicate chunk ordinal where uniqueness is enforced.
    Conflict,
    /// Storage engine or I/O failure.
    Internal,
}

impl ErrorKind {
    /// HTTP status code for this kind.
    pub fn status_code(&self) -> u16 {
        match self {
            ErrorKind::BadRequest => 400,
            ErrorKind::UnprocessableEntity => 422,
            ErrorKind::NotFound => 404,
            ErrorKind::Conflict => 409,
            ErrorKind::Internal => 500,
        }
    }
}

/// Common error type for hybrid-storage.
#[derive(Error, Debug)]
pub enum Error {
    /// The request carried malformed chunk data.
    #[error("{0}")]
    BadRequest(String),

    /// The chunk ordinal could not be parsed.
    #[error("{0}")]
    UnprocessableEntity(String),

    /// File content or metadata does not exist.
    #[error("{0}")]
    NotFound(String),

    /// A chunk with the same ordinal was already stored.
    #[error("{0}")]
    Conflict(String),

    /// Generic backend failure.
    #[error("{0}")]
    Internal(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Relational database error.
    ///
    /// Errors from sqlx are converted automatically; unique violations
    /// become [`Error::Conflict`] instead.
    #[error("database error: {0}")]
    Database(String),

    /// Document store error.
    #[error("document store error: {0}")]
    DocumentStore(String),

    /// Metadata (de)serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Create a not found error for a file identifier.
    pub fn file_not_found(file_id: &str) -> Self {
        Error::NotFound(format!("file not found: {file_id}"))
    }

    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::BadRequest(_) => ErrorKind::BadRequest,
            Error::UnprocessableEntity(_) => ErrorKind::UnprocessableEntity,
            Error::NotFound(_) => ErrorKind::NotFound,
            Error::Conflict(_) => ErrorKind::Conflict,
            Error::Internal(_)
            | Error::Io(_)
            | Error::Database(_)
            | Error::DocumentStore(_)
            | Error::Serialization(_)
            | Error::Config(_) => ErrorKind::Internal,
        }
    }

    /// HTTP status code carried by this error.
    pub fn status_code(&self) -> u16 {
        self.kind().status_code()
    }

    /// Human-readable detail reported back to the client.
    pub fn detail(&self) -> String {
        self.to_string()
    }
}

impl From<sqlx::Error> for Error {
    fn from(e: sqlx::Error) -> Self {
        match &e {
            sqlx::Error::RowNotFound => Error::NotFound("object not found".to_string()),
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                Error::Conflict(format!("duplicate entry: {}", db_err.message()))
            }
            _ => Error::Database(e.to_string()),
        }
    }
}

impl From<mongodb::error::Error> for Error {
    fn from(e: mongodb::error::Error) -> Self {
        if is_duplicate_key(&e) {
            return Error::Conflict(format!("duplicate entry: {e}"));
        }
        Error::DocumentStore(e.to_string())
    }
}

/// MongoDB reports duplicate keys with server error code 11000.
fn is_duplicate_key(e: &mongodb::error::Error) -> bool {
    use mongodb::error::{ErrorKind as MongoKind, WriteFailure};

    match e.kind.as_ref() {
        MongoKind::Write(WriteFailure::WriteError(write_error)) => write_error.code == 11000,
        MongoKind::Command(command_error) => command_error.code == 11000,
        _ => false,
    }
}

/// Result type alias for hybrid-storage operations.
pub type Result<T> = std::result::Result<T, Error>;
