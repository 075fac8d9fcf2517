//! Error taxonomy shared by storage backends and the shortener core.
//!
//! [`StorageError`] is what every [`crate::domain::repositories::StorageBackend`]
//! returns. [`ShortenerError`] wraps it for the core and adds input and
//! lifecycle failures. `AlreadyExists`, `NotFound` and `Deleted` are distinct
//! variants so callers can map them to different status codes.

use std::time::Duration;

use thiserror::Error;

/// Errors produced by storage backends.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The original URL is already mapped; carries the existing short code.
    #[error("original URL is already shortened as {short_code}")]
    AlreadyExists { short_code: String },

    /// The short code never existed.
    #[error("short code not found")]
    NotFound,

    /// The short code exists but was soft-deleted.
    #[error("short code has been deleted")]
    Deleted,

    /// A generated short code collided with an existing one.
    #[error("short code {0} is already taken")]
    ShortCodeTaken(String),

    #[error("storage operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("storage backend is closed")]
    Closed,

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("storage file I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed storage record: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("failed to apply migrations: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

impl StorageError {
    /// Returns the pre-existing short code for an [`StorageError::AlreadyExists`].
    pub fn existing_code(&self) -> Option<&str> {
        match self {
            StorageError::AlreadyExists { short_code } => Some(short_code),
            _ => None,
        }
    }
}

/// Errors returned by [`crate::application::services::ShortenerCore`].
#[derive(Debug, Error)]
pub enum ShortenerError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("original URL must not be empty")]
    EmptyUrl,

    #[error("batch must contain at least one URL")]
    EmptyBatch,

    /// The owner has no live shortenings.
    #[error("no shortenings found for user")]
    NoShortenings,

    /// The deletion pipeline has been shut down.
    #[error("deletion queue is closed")]
    QueueClosed,

    #[error("invalid IP address: {0}")]
    InvalidAddress(String),
}

impl ShortenerError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ShortenerError::Storage(StorageError::NotFound))
    }

    pub fn is_deleted(&self) -> bool {
        matches!(self, ShortenerError::Storage(StorageError::Deleted))
    }
}

/// Name of the unique index on `shortening.shortURL`.
pub const SHORT_CODE_INDEX: &str = "short_idx";

/// Classifies a SQLx error, turning unique violations on [`SHORT_CODE_INDEX`]
/// into [`StorageError::ShortCodeTaken`].
pub fn map_sqlx_error(e: sqlx::Error, short_code: &str) -> StorageError {
    let code_taken = e
        .as_database_error()
        .is_some_and(|db| db.is_unique_violation() && db.constraint() == Some(SHORT_CODE_INDEX));

    if code_taken {
        return StorageError::ShortCodeTaken(short_code.to_string());
    }

    StorageError::Database(e)
}
