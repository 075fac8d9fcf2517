//! Storage backend implementations.
//!
//! # Backends
//!
//! - [`PgStorage`] - PostgreSQL, transactional and durable
//! - [`FileStorage`] - Newline-delimited JSON file, durable
//! - [`MemoryStorage`] - Process memory only
//!
//! [`connect`] picks one from the configuration.

pub mod file_storage;
mod index;
pub mod memory_storage;
pub mod pg_storage;

pub use file_storage::FileStorage;
pub use memory_storage::MemoryStorage;
pub use pg_storage::PgStorage;

use std::sync::Arc;

use crate::config::{Config, StorageKind};
use crate::domain::repositories::StorageBackend;
use crate::error::StorageError;

/// Opens the backend selected by [`Config::storage_kind`].
///
/// # Errors
///
/// Propagates connection, migration and file replay failures; no fallback
/// to another backend is attempted.
pub async fn connect(config: &Config) -> Result<Arc<dyn StorageBackend>, StorageError> {
    let storage: Arc<dyn StorageBackend> = match config.storage_kind() {
        StorageKind::Postgres(url) => {
            tracing::info!("Storage backend: PostgreSQL");
            Arc::new(PgStorage::connect(&url, config).await?)
        }
        StorageKind::File(path) => {
            tracing::info!(path = %path.display(), "Storage backend: file");
            Arc::new(FileStorage::open(path).await?)
        }
        StorageKind::Memory => {
            tracing::info!("Storage backend: memory");
            Arc::new(MemoryStorage::new())
        }
    };

    Ok(storage)
}
