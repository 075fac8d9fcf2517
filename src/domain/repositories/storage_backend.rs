//! Storage contract for shortening records.

use std::time::Duration;

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::entities::{DeleteItem, NewShortening, ShorteningRecord, Stats};
use crate::error::StorageError;

/// What a backend guarantees beyond the common contract.
///
/// Every backend enforces original-URL deduplication and soft deletion.
/// They differ in how far those guarantees reach.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    /// Dedup and batch atomicity hold across processes sharing the store
    /// (database transactions). When false they hold only within this process.
    pub transactional: bool,
    /// Records survive a restart.
    pub durable: bool,
}

/// Persistence abstraction implemented by the memory, file and PostgreSQL
/// backends.
///
/// Implementations must be safe to share across tasks; the core adds no
/// locking of its own.
///
/// # Implementations
///
/// - [`crate::infrastructure::persistence::MemoryStorage`]
/// - [`crate::infrastructure::persistence::FileStorage`]
/// - [`crate::infrastructure::persistence::PgStorage`]
/// - Test mocks available with `cfg(test)`
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StorageBackend: Send + Sync {
    fn capabilities(&self) -> Capabilities;

    /// Creates a record for `original_url` under `short_code`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::AlreadyExists`] carrying the existing code if
    /// `original_url` is already stored; nothing is written in that case.
    /// Returns [`StorageError::ShortCodeTaken`] if `short_code` is in use.
    async fn insert(
        &self,
        owner_id: Uuid,
        short_code: &str,
        original_url: &str,
    ) -> Result<(), StorageError>;

    /// Inserts all records or none.
    ///
    /// # Errors
    ///
    /// Any conflict (including two elements with the same URL) aborts the
    /// whole batch with the same errors as [`StorageBackend::insert`].
    async fn insert_batch(
        &self,
        owner_id: Uuid,
        batch: &[NewShortening],
    ) -> Result<(), StorageError>;

    /// Resolves a short code to its original URL.
    ///
    /// # Errors
    ///
    /// - [`StorageError::NotFound`] if the code never existed
    /// - [`StorageError::Deleted`] if the record was soft-deleted
    async fn select(&self, short_code: &str) -> Result<String, StorageError>;

    /// Returns the owner's live records; empty when there are none.
    async fn select_user_all(
        &self,
        owner_id: Uuid,
    ) -> Result<Vec<ShorteningRecord>, StorageError>;

    /// Marks every referenced `(owner, code)` pair as deleted.
    ///
    /// Idempotent. Pairs with an unknown code or a different owner are
    /// ignored.
    async fn delete_records(&self, items: &[DeleteItem]) -> Result<(), StorageError>;

    async fn stats(&self) -> Result<Stats, StorageError>;

    /// Liveness check bounded by `deadline`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Timeout`] if the check does not finish in time.
    async fn ping(&self, deadline: Duration) -> Result<(), StorageError>;

    /// Releases held resources. Called once, after in-flight writes finish.
    async fn close(&self);
}
