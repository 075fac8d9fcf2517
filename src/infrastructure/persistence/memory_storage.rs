//! In-memory storage backend.

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::entities::{DeleteItem, NewShortening, ShorteningRecord, Stats};
use crate::domain::repositories::{Capabilities, StorageBackend};
use crate::error::StorageError;
use crate::infrastructure::persistence::index::ShorteningIndex;

/// Volatile backend keeping all records in a single locked index.
///
/// Dedup and batch atomicity hold within this process; nothing survives a
/// restart.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    index: RwLock<ShorteningIndex>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StorageBackend for MemoryStorage {
    fn capabilities(&self) -> Capabilities {
        Capabilities {
            transactional: false,
            durable: false,
        }
    }

    async fn insert(
        &self,
        owner_id: Uuid,
        short_code: &str,
        original_url: &str,
    ) -> Result<(), StorageError> {
        let mut index = self.index.write().await;
        index.check_insert(short_code, original_url)?;
        index.apply(ShorteningRecord::new(
            short_code.to_string(),
            original_url.to_string(),
            owner_id,
        ));
        Ok(())
    }

    async fn insert_batch(
        &self,
        owner_id: Uuid,
        batch: &[NewShortening],
    ) -> Result<(), StorageError> {
        let mut index = self.index.write().await;
        index.check_batch(batch)?;
        for item in batch {
            index.apply(ShorteningRecord::new(
                item.short_code.clone(),
                item.original_url.clone(),
                owner_id,
            ));
        }
        Ok(())
    }

    async fn select(&self, short_code: &str) -> Result<String, StorageError> {
        self.index.read().await.select(short_code)
    }

    async fn select_user_all(
        &self,
        owner_id: Uuid,
    ) -> Result<Vec<ShorteningRecord>, StorageError> {
        Ok(self.index.read().await.select_user_all(owner_id))
    }

    async fn delete_records(&self, items: &[DeleteItem]) -> Result<(), StorageError> {
        let mut index = self.index.write().await;
        let deleted = index.pending_deletions(items);
        index.mark_deleted(deleted.iter().map(|r| r.short_code.as_str()));
        tracing::debug!(rows = deleted.len(), "Marked shortenings as deleted");
        Ok(())
    }

    async fn stats(&self) -> Result<Stats, StorageError> {
        Ok(self.index.read().await.stats())
    }

    async fn ping(&self, _deadline: Duration) -> Result<(), StorageError> {
        Ok(())
    }

    async fn close(&self) {}
}
