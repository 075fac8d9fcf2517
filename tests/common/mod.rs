#![allow(dead_code)]

use async_trait::async_trait;
use shortener_core::config::Config;
use shortener_core::domain::entities::{DeleteItem, NewShortening, ShorteningRecord, Stats};
use shortener_core::domain::repositories::{Capabilities, StorageBackend};
use shortener_core::error::StorageError;
use shortener_core::infrastructure::persistence::MemoryStorage;
use sqlx::PgPool;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use uuid::Uuid;

pub const BASE_URL: &str = "http://short.test/";

/// Config with a flush interval long enough that only shutdown flushes.
pub fn test_config() -> Config {
    Config {
        base_url: BASE_URL.to_string(),
        delete_flush_interval_ms: 3_600_000,
        ..Config::default()
    }
}

pub fn fast_flush_config(interval_ms: u64) -> Config {
    Config {
        delete_flush_interval_ms: interval_ms,
        ..test_config()
    }
}

/// Strips [`BASE_URL`] from a public short URL.
pub fn code_of(short_url: &str) -> String {
    short_url
        .strip_prefix(BASE_URL)
        .unwrap_or(short_url)
        .to_string()
}

pub async fn insert_shortening(pool: &PgPool, code: &str, url: &str, owner: Uuid) {
    sqlx::query("INSERT INTO shortening (shortURL, originalURL, userUUID) VALUES ($1, $2, $3)")
        .bind(code)
        .bind(url)
        .bind(owner)
        .execute(pool)
        .await
        .unwrap();
}

pub async fn count_rows_for_url(pool: &PgPool, url: &str) -> i64 {
    sqlx::query_scalar("SELECT COUNT(*) FROM shortening WHERE originalURL = $1")
        .bind(url)
        .fetch_one(pool)
        .await
        .unwrap()
}

pub async fn is_deleted(pool: &PgPool, code: &str) -> bool {
    sqlx::query_scalar::<_, Option<bool>>("SELECT is_deleted FROM shortening WHERE shortURL = $1")
        .bind(code)
        .fetch_one(pool)
        .await
        .unwrap()
        .unwrap_or(false)
}

/// Memory backend that records every batch handed to `delete_records`.
#[derive(Default)]
pub struct RecordingStorage {
    inner: MemoryStorage,
    pub delete_calls: Mutex<Vec<Vec<DeleteItem>>>,
    pub closed: Mutex<bool>,
}

impl RecordingStorage {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn delete_calls(&self) -> Vec<Vec<DeleteItem>> {
        self.delete_calls.lock().unwrap().clone()
    }

    pub fn is_closed(&self) -> bool {
        *self.closed.lock().unwrap()
    }
}

#[async_trait]
impl StorageBackend for RecordingStorage {
    fn capabilities(&self) -> Capabilities {
        self.inner.capabilities()
    }

    async fn insert(
        &self,
        owner_id: Uuid,
        short_code: &str,
        original_url: &str,
    ) -> Result<(), StorageError> {
        self.inner.insert(owner_id, short_code, original_url).await
    }

    async fn insert_batch(
        &self,
        owner_id: Uuid,
        batch: &[NewShortening],
    ) -> Result<(), StorageError> {
        self.inner.insert_batch(owner_id, batch).await
    }

    async fn select(&self, short_code: &str) -> Result<String, StorageError> {
        self.inner.select(short_code).await
    }

    async fn select_user_all(
        &self,
        owner_id: Uuid,
    ) -> Result<Vec<ShorteningRecord>, StorageError> {
        self.inner.select_user_all(owner_id).await
    }

    async fn delete_records(&self, items: &[DeleteItem]) -> Result<(), StorageError> {
        self.delete_calls.lock().unwrap().push(items.to_vec());
        self.inner.delete_records(items).await
    }

    async fn stats(&self) -> Result<Stats, StorageError> {
        self.inner.stats().await
    }

    async fn ping(&self, deadline: Duration) -> Result<(), StorageError> {
        self.inner.ping(deadline).await
    }

    async fn close(&self) {
        *self.closed.lock().unwrap() = true;
        self.inner.close().await;
    }
}
