//! PostgreSQL storage backend.

use async_trait::async_trait;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::config::Config;
use crate::domain::entities::{DeleteItem, NewShortening, ShorteningRecord, Stats};
use crate::domain::repositories::{Capabilities, StorageBackend};
use crate::error::{StorageError, map_sqlx_error};

/// Upsert that leaves an existing row untouched and reports its short code.
///
/// If the returned code differs from the one submitted, the URL was already
/// stored and the caller rolls the transaction back.
const INSERT_SHORTENING: &str = r#"
    INSERT INTO shortening (originalURL, shortURL, userUUID)
    VALUES ($1, $2, $3)
    ON CONFLICT (originalURL)
    DO UPDATE SET originalURL = shortening.originalURL
    RETURNING shortURL
"#;

/// PostgreSQL backend for shortening records.
///
/// Deduplication and batch atomicity rely on the `UNIQUE (originalURL)`
/// constraint and transactions, so they hold across service instances.
pub struct PgStorage {
    pool: Arc<PgPool>,
}

impl PgStorage {
    /// Creates a backend over an existing pool. Migrations are not run.
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    /// Opens a pool with the configured limits and applies migrations.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Database`] if the connection fails and
    /// [`StorageError::Migration`] if the schema cannot be brought up to date.
    pub async fn connect(database_url: &str, config: &Config) -> Result<Self, StorageError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.db_max_connections)
            .acquire_timeout(Duration::from_secs(config.db_connect_timeout))
            .idle_timeout(Duration::from_secs(config.db_idle_timeout))
            .max_lifetime(Duration::from_secs(config.db_max_lifetime))
            .connect(database_url)
            .await?;
        tracing::info!("Connected to database");

        sqlx::migrate!("./migrations").run(&pool).await?;
        tracing::info!("Database migrations applied");

        Ok(Self::new(Arc::new(pool)))
    }

    pub fn pool(&self) -> &PgPool {
        self.pool.as_ref()
    }
}

#[async_trait]
impl StorageBackend for PgStorage {
    fn capabilities(&self) -> Capabilities {
        Capabilities {
            transactional: true,
            durable: true,
        }
    }

    async fn insert(
        &self,
        owner_id: Uuid,
        short_code: &str,
        original_url: &str,
    ) -> Result<(), StorageError> {
        let mut tx = self.pool.begin().await?;

        let stored: String = sqlx::query_scalar(INSERT_SHORTENING)
            .bind(original_url)
            .bind(short_code)
            .bind(owner_id)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error(e, short_code))?;

        if stored != short_code {
            tx.rollback().await?;
            return Err(StorageError::AlreadyExists { short_code: stored });
        }

        tx.commit().await?;
        Ok(())
    }

    async fn insert_batch(
        &self,
        owner_id: Uuid,
        batch: &[NewShortening],
    ) -> Result<(), StorageError> {
        let mut tx = self.pool.begin().await?;

        for item in batch {
            let stored: String = sqlx::query_scalar(INSERT_SHORTENING)
                .bind(&item.original_url)
                .bind(&item.short_code)
                .bind(owner_id)
                .fetch_one(&mut *tx)
                .await
                .map_err(|e| map_sqlx_error(e, &item.short_code))?;

            if stored != item.short_code {
                tx.rollback().await?;
                return Err(StorageError::AlreadyExists { short_code: stored });
            }
        }

        tx.commit().await?;
        tracing::debug!(rows = batch.len(), "Batch inserted");
        Ok(())
    }

    async fn select(&self, short_code: &str) -> Result<String, StorageError> {
        let row: Option<(String, Option<bool>)> =
            sqlx::query_as("SELECT originalURL, is_deleted FROM shortening WHERE shortURL = $1")
                .bind(short_code)
                .fetch_optional(self.pool.as_ref())
                .await?;

        match row {
            None => Err(StorageError::NotFound),
            Some((_, Some(true))) => Err(StorageError::Deleted),
            Some((original_url, _)) => Ok(original_url),
        }
    }

    async fn select_user_all(
        &self,
        owner_id: Uuid,
    ) -> Result<Vec<ShorteningRecord>, StorageError> {
        let rows: Vec<(String, String)> = sqlx::query_as(
            r#"
            SELECT shortURL, originalURL
            FROM shortening
            WHERE userUUID = $1 AND NOT COALESCE(is_deleted, false)
            "#,
        )
        .bind(owner_id)
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(rows
            .into_iter()
            .map(|(short_code, original_url)| {
                ShorteningRecord::new(short_code, original_url, owner_id)
            })
            .collect())
    }

    async fn delete_records(&self, items: &[DeleteItem]) -> Result<(), StorageError> {
        let (owners, codes): (Vec<Uuid>, Vec<String>) = items
            .iter()
            .flat_map(|item| item.pairs())
            .map(|(owner, code)| (owner, code.to_string()))
            .unzip();

        if codes.is_empty() {
            return Ok(());
        }

        let result = sqlx::query(
            r#"
            UPDATE shortening
            SET is_deleted = true
            FROM UNNEST($1::uuid[], $2::text[]) AS data(owner_id, short_url)
            WHERE shortening.userUUID = data.owner_id
              AND shortening.shortURL = data.short_url
            "#,
        )
        .bind(&owners)
        .bind(&codes)
        .execute(self.pool.as_ref())
        .await?;

        tracing::debug!(
            requested = codes.len(),
            rows = result.rows_affected(),
            "Marked shortenings as deleted"
        );
        Ok(())
    }

    async fn stats(&self) -> Result<Stats, StorageError> {
        let (urls, users): (i64, i64) = sqlx::query_as(
            r#"
            SELECT COUNT(*), COUNT(DISTINCT userUUID)
            FROM shortening
            WHERE NOT COALESCE(is_deleted, false)
            "#,
        )
        .fetch_one(self.pool.as_ref())
        .await?;

        Ok(Stats {
            urls: urls.max(0) as u64,
            users: users.max(0) as u64,
        })
    }

    async fn ping(&self, deadline: Duration) -> Result<(), StorageError> {
        tokio::time::timeout(deadline, sqlx::query("SELECT 1").execute(self.pool.as_ref()))
            .await
            .map_err(|_| StorageError::Timeout(deadline))??;
        Ok(())
    }

    async fn close(&self) {
        self.pool.close().await;
        tracing::info!("Database pool closed");
    }
}
