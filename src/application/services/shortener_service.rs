//! Shortening orchestration service.

use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use ipnetwork::IpNetwork;
use tokio::sync::OnceCell;
use uuid::Uuid;

use crate::config::Config;
use crate::domain::delete_worker::DeletionPipeline;
use crate::domain::entities::{BatchElement, DeleteItem, NewShortening, ShorteningRecord, Stats};
use crate::domain::repositories::{Capabilities, StorageBackend};
use crate::error::{ShortenerError, StorageError};
use crate::utils::code_generator::generate_code;

/// Outcome of [`ShortenerCore::create_shortening`].
///
/// Both variants carry a usable public URL. `AlreadyExists` tells the
/// transport layer to answer with a conflict status instead of "created".
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Shortening {
    Created(String),
    AlreadyExists(String),
}

impl Shortening {
    pub fn short_url(&self) -> &str {
        match self {
            Shortening::Created(url) | Shortening::AlreadyExists(url) => url,
        }
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, Shortening::AlreadyExists(_))
    }
}

/// Entry point used by transport handlers.
///
/// Generates codes, turns backend dedup conflicts into [`Shortening::AlreadyExists`]
/// and owns the background [`DeletionPipeline`]. Backend errors other than
/// conflicts are returned as they are; nothing is retried here.
pub struct ShortenerCore {
    storage: Arc<dyn StorageBackend>,
    base_url: String,
    ping_timeout: Duration,
    trusted_subnet: Option<IpNetwork>,
    deletions: DeletionPipeline,
    closed: OnceCell<()>,
}

impl ShortenerCore {
    /// Creates the core and starts its delete worker.
    ///
    /// Must be called inside a Tokio runtime.
    pub fn new(storage: Arc<dyn StorageBackend>, config: &Config) -> Self {
        let deletions = DeletionPipeline::spawn(storage.clone(), config.delete_worker());

        Self {
            storage,
            base_url: config.base_url.clone(),
            ping_timeout: config.ping_timeout(),
            trusted_subnet: config.trusted_subnet,
            deletions,
            closed: OnceCell::new(),
        }
    }

    fn public_url(&self, short_code: &str) -> String {
        format!("{}{}", self.base_url, short_code)
    }

    /// Shortens `original_url` on behalf of `owner_id`.
    ///
    /// # Errors
    ///
    /// Returns [`ShortenerError::EmptyUrl`] for an empty URL and propagates
    /// every backend error except the dedup conflict.
    pub async fn create_shortening(
        &self,
        owner_id: Uuid,
        original_url: &str,
    ) -> Result<Shortening, ShortenerError> {
        if original_url.trim().is_empty() {
            return Err(ShortenerError::EmptyUrl);
        }

        let code = generate_code();
        match self.storage.insert(owner_id, &code, original_url).await {
            Ok(()) => {
                tracing::debug!(owner = %owner_id, code = %code, "Shortening created");
                Ok(Shortening::Created(self.public_url(&code)))
            }
            Err(StorageError::AlreadyExists { short_code }) => {
                tracing::debug!(owner = %owner_id, code = %short_code, "URL already shortened");
                Ok(Shortening::AlreadyExists(self.public_url(&short_code)))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Shortens every element of `batch` in one all-or-nothing insert.
    ///
    /// Returns the elements in input order with `short_url` filled in and
    /// `correlation_id` untouched.
    ///
    /// # Errors
    ///
    /// Returns [`ShortenerError::EmptyBatch`] or [`ShortenerError::EmptyUrl`]
    /// before touching storage. Any backend error, including a URL that is
    /// already stored, fails the whole batch.
    pub async fn create_shortening_batch(
        &self,
        owner_id: Uuid,
        mut batch: Vec<BatchElement>,
    ) -> Result<Vec<BatchElement>, ShortenerError> {
        if batch.is_empty() {
            return Err(ShortenerError::EmptyBatch);
        }
        if batch.iter().any(|e| e.original_url.trim().is_empty()) {
            return Err(ShortenerError::EmptyUrl);
        }

        let records: Vec<NewShortening> = batch
            .iter()
            .map(|element| NewShortening {
                short_code: generate_code(),
                original_url: element.original_url.clone(),
            })
            .collect();

        self.storage.insert_batch(owner_id, &records).await?;

        for (element, record) in batch.iter_mut().zip(&records) {
            element.short_url = self.public_url(&record.short_code);
        }

        tracing::debug!(owner = %owner_id, size = batch.len(), "Batch shortened");
        Ok(batch)
    }

    /// Resolves a short code to its original URL.
    ///
    /// Use [`ShortenerError::is_not_found`] and [`ShortenerError::is_deleted`]
    /// to tell the two failure cases apart.
    pub async fn get_full_string(&self, short_code: &str) -> Result<String, ShortenerError> {
        Ok(self.storage.select(short_code).await?)
    }

    /// Lists the owner's live shortenings with public short URLs.
    ///
    /// # Errors
    ///
    /// Returns [`ShortenerError::NoShortenings`] when the owner has none.
    pub async fn get_all_user_shortenings(
        &self,
        owner_id: Uuid,
    ) -> Result<Vec<ShorteningRecord>, ShortenerError> {
        let records = self.storage.select_user_all(owner_id).await?;
        if records.is_empty() {
            return Err(ShortenerError::NoShortenings);
        }

        Ok(records
            .into_iter()
            .map(|mut record| {
                record.short_code = self.public_url(&record.short_code);
                record
            })
            .collect())
    }

    /// Queues `short_codes` of `owner_id` for soft deletion and returns
    /// without waiting for the flush.
    ///
    /// Waits only when the queue is full.
    ///
    /// # Errors
    ///
    /// Returns [`ShortenerError::QueueClosed`] after [`Self::shutdown`].
    pub async fn register_to_delete(
        &self,
        owner_id: Uuid,
        short_codes: Vec<String>,
    ) -> Result<(), ShortenerError> {
        if short_codes.is_empty() {
            return Ok(());
        }

        self.deletions
            .enqueue(DeleteItem::new(owner_id, short_codes))
            .await
    }

    pub async fn stats(&self) -> Result<Stats, ShortenerError> {
        Ok(self.storage.stats().await?)
    }

    /// Checks storage liveness within the configured deadline.
    pub async fn ping(&self) -> Result<(), ShortenerError> {
        Ok(self.storage.ping(self.ping_timeout).await?)
    }

    /// Returns whether `ip` belongs to the configured trusted subnet.
    ///
    /// Always `false` when no subnet is configured.
    ///
    /// # Errors
    ///
    /// Returns [`ShortenerError::InvalidAddress`] if `ip` does not parse.
    pub fn is_trusted_subnet(&self, ip: &str) -> Result<bool, ShortenerError> {
        let Some(subnet) = self.trusted_subnet else {
            return Ok(false);
        };

        let addr: IpAddr = ip
            .trim()
            .parse()
            .map_err(|_| ShortenerError::InvalidAddress(ip.to_string()))?;

        Ok(subnet.contains(addr))
    }

    pub fn capabilities(&self) -> Capabilities {
        self.storage.capabilities()
    }

    /// Drains the delete queue, waits for the final flush, then closes the
    /// backend. Safe to call more than once, also concurrently: the backend
    /// is closed once and every call returns only after it is closed.
    pub async fn shutdown(&self) {
        self.deletions.shutdown().await;

        self.closed
            .get_or_init(|| async {
                self.storage.close().await;
                tracing::info!("Shortener core stopped");
            })
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::repositories::MockStorageBackend;
    use crate::utils::code_generator::CODE_LENGTH;

    fn test_config() -> Config {
        Config {
            base_url: "http://short.test/".to_string(),
            trusted_subnet: Some("192.168.1.0/24".parse().unwrap()),
            ..Config::default()
        }
    }

    fn core_with(mock: MockStorageBackend) -> ShortenerCore {
        ShortenerCore::new(Arc::new(mock), &test_config())
    }

    #[tokio::test]
    async fn test_create_shortening_returns_created_url() {
        let mut mock = MockStorageBackend::new();
        mock.expect_insert()
            .withf(|_, code, url| code.len() == CODE_LENGTH && url == "https://example.com")
            .times(1)
            .returning(|_, _, _| Ok(()));

        let core = core_with(mock);
        let result = core
            .create_shortening(Uuid::new_v4(), "https://example.com")
            .await
            .unwrap();

        assert!(!result.is_conflict());
        assert!(result.short_url().starts_with("http://short.test/"));
        assert_eq!(result.short_url().len(), "http://short.test/".len() + CODE_LENGTH);
    }

    #[tokio::test]
    async fn test_create_shortening_maps_conflict_to_existing_url() {
        let mut mock = MockStorageBackend::new();
        mock.expect_insert().times(1).returning(|_, _, _| {
            Err(StorageError::AlreadyExists {
                short_code: "existing".to_string(),
            })
        });

        let core = core_with(mock);
        let result = core
            .create_shortening(Uuid::new_v4(), "https://example.com")
            .await
            .unwrap();

        assert_eq!(
            result,
            Shortening::AlreadyExists("http://short.test/existing".to_string())
        );
    }

    #[tokio::test]
    async fn test_create_shortening_propagates_backend_errors() {
        let mut mock = MockStorageBackend::new();
        mock.expect_insert()
            .returning(|_, code, _| Err(StorageError::ShortCodeTaken(code.to_string())));

        let core = core_with(mock);
        let err = core
            .create_shortening(Uuid::new_v4(), "https://example.com")
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ShortenerError::Storage(StorageError::ShortCodeTaken(_))
        ));
    }

    #[tokio::test]
    async fn test_create_shortening_rejects_empty_url() {
        let mut mock = MockStorageBackend::new();
        mock.expect_insert().never();

        let core = core_with(mock);
        let err = core.create_shortening(Uuid::new_v4(), "  ").await.unwrap_err();

        assert!(matches!(err, ShortenerError::EmptyUrl));
    }

    #[tokio::test]
    async fn test_batch_fills_short_urls_in_order() {
        let mut mock = MockStorageBackend::new();
        mock.expect_insert_batch()
            .withf(|_, batch| batch.len() == 2)
            .times(1)
            .returning(|_, _| Ok(()));

        let core = core_with(mock);
        let batch = vec![
            BatchElement::new("a", "https://a.example"),
            BatchElement::new("b", "https://b.example"),
        ];

        let result = core
            .create_shortening_batch(Uuid::new_v4(), batch)
            .await
            .unwrap();

        assert_eq!(result[0].correlation_id, "a");
        assert_eq!(result[1].correlation_id, "b");
        assert_ne!(result[0].short_url, result[1].short_url);
        assert!(result.iter().all(|e| e.short_url.starts_with("http://short.test/")));
    }

    #[tokio::test]
    async fn test_batch_rejects_empty_input() {
        let mut mock = MockStorageBackend::new();
        mock.expect_insert_batch().never();

        let core = core_with(mock);

        assert!(matches!(
            core.create_shortening_batch(Uuid::new_v4(), vec![]).await,
            Err(ShortenerError::EmptyBatch)
        ));
        assert!(matches!(
            core.create_shortening_batch(Uuid::new_v4(), vec![BatchElement::new("1", "")])
                .await,
            Err(ShortenerError::EmptyUrl)
        ));
    }

    #[tokio::test]
    async fn test_batch_failure_fails_whole_batch() {
        let mut mock = MockStorageBackend::new();
        mock.expect_insert_batch().returning(|_, _| {
            Err(StorageError::AlreadyExists {
                short_code: "k1".to_string(),
            })
        });

        let core = core_with(mock);
        let err = core
            .create_shortening_batch(
                Uuid::new_v4(),
                vec![BatchElement::new("1", "https://a.example")],
            )
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ShortenerError::Storage(StorageError::AlreadyExists { .. })
        ));
    }

    #[tokio::test]
    async fn test_get_all_user_shortenings_empty_is_error() {
        let mut mock = MockStorageBackend::new();
        mock.expect_select_user_all().returning(|_| Ok(vec![]));

        let core = core_with(mock);
        let err = core
            .get_all_user_shortenings(Uuid::new_v4())
            .await
            .unwrap_err();

        assert!(matches!(err, ShortenerError::NoShortenings));
    }

    #[tokio::test]
    async fn test_get_all_user_shortenings_prefixes_base_url() {
        let owner = Uuid::new_v4();
        let mut mock = MockStorageBackend::new();
        mock.expect_select_user_all().returning(move |owner_id| {
            Ok(vec![ShorteningRecord::new(
                "abc".to_string(),
                "https://example.com".to_string(),
                owner_id,
            )])
        });

        let core = core_with(mock);
        let records = core.get_all_user_shortenings(owner).await.unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].short_code, "http://short.test/abc");
        assert_eq!(records[0].owner_id, owner);
    }

    #[tokio::test]
    async fn test_ping_uses_configured_deadline() {
        let mut mock = MockStorageBackend::new();
        mock.expect_ping()
            .withf(|deadline| *deadline == Duration::from_secs(30))
            .times(1)
            .returning(|_| Ok(()));

        let core = core_with(mock);
        core.ping().await.unwrap();
    }

    #[tokio::test]
    async fn test_is_trusted_subnet() {
        let core = core_with(MockStorageBackend::new());

        assert!(core.is_trusted_subnet("192.168.1.17").unwrap());
        assert!(!core.is_trusted_subnet("10.0.0.1").unwrap());
        assert!(matches!(
            core.is_trusted_subnet("not-an-ip"),
            Err(ShortenerError::InvalidAddress(_))
        ));
    }

    #[tokio::test]
    async fn test_is_trusted_subnet_without_config() {
        let core = ShortenerCore::new(Arc::new(MockStorageBackend::new()), &Config::default());
        assert!(!core.is_trusted_subnet("192.168.1.17").unwrap());
    }

    #[tokio::test]
    async fn test_shutdown_closes_storage_once() {
        let mut mock = MockStorageBackend::new();
        mock.expect_close().times(1).returning(|| ());

        let core = core_with(mock);
        core.shutdown().await;
        core.shutdown().await;

        assert!(matches!(
            core.register_to_delete(Uuid::new_v4(), vec!["abc".to_string()])
                .await,
            Err(ShortenerError::QueueClosed)
        ));
    }

    #[tokio::test]
    async fn test_concurrent_shutdowns_both_wait_for_close() {
        let closed = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let flag = closed.clone();

        let mut mock = MockStorageBackend::new();
        mock.expect_close()
            .times(1)
            .returning(move || flag.store(true, std::sync::atomic::Ordering::SeqCst));

        let core = core_with(mock);
        let first = async {
            core.shutdown().await;
            assert!(closed.load(std::sync::atomic::Ordering::SeqCst));
        };
        let second = async {
            core.shutdown().await;
            assert!(closed.load(std::sync::atomic::Ordering::SeqCst));
        };
        tokio::join!(first, second);
    }
}
