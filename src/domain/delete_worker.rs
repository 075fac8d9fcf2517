//! Background soft-delete pipeline.
//!
//! Producers push [`DeleteItem`]s into a bounded channel. A single worker
//! task owns the pending batch and a ticker; on every tick it hands the whole
//! batch to [`StorageBackend::delete_records`] once. Shutdown is a message on
//! the same channel, so everything enqueued before it is flushed.
//!
//! # States
//!
//! ```text
//! Idle --enqueue--> Accumulating --tick--> Flushing --> Idle
//!                        |
//!                        +--shutdown--> Flushing --> Terminated
//! ```
//!
//! A tick with an empty batch does not touch the backend. A failed flush is
//! logged and the batch dropped, unless [`RetryPolicy`] allows more attempts.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tokio_retry::Retry;
use tokio_retry::strategy::{ExponentialBackoff, jitter};

use crate::domain::entities::DeleteItem;
use crate::domain::repositories::StorageBackend;
use crate::error::ShortenerError;

const MAX_RETRY_DELAY: Duration = Duration::from_secs(10);

/// Messages accepted by the delete worker.
#[derive(Debug)]
pub enum DeleteCommand {
    Enqueue(DeleteItem),
    Shutdown,
}

/// How many extra times a failed flush is attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Additional attempts after the first failure. `0` drops the batch on
    /// the first error.
    pub attempts: usize,
    /// Delay before the first retry; doubles on each following one.
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub const NONE: RetryPolicy = RetryPolicy {
        attempts: 0,
        base_delay: Duration::from_millis(100),
    };

    /// Un-jittered delays: `base_delay`, `2 * base_delay`, ... capped at
    /// [`MAX_RETRY_DELAY`].
    fn delays(&self) -> impl Iterator<Item = Duration> + use<> {
        let base_ms = self.base_delay.as_millis().clamp(1, u64::MAX as u128) as u64;
        // ExponentialBackoff yields factor * 2^n starting at n = 1.
        ExponentialBackoff::from_millis(2)
            .factor(base_ms)
            .max_delay(MAX_RETRY_DELAY * 2)
            .map(|delay| delay / 2)
            .take(self.attempts)
    }

    fn strategy(&self) -> impl Iterator<Item = Duration> + use<> {
        self.delays().map(jitter)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::NONE
    }
}

/// Tuning for [`DeletionPipeline`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeleteWorkerConfig {
    pub queue_capacity: usize,
    pub flush_interval: Duration,
    pub retry: RetryPolicy,
}

impl Default for DeleteWorkerConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 1024,
            flush_interval: Duration::from_secs(1),
            retry: RetryPolicy::NONE,
        }
    }
}

/// Handle to the running delete worker.
pub struct DeletionPipeline {
    sender: mpsc::Sender<DeleteCommand>,
    closing: AtomicBool,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl DeletionPipeline {
    /// Spawns the worker task on the current Tokio runtime.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn spawn(storage: Arc<dyn StorageBackend>, config: DeleteWorkerConfig) -> Self {
        let (sender, receiver) = mpsc::channel(config.queue_capacity.max(1));

        let worker = tokio::spawn(run_delete_worker(
            receiver,
            storage,
            config.flush_interval,
            config.retry,
        ));
        tracing::debug!(
            capacity = config.queue_capacity,
            interval_ms = config.flush_interval.as_millis() as u64,
            "Delete worker started"
        );

        Self {
            sender,
            closing: AtomicBool::new(false),
            worker: Mutex::new(Some(worker)),
        }
    }

    /// Queues `item` for deletion.
    ///
    /// Waits for free capacity when the queue is full.
    ///
    /// # Errors
    ///
    /// Returns [`ShortenerError::QueueClosed`] once shutdown has started.
    pub async fn enqueue(&self, item: DeleteItem) -> Result<(), ShortenerError> {
        if self.closing.load(Ordering::Acquire) {
            return Err(ShortenerError::QueueClosed);
        }

        self.sender
            .send(DeleteCommand::Enqueue(item))
            .await
            .map_err(|_| ShortenerError::QueueClosed)
    }

    /// Returns true once shutdown has started.
    pub fn is_closed(&self) -> bool {
        self.closing.load(Ordering::Acquire) || self.sender.is_closed()
    }

    /// Stops accepting items, flushes what is pending and waits for the
    /// worker to exit. Concurrent and later calls return once the worker has
    /// exited.
    pub async fn shutdown(&self) {
        self.closing.store(true, Ordering::Release);

        let mut slot = self.worker.lock().await;
        let Some(worker) = slot.take() else {
            return;
        };

        if self.sender.send(DeleteCommand::Shutdown).await.is_err() {
            tracing::warn!("Delete worker exited before shutdown was requested");
        }

        if let Err(e) = worker.await {
            tracing::error!(error = %e, "Delete worker task failed");
        }
    }
}

/// Worker loop: accumulates items and flushes them on each tick and on
/// shutdown.
pub async fn run_delete_worker(
    mut rx: mpsc::Receiver<DeleteCommand>,
    storage: Arc<dyn StorageBackend>,
    flush_interval: Duration,
    retry: RetryPolicy,
) {
    let period = flush_interval.max(Duration::from_millis(1));
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut pending: Vec<DeleteItem> = Vec::new();

    loop {
        tokio::select! {
            command = rx.recv() => match command {
                Some(DeleteCommand::Enqueue(item)) => pending.push(item),
                Some(DeleteCommand::Shutdown) | None => break,
            },
            _ = ticker.tick() => {
                flush(storage.as_ref(), std::mem::take(&mut pending), retry).await;
            }
        }
    }

    // Pick up anything queued behind the shutdown message; closing the
    // receiver makes further sends fail instead of being silently lost.
    rx.close();
    while let Ok(command) = rx.try_recv() {
        if let DeleteCommand::Enqueue(item) = command {
            pending.push(item);
        }
    }

    flush(storage.as_ref(), pending, retry).await;
    tracing::info!("Delete worker stopped");
}

async fn flush(storage: &dyn StorageBackend, items: Vec<DeleteItem>, retry: RetryPolicy) {
    if items.is_empty() {
        return;
    }

    let batch: &[DeleteItem] = &items;
    let result = Retry::spawn(retry.strategy(), move || async move {
        let result = storage.delete_records(batch).await;
        if let Err(e) = &result {
            tracing::warn!(error = %e, batch_len = batch.len(), "Delete batch attempt failed");
        }
        result
    })
    .await;

    match result {
        Ok(()) => tracing::info!(batch_len = items.len(), "Deleted batch of shortenings"),
        Err(e) => tracing::error!(
            error = %e,
            batch_len = items.len(),
            "Can't delete records, dropping batch"
        ),
    }
}
