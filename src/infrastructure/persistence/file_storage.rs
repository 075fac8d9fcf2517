//! Newline-delimited JSON file backend.
//!
//! Each line is one record:
//!
//! ```json
//! {"uuid":"…","short_url":"abc","original_url":"https://example.com"}
//! ```
//!
//! Deletions append a tombstone line for the same code with
//! `"is_deleted": true`. On open the file is replayed in order, so the last
//! line for a code wins. The file is only ever appended to.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::domain::entities::{DeleteItem, NewShortening, ShorteningRecord, Stats};
use crate::domain::repositories::{Capabilities, StorageBackend};
use crate::error::StorageError;
use crate::infrastructure::persistence::index::ShorteningIndex;

#[derive(Debug, Serialize, Deserialize)]
struct FileRecord {
    uuid: Uuid,
    short_url: String,
    original_url: String,
    #[serde(default, skip_serializing_if = "is_false")]
    is_deleted: bool,
}

fn is_false(value: &bool) -> bool {
    !*value
}

impl From<&ShorteningRecord> for FileRecord {
    fn from(record: &ShorteningRecord) -> Self {
        Self {
            uuid: record.owner_id,
            short_url: record.short_code.clone(),
            original_url: record.original_url.clone(),
            is_deleted: record.deleted,
        }
    }
}

impl From<FileRecord> for ShorteningRecord {
    fn from(line: FileRecord) -> Self {
        Self {
            short_code: line.short_url,
            original_url: line.original_url,
            owner_id: line.uuid,
            deleted: line.is_deleted,
        }
    }
}

#[derive(Debug)]
struct FileState {
    index: ShorteningIndex,
    /// `None` once the backend has been closed.
    file: Option<File>,
    /// The last line on disk has no terminating newline yet.
    unterminated: bool,
}

/// Durable backend appending records to a local file.
///
/// All operations serialize on one mutex; lines are written before the
/// in-memory index is updated, so a failed write leaves the index untouched.
#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
    state: Mutex<FileState>,
}

impl FileStorage {
    /// Opens (creating if needed) the file at `path` and replays its records.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Io`] if the file cannot be opened or read and
    /// [`StorageError::Serialization`] if a non-empty line is not a record.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&path)
            .await?;

        let mut index = ShorteningIndex::new();
        let mut reader = BufReader::new(file.try_clone().await?);
        let mut line = Vec::new();
        let mut replayed = 0usize;
        let mut unterminated = false;

        loop {
            line.clear();
            if reader.read_until(b'\n', &mut line).await? == 0 {
                break;
            }
            unterminated = line.last() != Some(&b'\n');

            if line.iter().all(u8::is_ascii_whitespace) {
                continue;
            }
            let record: ShorteningRecord = serde_json::from_slice::<FileRecord>(&line)?.into();
            if record.deleted {
                index.mark_deleted([record.short_code.as_str()]);
            } else {
                index.apply(record);
            }
            replayed += 1;
        }

        tracing::info!(
            path = %path.display(),
            lines = replayed,
            records = index.len(),
            "File storage loaded"
        );

        Ok(Self {
            path,
            state: Mutex::new(FileState {
                index,
                file: Some(file),
                unterminated,
            }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Appends `records` as whole lines.
///
/// Starts on a fresh line if the file does not end with a newline. A failed
/// write is truncated back to the previous length so no partial line stays
/// behind.
async fn append_lines(state: &mut FileState, records: &[FileRecord]) -> Result<(), StorageError> {
    let file = state.file.as_mut().ok_or(StorageError::Closed)?;

    let mut buf = Vec::new();
    if state.unterminated {
        buf.push(b'\n');
    }
    for record in records {
        serde_json::to_writer(&mut buf, record)?;
        buf.push(b'\n');
    }

    let len = file.metadata().await?.len();
    let written = match file.write_all(&buf).await {
        Ok(()) => file.flush().await,
        Err(e) => Err(e),
    };

    if let Err(e) = written {
        if let Err(truncate_err) = file.set_len(len).await {
            tracing::error!("Failed to roll back partial write: {}", truncate_err);
            state.unterminated = true;
        }
        return Err(e.into());
    }

    state.unterminated = false;
    Ok(())
}

#[async_trait]
impl StorageBackend for FileStorage {
    fn capabilities(&self) -> Capabilities {
        Capabilities {
            transactional: false,
            durable: true,
        }
    }

    async fn insert(
        &self,
        owner_id: Uuid,
        short_code: &str,
        original_url: &str,
    ) -> Result<(), StorageError> {
        let mut state = self.state.lock().await;
        state.index.check_insert(short_code, original_url)?;

        let record = ShorteningRecord::new(
            short_code.to_string(),
            original_url.to_string(),
            owner_id,
        );
        append_lines(&mut state, &[FileRecord::from(&record)]).await?;
        state.index.apply(record);
        Ok(())
    }

    async fn insert_batch(
        &self,
        owner_id: Uuid,
        batch: &[NewShortening],
    ) -> Result<(), StorageError> {
        let mut state = self.state.lock().await;
        state.index.check_batch(batch)?;

        let records: Vec<ShorteningRecord> = batch
            .iter()
            .map(|item| {
                ShorteningRecord::new(item.short_code.clone(), item.original_url.clone(), owner_id)
            })
            .collect();
        let lines: Vec<FileRecord> = records.iter().map(FileRecord::from).collect();

        append_lines(&mut state, &lines).await?;
        for record in records {
            state.index.apply(record);
        }
        Ok(())
    }

    async fn select(&self, short_code: &str) -> Result<String, StorageError> {
        self.state.lock().await.index.select(short_code)
    }

    async fn select_user_all(
        &self,
        owner_id: Uuid,
    ) -> Result<Vec<ShorteningRecord>, StorageError> {
        Ok(self.state.lock().await.index.select_user_all(owner_id))
    }

    async fn delete_records(&self, items: &[DeleteItem]) -> Result<(), StorageError> {
        let mut state = self.state.lock().await;

        let mut tombstones = state.index.pending_deletions(items);
        if tombstones.is_empty() {
            return Ok(());
        }
        for record in &mut tombstones {
            record.deleted = true;
        }

        let lines: Vec<FileRecord> = tombstones.iter().map(FileRecord::from).collect();
        append_lines(&mut state, &lines).await?;
        state
            .index
            .mark_deleted(tombstones.iter().map(|r| r.short_code.as_str()));

        tracing::debug!(rows = tombstones.len(), "Appended deletion tombstones");
        Ok(())
    }

    async fn stats(&self) -> Result<Stats, StorageError> {
        Ok(self.state.lock().await.index.stats())
    }

    async fn ping(&self, deadline: Duration) -> Result<(), StorageError> {
        let state = tokio::time::timeout(deadline, self.state.lock())
            .await
            .map_err(|_| StorageError::Timeout(deadline))?;

        if state.file.is_none() {
            return Err(StorageError::Closed);
        }
        Ok(())
    }

    async fn close(&self) {
        let mut state = self.state.lock().await;
        if let Some(mut file) = state.file.take() {
            if let Err(e) = file.sync_all().await {
                tracing::error!(path = %self.path.display(), "Failed to sync storage file: {}", e);
            }
            tracing::info!(path = %self.path.display(), "File storage closed");
        }
    }
}
