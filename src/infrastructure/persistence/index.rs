//! In-process shortening index shared by the memory and file backends.
//!
//! Holds the same invariants as the database schema: short codes and
//! original URLs are each unique, and soft deletion is one-way. Callers hold
//! a lock around check-then-apply sequences.

use std::collections::{HashMap, HashSet};

use uuid::Uuid;

use crate::domain::entities::{DeleteItem, NewShortening, ShorteningRecord, Stats};
use crate::error::StorageError;

#[derive(Debug, Default)]
pub(crate) struct ShorteningIndex {
    by_code: HashMap<String, ShorteningRecord>,
    /// original URL -> short code
    by_url: HashMap<String, String>,
}

impl ShorteningIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Checks that a record can be inserted without breaking uniqueness.
    pub fn check_insert(&self, short_code: &str, original_url: &str) -> Result<(), StorageError> {
        if let Some(existing) = self.by_url.get(original_url) {
            return Err(StorageError::AlreadyExists {
                short_code: existing.clone(),
            });
        }

        if self.by_code.contains_key(short_code) {
            return Err(StorageError::ShortCodeTaken(short_code.to_string()));
        }

        Ok(())
    }

    /// Checks a whole batch, including duplicates inside the batch itself.
    pub fn check_batch(&self, batch: &[NewShortening]) -> Result<(), StorageError> {
        let mut urls: HashMap<&str, &str> = HashMap::with_capacity(batch.len());
        let mut codes: HashSet<&str> = HashSet::with_capacity(batch.len());

        for item in batch {
            self.check_insert(&item.short_code, &item.original_url)?;

            if let Some(first_code) = urls.insert(&item.original_url, &item.short_code) {
                return Err(StorageError::AlreadyExists {
                    short_code: first_code.to_string(),
                });
            }
            if !codes.insert(&item.short_code) {
                return Err(StorageError::ShortCodeTaken(item.short_code.clone()));
            }
        }

        Ok(())
    }

    /// Stores a record. Uniqueness must have been checked by the caller.
    pub fn apply(&mut self, record: ShorteningRecord) {
        self.by_url
            .entry(record.original_url.clone())
            .or_insert_with(|| record.short_code.clone());
        self.by_code.insert(record.short_code.clone(), record);
    }

    pub fn select(&self, short_code: &str) -> Result<String, StorageError> {
        match self.by_code.get(short_code) {
            None => Err(StorageError::NotFound),
            Some(record) if record.deleted => Err(StorageError::Deleted),
            Some(record) => Ok(record.original_url.clone()),
        }
    }

    pub fn select_user_all(&self, owner_id: Uuid) -> Vec<ShorteningRecord> {
        self.by_code
            .values()
            .filter(|r| r.owner_id == owner_id && !r.deleted)
            .cloned()
            .collect()
    }

    /// Returns the live records matched by `items`, each at most once.
    ///
    /// Pairs whose code is unknown or owned by someone else are skipped.
    pub fn pending_deletions(&self, items: &[DeleteItem]) -> Vec<ShorteningRecord> {
        let mut seen = HashSet::new();

        items
            .iter()
            .flat_map(|item| item.pairs())
            .filter_map(|(owner, code)| {
                self.by_code
                    .get(code)
                    .filter(|r| r.owner_id == owner && !r.deleted)
            })
            .filter(|r| seen.insert(r.short_code.clone()))
            .cloned()
            .collect()
    }

    /// Flags the given codes as deleted.
    pub fn mark_deleted<'a>(&mut self, codes: impl IntoIterator<Item = &'a str>) {
        for code in codes {
            if let Some(record) = self.by_code.get_mut(code) {
                record.deleted = true;
            }
        }
    }

    pub fn stats(&self) -> Stats {
        let live = self.by_code.values().filter(|r| !r.deleted);
        let mut owners = HashSet::new();
        let mut urls = 0u64;

        for record in live {
            urls += 1;
            owners.insert(record.owner_id);
        }

        Stats {
            urls,
            users: owners.len() as u64,
        }
    }

    pub fn len(&self) -> usize {
        self.by_code.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(code: &str, url: &str, owner: Uuid) -> ShorteningRecord {
        ShorteningRecord::new(code.to_string(), url.to_string(), owner)
    }

    fn new(code: &str, url: &str) -> NewShortening {
        NewShortening {
            short_code: code.to_string(),
            original_url: url.to_string(),
        }
    }

    #[test]
    fn test_check_insert_reports_existing_code_for_url() {
        let mut index = ShorteningIndex::new();
        index.apply(record("k1", "http://a.example/long", Uuid::new_v4()));

        let err = index
            .check_insert("k2", "http://a.example/long")
            .unwrap_err();
        assert_eq!(err.existing_code(), Some("k1"));
    }

    #[test]
    fn test_check_insert_rejects_taken_code() {
        let mut index = ShorteningIndex::new();
        index.apply(record("k1", "http://a.example", Uuid::new_v4()));

        let err = index.check_insert("k1", "http://b.example").unwrap_err();
        assert!(matches!(err, StorageError::ShortCodeTaken(code) if code == "k1"));
    }

    #[test]
    fn test_check_batch_rejects_duplicate_urls_inside_batch() {
        let index = ShorteningIndex::new();
        let batch = vec![new("k1", "http://a.example"), new("k2", "http://a.example")];

        let err = index.check_batch(&batch).unwrap_err();
        assert_eq!(err.existing_code(), Some("k1"));
    }

    #[test]
    fn test_select_distinguishes_missing_and_deleted() {
        let owner = Uuid::new_v4();
        let mut index = ShorteningIndex::new();
        index.apply(record("k1", "http://a.example", owner));
        index.mark_deleted(["k1"]);

        assert!(matches!(index.select("nope"), Err(StorageError::NotFound)));
        assert!(matches!(index.select("k1"), Err(StorageError::Deleted)));
    }

    #[test]
    fn test_pending_deletions_respects_owner_and_dedups() {
        let owner = Uuid::new_v4();
        let other = Uuid::new_v4();
        let mut index = ShorteningIndex::new();
        index.apply(record("k1", "http://a.example", owner));
        index.apply(record("k2", "http://b.example", other));

        let items = vec![
            DeleteItem::new(owner, vec!["k1".into(), "k2".into(), "zz".into()]),
            DeleteItem::new(owner, vec!["k1".into()]),
        ];

        let pending = index.pending_deletions(&items);
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].short_code, "k1");
    }

    #[test]
    fn test_stats_count_live_records_and_owners() {
        let owner = Uuid::new_v4();
        let other = Uuid::new_v4();
        let mut index = ShorteningIndex::new();
        index.apply(record("k1", "http://a.example", owner));
        index.apply(record("k2", "http://b.example", owner));
        index.apply(record("k3", "http://c.example", other));
        index.mark_deleted(["k3"]);

        assert_eq!(index.stats(), Stats { urls: 2, users: 1 });
        assert_eq!(index.len(), 3);
    }
}
