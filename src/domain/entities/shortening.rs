//! Shortening entities: stored records, inputs for creation and batch items.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A stored mapping between a short code and an original URL.
///
/// `short_code` and `original_url` are each unique across all records,
/// regardless of owner. `deleted` only ever goes from `false` to `true`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShorteningRecord {
    pub short_code: String,
    pub original_url: String,
    pub owner_id: Uuid,
    pub deleted: bool,
}

impl ShorteningRecord {
    /// Creates a live (non-deleted) record.
    pub fn new(short_code: String, original_url: String, owner_id: Uuid) -> Self {
        Self {
            short_code,
            original_url,
            owner_id,
            deleted: false,
        }
    }
}

/// Input data for inserting one row of a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewShortening {
    pub short_code: String,
    pub original_url: String,
}

/// One element of a batch shortening request and its response.
///
/// On input `short_url` is empty; on output it holds the public short URL.
/// `correlation_id` is opaque to the core and echoed back unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchElement {
    pub correlation_id: String,
    pub original_url: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub short_url: String,
}

impl BatchElement {
    pub fn new(correlation_id: impl Into<String>, original_url: impl Into<String>) -> Self {
        Self {
            correlation_id: correlation_id.into(),
            original_url: original_url.into(),
            short_url: String::new(),
        }
    }
}
