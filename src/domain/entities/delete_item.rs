//! Pending deletion request.

use uuid::Uuid;

/// A request to soft-delete some of one owner's short codes.
///
/// Created when a caller asks for deletion and discarded once handed to
/// [`crate::domain::repositories::StorageBackend::delete_records`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteItem {
    pub owner_id: Uuid,
    pub short_codes: Vec<String>,
}

impl DeleteItem {
    pub fn new(owner_id: Uuid, short_codes: Vec<String>) -> Self {
        Self {
            owner_id,
            short_codes,
        }
    }

    /// Iterates over `(owner, code)` pairs referenced by this item.
    pub fn pairs(&self) -> impl Iterator<Item = (Uuid, &str)> {
        self.short_codes
            .iter()
            .map(move |code| (self.owner_id, code.as_str()))
    }
}
