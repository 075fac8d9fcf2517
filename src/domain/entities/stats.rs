use serde::Serialize;

/// Aggregate counts computed from stored records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Stats {
    /// Number of live (non-deleted) shortenings.
    pub urls: u64,
    /// Number of distinct owners of live shortenings.
    pub users: u64,
}
