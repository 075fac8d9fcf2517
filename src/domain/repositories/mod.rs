//! Repository trait definitions for the domain layer.
//!
//! - Traits define the contract for data operations
//! - Implementations live in `crate::infrastructure::persistence`
//! - Mock implementations are auto-generated via `mockall` for testing

pub mod storage_backend;

pub use storage_backend::{Capabilities, StorageBackend};

#[cfg(test)]
pub use storage_backend::MockStorageBackend;
