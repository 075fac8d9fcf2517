//! Domain layer containing business entities and logic.
//!
//! Defines entities, the storage contract and the background deletion
//! pipeline independent of any concrete backend.
//!
//! # Architecture
//!
//! - [`entities`] - Core business data structures
//! - [`repositories`] - Storage trait definition
//! - [`delete_worker`] - Batched asynchronous soft deletion
//!
//! # Deletion Flow
//!
//! 1. A caller asks [`crate::application::services::ShortenerCore`] to delete codes
//! 2. A [`entities::DeleteItem`] is sent to the bounded channel
//! 3. [`delete_worker::run_delete_worker`] accumulates items and flushes them each tick
//! 4. Records are flagged via [`repositories::StorageBackend::delete_records`]

pub mod delete_worker;
pub mod entities;
pub mod repositories;
