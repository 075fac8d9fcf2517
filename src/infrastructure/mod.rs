//! Infrastructure layer for external integrations.
//!
//! Implements the storage contract defined by the domain layer.
//!
//! # Modules
//!
//! - [`persistence`] - PostgreSQL, file and in-memory storage backends

pub mod persistence;
