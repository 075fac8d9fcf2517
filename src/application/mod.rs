//! Application layer services implementing business logic.
//!
//! Services consume the storage trait and provide the API that transport
//! handlers call.
//!
//! # Available Services
//!
//! - [`services::shortener_service::ShortenerCore`] - Shortening, lookup and deferred deletion
pub mod services;
