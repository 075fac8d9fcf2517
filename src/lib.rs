//! # Shortener Core
//!
//! URL shortening core: deduplicating inserts, soft deletion through a
//! batched background pipeline, and three interchangeable storage backends.
//!
//! ## Architecture
//!
//! - **Domain Layer** ([`domain`]) - Entities, the storage trait and the delete worker
//! - **Application Layer** ([`application`]) - [`ShortenerCore`] orchestration
//! - **Infrastructure Layer** ([`infrastructure`]) - PostgreSQL, file and memory backends
//!
//! ## Quick Start
//!
//! ```no_run
//! use shortener_core::prelude::*;
//!
//! # async fn run() -> anyhow::Result<()> {
//! let config = Config::default();
//! let storage = shortener_core::infrastructure::persistence::connect(&config).await?;
//! let core = ShortenerCore::new(storage, &config);
//!
//! let owner = uuid::Uuid::new_v4();
//! let created = core.create_shortening(owner, "https://example.com").await?;
//! println!("{}", created.short_url());
//!
//! core.shutdown().await;
//! # Ok(())
//! # }
//! ```
//!
//! ## Configuration
//!
//! Service configuration is loaded from environment variables via [`config::Config`].
//! See [`config`] module for available options.

pub mod application;
pub mod config;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod utils;

pub use application::services::ShortenerCore;
pub use error::{ShortenerError, StorageError};

/// Commonly used types for external consumers.
///
/// Re-exports frequently used types to simplify imports for library users
/// and integration tests.
pub mod prelude {
    pub use crate::application::services::{Shortening, ShortenerCore};
    pub use crate::config::Config;
    pub use crate::domain::entities::{BatchElement, DeleteItem, ShorteningRecord, Stats};
    pub use crate::domain::repositories::{Capabilities, StorageBackend};
    pub use crate::error::{ShortenerError, StorageError};
    pub use crate::infrastructure::persistence::{FileStorage, MemoryStorage, PgStorage};
}
