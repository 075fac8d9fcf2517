//! Core domain entities.
//!
//! - [`ShorteningRecord`] - A stored short code to URL mapping
//! - [`NewShortening`] - Input for inserting a record
//! - [`BatchElement`] - One item of a batch request/response
//! - [`DeleteItem`] - A pending soft-delete request
//! - [`Stats`] - Derived counts

pub mod delete_item;
pub mod shortening;
pub mod stats;

pub use delete_item::DeleteItem;
pub use shortening::{BatchElement, NewShortening, ShorteningRecord};
pub use stats::Stats;
