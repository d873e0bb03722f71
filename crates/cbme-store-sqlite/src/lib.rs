//! SQLite backend for the CBME competency catalog.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime. The search index is an FTS5 table
//! written through [`cbme_core::sync::Synchronizer`] on the same transaction
//! as every competency mutation.

mod encode;
mod fts;
mod schema;
mod search;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use fts::Fts5Index;
pub use store::SqliteStore;
