//! Core types and trait definitions for the CBME competency catalog.
//!
//! This crate is deliberately free of HTTP and database dependencies. It
//! holds the catalog model, the search-index capability and its
//! synchronizer, query preparation, and result grouping. Storage backends
//! (e.g. `cbme-store-sqlite`) implement [`store::CatalogStore`] on top of it.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod error;
pub mod group;
pub mod import;
pub mod index;
pub mod model;
pub mod query;
pub mod store;
pub mod sync;

pub use error::{Classify, Error, ErrorKind, Result};
