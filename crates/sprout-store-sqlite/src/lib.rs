//! SQLite backend for the Sprout entity store and durable asset cache.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime. One database file holds both the
//! entity-state snapshot and the named blob caches.

mod blob_cache;
mod encode;
mod schema;
mod store;

pub mod error;

pub use blob_cache::{SqliteBlobCache, SqliteCacheStorage};
pub use error::{Error, Result};
pub use store::SqliteStore;
