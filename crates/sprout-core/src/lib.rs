//! Core types and trait definitions for the Sprout plant game's offline layer.
//!
//! This crate has no HTTP or database dependencies. It
//! defines the entities, the completeness predicate, the diff rule, the
//! resource descriptor table, and the store / remote / cache abstractions
//! that the other crates implement or consume.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod cache;
pub mod clock;
pub mod completeness;
pub mod entity;
pub mod error;
pub mod memory;
pub mod plant;
pub mod remote;
pub mod resource;
pub mod state;
pub mod store;
pub mod sync_status;
pub mod watering;

pub use clock::Clock;
pub use error::{Error, Result};

/// Current wall-clock time as milliseconds since the Unix epoch.
pub fn now_ms() -> i64 { chrono::Utc::now().timestamp_millis() }
