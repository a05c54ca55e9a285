//! HTTP implementations of the remote collaborators consumed by the sync
//! layer: record and plant reads, asset downloads, and a periodic health check.

mod client;
mod health;

pub mod error;

pub use client::{ApiClient, ClientConfig};
pub use error::{Error, Result};
pub use health::HealthCheck;
