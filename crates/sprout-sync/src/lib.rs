//! Sync and caching services for the Sprout offline layer.
//!
//! - [`SyncOrchestrator`] polls watering records until enriched, cascades
//!   completions into plant syncs, and runs full syncs.
//! - [`ResourceCache`] keeps the static asset table available offline.
//! - [`NetworkMonitor`] restarts pending work when connectivity returns.
//! - [`AppContext`] wires them together behind a bounded bootstrap.

pub mod config;
pub mod context;
pub mod digest;
pub mod error;
mod flight;
pub mod network;
pub mod notify;
pub mod object_url;
pub mod orchestrator;
pub mod resource_cache;

pub use config::{BOOTSTRAP_TIMEOUT, DEFAULT_CACHE_NAME, SyncConfig};
pub use context::{AppContext, BootstrapReport};
pub use error::{CacheError, Result, SyncError};
pub use network::{MonitorHandle, NetworkMonitor};
pub use notify::{Notification, NotificationKind, Notifier};
pub use orchestrator::{
  FullSyncReport, PlantSyncOutcome, RecordSyncOutcome, SyncOrchestrator, SyncState,
};
pub use resource_cache::{CacheRunReport, ResourceCache};

#[cfg(test)]
mod tests;
