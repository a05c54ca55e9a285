//! Timing and retry configuration for the sync layer.

use std::time::Duration;

use serde::Deserialize;
use sprout_core::{state::DEFAULT_FORCE_EXPIRE_WINDOW_MS, sync_status::DEFAULT_MAX_RETRIES};

/// Hard ceiling on application bootstrap. Once it elapses the UI is forced
/// into the ready state whatever the cache and sync layers are doing.
pub const BOOTSTRAP_TIMEOUT: Duration = Duration::from_secs(10);

/// Name of the durable cache holding downloaded assets.
pub const DEFAULT_CACHE_NAME: &str = "sprout-assets";

/// Sync timing, deserialised from the `[sync]` table of `config.toml`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
  /// Delay between polls of an incomplete watering record.
  pub retry_interval_secs:    u64,
  /// Polls per counter before a record is marked failed.
  pub max_retries:            u32,
  /// Delay before the parent-plant sync that follows a completed record.
  pub cascade_delay_ms:       u64,
  /// Settle delay after an offline → online transition.
  pub online_settle_ms:       u64,
  /// Settle delay before the one-shot restart at startup.
  pub startup_settle_ms:      u64,
  /// Freshness window stamped on locally modified entities.
  pub force_expire_window_ms: i64,
}

impl Default for SyncConfig {
  fn default() -> Self {
    Self {
      retry_interval_secs:    60,
      max_retries:            DEFAULT_MAX_RETRIES,
      cascade_delay_ms:       1_000,
      online_settle_ms:       1_000,
      startup_settle_ms:      3_000,
      force_expire_window_ms: DEFAULT_FORCE_EXPIRE_WINDOW_MS,
    }
  }
}

impl SyncConfig {
  pub fn retry_interval(&self) -> Duration { Duration::from_secs(self.retry_interval_secs) }

  pub fn cascade_delay(&self) -> Duration { Duration::from_millis(self.cascade_delay_ms) }

  pub fn online_settle(&self) -> Duration { Duration::from_millis(self.online_settle_ms) }

  pub fn startup_settle(&self) -> Duration { Duration::from_millis(self.startup_settle_ms) }
}
