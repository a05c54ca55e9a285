//! Per-entity sync bookkeeping.

use serde::{Deserialize, Serialize};

/// Retry ceiling applied to a watering record's polling.
pub const DEFAULT_MAX_RETRIES: u32 = 10;

fn default_max_retries() -> u32 { DEFAULT_MAX_RETRIES }

/// Sync state of one entity.
///
/// `is_syncing` is a liveness flag, not a fact about the world: it is never
/// persisted as `true` and is reset on every load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStatus {
  /// Epoch ms of the last successful check.
  #[serde(default)]
  pub last_sync:          i64,
  #[serde(default)]
  pub is_complete:        bool,
  #[serde(default)]
  pub is_syncing:         bool,
  #[serde(default)]
  pub error:              Option<String>,
  /// Polls that answered "still incomplete".
  #[serde(default)]
  pub retry_count:        u32,
  /// Polls that failed at the transport or server level.
  #[serde(default)]
  pub failure_count:      u32,
  #[serde(default = "default_max_retries")]
  pub max_retries:        u32,
  /// Set once retries are exhausted; cleared only by a manual retry.
  #[serde(default)]
  pub is_failed:          bool,
  /// Epoch ms of the last local mutation.
  #[serde(default)]
  pub last_modified:      i64,
  /// Until this epoch ms the entity holds fresh, unconfirmed local data.
  #[serde(default)]
  pub force_expire_until: i64,
}

impl Default for SyncStatus {
  fn default() -> Self {
    Self {
      last_sync:          0,
      is_complete:        false,
      is_syncing:         false,
      error:              None,
      retry_count:        0,
      failure_count:      0,
      max_retries:        DEFAULT_MAX_RETRIES,
      is_failed:          false,
      last_modified:      0,
      force_expire_until: 0,
    }
  }
}

impl SyncStatus {
  /// Whether the entity is inside its force-expire window at `now`.
  pub fn is_fresh(&self, now: i64) -> bool { now < self.force_expire_until }

  pub fn retries_exhausted(&self) -> bool {
    self.retry_count >= self.max_retries || self.failure_count >= self.max_retries
  }

  /// Merge `patch` into `self`; absent patch fields are left untouched.
  pub fn apply(&mut self, patch: &SyncStatusPatch) {
    if let Some(v) = patch.last_sync {
      self.last_sync = v;
    }
    if let Some(v) = patch.is_complete {
      self.is_complete = v;
    }
    if let Some(v) = patch.is_syncing {
      self.is_syncing = v;
    }
    if let Some(v) = &patch.error {
      self.error = v.clone();
    }
    if let Some(v) = patch.retry_count {
      self.retry_count = v;
    }
    if let Some(v) = patch.failure_count {
      self.failure_count = v;
    }
    if let Some(v) = patch.max_retries {
      self.max_retries = v;
    }
    if let Some(v) = patch.is_failed {
      self.is_failed = v;
    }
    if let Some(v) = patch.last_modified {
      self.last_modified = v;
    }
    if let Some(v) = patch.force_expire_until {
      self.force_expire_until = v;
    }
  }
}

/// A partial [`SyncStatus`] update. Build with the chained setters:
///
/// ```
/// # use sprout_core::sync_status::SyncStatusPatch;
/// let patch = SyncStatusPatch::default().synced_at(42).complete(true);
/// assert_eq!(patch.last_sync, Some(42));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncStatusPatch {
  pub last_sync:          Option<i64>,
  pub is_complete:        Option<bool>,
  pub is_syncing:         Option<bool>,
  /// `Some(None)` clears the error.
  pub error:              Option<Option<String>>,
  pub retry_count:        Option<u32>,
  pub failure_count:      Option<u32>,
  pub max_retries:        Option<u32>,
  pub is_failed:          Option<bool>,
  pub last_modified:      Option<i64>,
  pub force_expire_until: Option<i64>,
}

impl SyncStatusPatch {
  pub fn synced_at(mut self, ts: i64) -> Self {
    self.last_sync = Some(ts);
    self
  }

  pub fn complete(mut self, v: bool) -> Self {
    self.is_complete = Some(v);
    self
  }

  pub fn syncing(mut self, v: bool) -> Self {
    self.is_syncing = Some(v);
    self
  }

  pub fn error(mut self, message: impl Into<String>) -> Self {
    self.error = Some(Some(message.into()));
    self
  }

  pub fn clear_error(mut self) -> Self {
    self.error = Some(None);
    self
  }

  pub fn retry_count(mut self, n: u32) -> Self {
    self.retry_count = Some(n);
    self
  }

  pub fn failure_count(mut self, n: u32) -> Self {
    self.failure_count = Some(n);
    self
  }

  pub fn max_retries(mut self, n: u32) -> Self {
    self.max_retries = Some(n);
    self
  }

  pub fn failed(mut self, v: bool) -> Self {
    self.is_failed = Some(v);
    self
  }

  /// Stamp a local modification at `now` with a force-expire window ending
  /// at `expire_until`.
  pub fn modified(mut self, now: i64, expire_until: i64) -> Self {
    self.last_modified = Some(now);
    self.force_expire_until = Some(expire_until);
    self
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn patch_merges_instead_of_replacing() {
    let mut status = SyncStatus {
      retry_count: 3,
      error: Some("boom".into()),
      ..SyncStatus::default()
    };
    status.apply(&SyncStatusPatch::default().synced_at(99).complete(true));

    assert_eq!(status.last_sync, 99);
    assert!(status.is_complete);
    assert_eq!(status.retry_count, 3);
    assert_eq!(status.error.as_deref(), Some("boom"));

    status.apply(&SyncStatusPatch::default().clear_error());
    assert_eq!(status.error, None);
  }

  #[test]
  fn either_counter_exhausts_retries() {
    let mut status = SyncStatus { max_retries: 2, ..SyncStatus::default() };
    assert!(!status.retries_exhausted());
    status.failure_count = 2;
    assert!(status.retries_exhausted());
    status.failure_count = 0;
    status.retry_count = 2;
    assert!(status.retries_exhausted());
  }

  #[test]
  fn fresh_until_the_window_closes() {
    let status = SyncStatus { force_expire_until: 200, ..SyncStatus::default() };
    assert!(status.is_fresh(150));
    assert!(!status.is_fresh(200));
  }

  #[test]
  fn missing_max_retries_defaults_when_deserialised() {
    let status: SyncStatus =
      serde_json::from_str(r#"{"lastSync":5,"isComplete":true}"#).unwrap();
    assert_eq!(status.max_retries, DEFAULT_MAX_RETRIES);
    assert!(!status.is_syncing);
  }
}
