//! Epoch-millisecond clock driven by tokio's monotonic time.
//!
//! Wall time is anchored once and advanced with [`tokio::time::Instant`], so
//! store stamps and sync timers agree, including under a paused test
//! runtime. The monotonic clock stops while the host is suspended; readings
//! are floored at wall time so they never fall behind it.

use tokio::time::Instant;

use crate::now_ms;

#[derive(Debug, Clone, Copy)]
pub struct Clock {
  anchor_ms: i64,
  anchor:    Instant,
}

impl Default for Clock {
  fn default() -> Self { Self::new() }
}

impl Clock {
  pub fn new() -> Self { Self::starting_at(now_ms()) }

  /// A clock that reads `anchor_ms` right now.
  pub fn starting_at(anchor_ms: i64) -> Self { Self { anchor_ms, anchor: Instant::now() } }

  pub fn now_ms(&self) -> i64 {
    let elapsed = i64::try_from(self.anchor.elapsed().as_millis()).unwrap_or(i64::MAX);
    self.anchor_ms.saturating_add(elapsed).max(now_ms())
  }
}
