//! Periodic health checks feeding connectivity transitions to a sink.

use std::time::Duration;

use sprout_core::remote::Connectivity;
use tracing::{debug, info, warn};

use crate::ApiClient;

/// Polls `GET /api/health` and reports the resulting [`Connectivity`].
pub struct HealthCheck {
  client:   ApiClient,
  interval: Duration,
}

impl HealthCheck {
  pub fn new(client: ApiClient, interval: Duration) -> Self {
    Self { client, interval }
  }

  /// Check once.
  pub async fn check(&self) -> Connectivity {
    match self.client.health().await {
      Ok(()) => Connectivity::Online,
      Err(e) => {
        debug!(error = %e, "health check failed");
        Connectivity::Offline
      }
    }
  }

  /// Check forever, calling `sink` on every transition (and once with the
  /// initial observation).
  pub async fn run(self, sink: impl Fn(Connectivity) + Send) {
    let mut ticker = tokio::time::interval(self.interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    let mut last: Option<Connectivity> = None;

    loop {
      ticker.tick().await;
      let now = self.check().await;
      if last != Some(now) {
        match now {
          Connectivity::Online => info!("server reachable"),
          Connectivity::Offline => warn!("server unreachable"),
        }
        sink(now);
        last = Some(now);
      }
    }
  }
}
