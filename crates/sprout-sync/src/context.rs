//! [`AppContext`]: wires the store, orchestrator, resource cache, and
//! network monitor together, and runs the bounded bootstrap.

use std::{sync::Arc, time::Duration};

use serde::Serialize;
use sprout_core::{
  cache::CacheStorage,
  remote::{AssetTransport, Connectivity, RemoteSource},
  resource::CacheReadiness,
  store::EntityStore,
};
use tokio::{sync::watch, time::Instant};
use tracing::{error, info, warn};

use crate::{
  config::{BOOTSTRAP_TIMEOUT, SyncConfig},
  network::{MonitorHandle, NetworkMonitor},
  notify::Notifier,
  orchestrator::{SyncOrchestrator, SyncState},
  resource_cache::ResourceCache,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BootstrapReport {
  pub durable_cache: bool,
  pub timed_out:     bool,
  pub readiness:     CacheReadiness,
  pub sync:          SyncState,
  pub elapsed_ms:    u64,
}

pub struct AppContext<S, R, T, C: CacheStorage> {
  pub store:        Arc<S>,
  pub orchestrator: Arc<SyncOrchestrator<S, R>>,
  pub resources:    Arc<ResourceCache<T, C>>,
  pub network:      Arc<NetworkMonitor<S, R>>,
  pub notifier:     Notifier,
}

impl<S, R, T, C> AppContext<S, R, T, C>
where
  S: EntityStore + 'static,
  R: RemoteSource + 'static,
  T: AssetTransport + 'static,
  C: CacheStorage + 'static,
  C::Cache: 'static,
{
  pub fn new(
    store: Arc<S>,
    remote: Arc<R>,
    transport: Arc<T>,
    cache_storage: C,
    cache_name: &str,
    config: SyncConfig,
  ) -> Self {
    let notifier = Notifier::default();
    let (connectivity_tx, connectivity_rx) = watch::channel(Connectivity::Online);
    let orchestrator = SyncOrchestrator::new(
      Arc::clone(&store),
      remote,
      config.clone(),
      connectivity_rx,
      notifier.clone(),
    );
    let network = NetworkMonitor::new(
      Arc::clone(&orchestrator),
      connectivity_tx,
      config,
      notifier.clone(),
    );
    let resources = ResourceCache::new(transport, cache_storage, cache_name);

    Self { store, orchestrator, resources, network, notifier }
  }

  /// Bring the caches up, giving up after [`BOOTSTRAP_TIMEOUT`].
  pub async fn bootstrap(&self) -> BootstrapReport { self.bootstrap_within(BOOTSTRAP_TIMEOUT).await }

  /// Like [`Self::bootstrap`] with an explicit ceiling.
  ///
  /// Downloads still running when the ceiling is hit keep going in the
  /// background; only the readiness signal is forced.
  pub async fn bootstrap_within(&self, limit: Duration) -> BootstrapReport {
    let started = Instant::now();
    let deadline = started + limit;

    match tokio::time::timeout_at(deadline, self.orchestrator.load_state()).await {
      Ok(Ok(state)) => info!(failed = state.failed_count, "sync state loaded"),
      Ok(Err(e)) => warn!(error = %e, "could not load sync state"),
      Err(_) => warn!("loading sync state timed out"),
    }

    let resources = Arc::clone(&self.resources);
    let mut warm = tokio::spawn(async move {
      resources.init().await;
      if resources.are_all_resources_cached().await {
        resources.mark_loaded();
      } else {
        resources.cache_all_resources().await;
      }
    });

    let timed_out = match tokio::time::timeout_at(deadline, &mut warm).await {
      Ok(Ok(())) => false,
      Ok(Err(e)) => {
        error!(error = %e, "resource warm-up task died");
        self.resources.force_ready(Some(e.to_string()));
        false
      }
      Err(_) => {
        warn!(limit_secs = limit.as_secs(), "bootstrap timed out; continuing with a partial cache");
        self.resources.force_ready(Some("bootstrap timed out".to_owned()));
        true
      }
    };

    let report = BootstrapReport {
      durable_cache: self.resources.is_durable(),
      timed_out,
      readiness: self.resources.readiness(),
      sync: self.orchestrator.sync_state(),
      elapsed_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
    };
    info!(?report, "bootstrap finished");
    report
  }

  /// Start connectivity handling and the startup restart.
  pub fn start_background(&self) -> MonitorHandle { self.network.spawn() }

  pub fn shutdown(&self, handle: MonitorHandle) {
    handle.shutdown();
    self.orchestrator.cleanup();
  }
}
