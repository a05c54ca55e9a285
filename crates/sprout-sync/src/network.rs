//! [`NetworkMonitor`]: turns connectivity transitions into sync restarts.

use std::sync::Arc;

use sprout_core::{remote::{Connectivity, RemoteSource}, store::EntityStore};
use tokio::{sync::watch, task::AbortHandle};
use tracing::{info, warn};

use crate::{
  config::SyncConfig,
  notify::{NotificationKind, Notifier},
  orchestrator::SyncOrchestrator,
};

/// Owns the connectivity signal the orchestrator reads.
///
/// Going online restarts pending record syncs after a settle delay; a
/// one-shot restart also runs shortly after startup.
pub struct NetworkMonitor<S, R> {
  orchestrator: Arc<SyncOrchestrator<S, R>>,
  connectivity: watch::Sender<Connectivity>,
  config:       SyncConfig,
  notifier:     Notifier,
}

/// Background tasks started by [`NetworkMonitor::spawn`].
#[derive(Debug)]
pub struct MonitorHandle {
  tasks: Vec<AbortHandle>,
}

impl MonitorHandle {
  pub fn shutdown(self) {
    for task in self.tasks {
      task.abort();
    }
  }
}

impl<S, R> NetworkMonitor<S, R>
where
  S: EntityStore + 'static,
  R: RemoteSource + 'static,
{
  pub fn new(
    orchestrator: Arc<SyncOrchestrator<S, R>>,
    connectivity: watch::Sender<Connectivity>,
    config: SyncConfig,
    notifier: Notifier,
  ) -> Arc<Self> {
    Arc::new(Self { orchestrator, connectivity, config, notifier })
  }

  pub fn connectivity(&self) -> Connectivity { *self.connectivity.borrow() }

  /// Record an observation. Returns whether it was a transition.
  pub fn set_connectivity(&self, next: Connectivity) -> bool {
    self.connectivity.send_if_modified(|current| {
      if *current == next {
        return false;
      }
      *current = next;
      true
    })
  }

  pub fn spawn(self: &Arc<Self>) -> MonitorHandle {
    let transitions = tokio::spawn(Arc::clone(self).watch_transitions());
    let startup = tokio::spawn(Arc::clone(self).startup_restart());
    MonitorHandle {
      tasks: vec![transitions.abort_handle(), startup.abort_handle()],
    }
  }

  async fn watch_transitions(self: Arc<Self>) {
    let mut rx = self.connectivity.subscribe();
    while rx.changed().await.is_ok() {
      let now = *rx.borrow_and_update();
      match now {
        Connectivity::Online => {
          info!("connectivity restored");
          self.notifier.emit(
            NotificationKind::Info,
            "Back online",
            "Pending syncs will resume shortly",
          );
          tokio::time::sleep(self.config.online_settle()).await;
          if self.connectivity().is_online() {
            self.restart("reconnect").await;
          }
        }
        Connectivity::Offline => {
          warn!("connectivity lost; user-initiated sync disabled");
          self.notifier.emit(
            NotificationKind::Warning,
            "Offline",
            "Changes are kept locally and will sync when you reconnect",
          );
        }
      }
    }
  }

  async fn startup_restart(self: Arc<Self>) {
    tokio::time::sleep(self.config.startup_settle()).await;
    if self.connectivity().is_online() {
      self.restart("startup").await;
    }
  }

  async fn restart(&self, reason: &'static str) {
    match self.orchestrator.restart_pending_syncs().await {
      Ok(count) => info!(count, reason, "pending syncs restarted"),
      Err(e) => warn!(error = %e, reason, "restarting pending syncs failed"),
    }
  }
}
