use std::{sync::Arc, time::Duration};

use sprout_core::{memory::MemoryStore, plant::Plant, remote::Connectivity, store::EntityStore};
use tokio::{sync::watch, time::sleep};

use super::fakes::ScriptedRemote;
use crate::{NetworkMonitor, NotificationKind, Notifier, SyncConfig, SyncOrchestrator};

type Monitor = Arc<NetworkMonitor<MemoryStore, ScriptedRemote>>;

/// A monitor over a store holding one un-enriched record, `r1`.
async fn setup() -> (Arc<ScriptedRemote>, Monitor, Notifier) {
  let store = Arc::new(MemoryStore::new());
  store.add_plant(Plant::new("p1", "basil", 0)).await.unwrap();
  let r1 = store.record_watering("p1", Some("r1".into())).await.unwrap();

  let remote = Arc::new(ScriptedRemote::default());
  remote.script("r1", vec![Ok(r1)]);

  let notifier = Notifier::default();
  let (tx, rx) = watch::channel(Connectivity::Online);
  let config = SyncConfig::default();
  let orchestrator =
    SyncOrchestrator::new(store, Arc::clone(&remote), config.clone(), rx, notifier.clone());
  let monitor = NetworkMonitor::new(orchestrator, tx, config, notifier.clone());
  (remote, monitor, notifier)
}

#[tokio::test(start_paused = true)]
async fn startup_restart_waits_for_settle() {
  let (remote, monitor, _) = setup().await;
  let handle = monitor.spawn();

  sleep(Duration::from_millis(2_900)).await;
  assert_eq!(remote.record_calls(), 0);
  sleep(Duration::from_millis(200)).await;
  assert_eq!(remote.record_calls(), 1);

  handle.shutdown();
}

#[tokio::test(start_paused = true)]
async fn reconnect_restarts_pending_syncs_after_settle() {
  let (remote, monitor, notifier) = setup().await;
  let mut notifications = notifier.subscribe();

  assert!(monitor.set_connectivity(Connectivity::Offline));
  assert!(!monitor.set_connectivity(Connectivity::Offline));
  let handle = monitor.spawn();

  // Startup restart is skipped while offline.
  sleep(Duration::from_secs(5)).await;
  assert_eq!(remote.record_calls(), 0);

  assert!(monitor.set_connectivity(Connectivity::Online));
  sleep(Duration::from_millis(900)).await;
  assert_eq!(remote.record_calls(), 0);
  sleep(Duration::from_millis(200)).await;
  assert_eq!(remote.record_calls(), 1);
  assert_eq!(notifications.try_recv().unwrap().kind, NotificationKind::Info);

  handle.shutdown();
}

#[tokio::test(start_paused = true)]
async fn flapping_back_offline_cancels_the_restart() {
  let (remote, monitor, _) = setup().await;
  monitor.set_connectivity(Connectivity::Offline);
  let handle = monitor.spawn();
  sleep(Duration::from_secs(5)).await;

  monitor.set_connectivity(Connectivity::Online);
  sleep(Duration::from_millis(300)).await;
  monitor.set_connectivity(Connectivity::Offline);
  sleep(Duration::from_secs(3)).await;

  assert_eq!(remote.record_calls(), 0);
  assert_eq!(monitor.connectivity(), Connectivity::Offline);
  handle.shutdown();
}
