use std::{sync::Arc, time::Duration};

use bytes::Bytes;
use sprout_core::{
  cache::{BlobCache, CacheStorage},
  memory::{MemoryCacheStorage, MemoryStore},
  plant::Plant,
  resource::RESOURCES,
  store::EntityStore,
};
use tokio::time::sleep;

use super::fakes::{FakeTransport, ScriptedRemote};
use crate::{AppContext, DEFAULT_CACHE_NAME, SyncConfig, digest::verify};

type Context = AppContext<MemoryStore, ScriptedRemote, FakeTransport, MemoryCacheStorage>;

fn all_assets() -> Arc<FakeTransport> {
  let urls: Vec<&str> = RESOURCES.iter().map(|d| d.url).collect();
  Arc::new(FakeTransport::serving(&urls))
}

fn context(transport: &Arc<FakeTransport>, storage: MemoryCacheStorage) -> (Context, Arc<ScriptedRemote>) {
  let remote = Arc::new(ScriptedRemote::default());
  let ctx = AppContext::new(
    Arc::new(MemoryStore::new()),
    Arc::clone(&remote),
    Arc::clone(transport),
    storage,
    DEFAULT_CACHE_NAME,
    SyncConfig::default(),
  );
  (ctx, remote)
}

#[tokio::test(start_paused = true)]
async fn bootstrap_warms_the_cache_once() {
  let transport = all_assets();
  let storage = MemoryCacheStorage::default();

  let (ctx, _) = context(&transport, storage.clone());
  let report = ctx.bootstrap().await;
  assert!(!report.timed_out);
  assert!(report.durable_cache);
  assert!(report.readiness.is_loaded);
  assert_eq!(report.readiness.progress, 100);
  assert_eq!(transport.total_fetches(), RESOURCES.len());

  // A second launch over the same durable storage downloads nothing.
  let (ctx, _) = context(&transport, storage);
  let report = ctx.bootstrap().await;
  assert!(report.readiness.is_loaded);
  assert_eq!(transport.total_fetches(), RESOURCES.len());
}

#[tokio::test(start_paused = true)]
async fn bootstrap_downloads_again_when_a_durable_entry_is_corrupt() {
  let transport = all_assets();
  let storage = MemoryCacheStorage::default();
  let (ctx, _) = context(&transport, storage.clone());
  ctx.bootstrap().await;

  let durable = storage.open(DEFAULT_CACHE_NAME).await.unwrap();
  let mut pot = durable.get("/images/pot.png").await.unwrap().unwrap();
  pot.bytes = Bytes::from_static(b"half a png");
  durable.put(pot).await.unwrap();

  let (ctx, _) = context(&transport, storage);
  let report = ctx.bootstrap().await;
  assert!(report.readiness.is_loaded);
  assert_eq!(transport.fetches("/images/pot.png"), 2);
  assert!(ctx.resources.are_all_resources_cached().await);

  let repaired = durable.get("/images/pot.png").await.unwrap().unwrap();
  assert!(verify(&repaired));
}

#[tokio::test(start_paused = true)]
async fn slow_downloads_hit_the_bootstrap_ceiling() {
  let transport = all_assets();
  transport.set_delay(Duration::from_secs(60));
  let (ctx, _) = context(&transport, MemoryCacheStorage::default());

  let report = ctx.bootstrap().await;
  assert!(report.timed_out);
  assert!(report.readiness.is_loaded);
  assert!(report.readiness.error.is_some());
  assert!(report.elapsed_ms >= 10_000);

  // Downloads carry on after the UI is released.
  sleep(Duration::from_secs(61)).await;
  assert!(ctx.resources.are_all_resources_cached().await);
}

#[tokio::test(start_paused = true)]
async fn background_tasks_restart_pending_work_and_shut_down() {
  let transport = all_assets();
  let (ctx, remote) = context(&transport, MemoryCacheStorage::default());
  ctx.store.add_plant(Plant::new("p1", "mint", 0)).await.unwrap();
  let r1 = ctx.store.record_watering("p1", Some("r1".into())).await.unwrap();
  remote.script("r1", vec![Ok(r1)]);

  let handle = ctx.start_background();
  sleep(Duration::from_millis(3_500)).await;
  assert_eq!(remote.record_calls(), 1);
  assert_eq!(ctx.orchestrator.pending_retry_count(), 1);

  ctx.shutdown(handle);
  assert_eq!(ctx.orchestrator.pending_retry_count(), 0);
  sleep(Duration::from_secs(120)).await;
  assert_eq!(remote.record_calls(), 1);
}
