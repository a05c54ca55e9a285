use std::sync::Arc;

use bytes::Bytes;
use sprout_core::{
  cache::{BlobCache, CacheStorage},
  memory::MemoryCacheStorage,
  resource::{CachedResource, ResourceDescriptor, ResourcePriority, ResourceType},
};

use super::fakes::{BrokenCacheStorage, FakeTransport};
use crate::{ResourceCache, digest::content_digest};

const NAME: &str = "sprout-assets";

fn table() -> Vec<ResourceDescriptor> {
  vec![
    ResourceDescriptor {
      key:           "seed_video",
      url:           "/videos/seed.mp4",
      resource_type: ResourceType::Video,
      priority:      ResourcePriority::High,
    },
    ResourceDescriptor {
      key:           "pot_image",
      url:           "/images/pot.png",
      resource_type: ResourceType::Image,
      priority:      ResourcePriority::Normal,
    },
    ResourceDescriptor {
      key:           "ambient_audio",
      url:           "/audio/ambient.mp3",
      resource_type: ResourceType::Audio,
      priority:      ResourcePriority::Normal,
    },
  ]
}

fn cache_over<C>(transport: &Arc<FakeTransport>, storage: C) -> Arc<ResourceCache<FakeTransport, C>>
where
  C: CacheStorage + 'static,
  C::Cache: 'static,
{
  ResourceCache::with_descriptors(Arc::clone(transport), storage, NAME, table())
}

#[tokio::test]
async fn single_failure_does_not_block_loading() {
  let transport = Arc::new(FakeTransport::serving(&["/videos/seed.mp4", "/audio/ambient.mp3"]));
  let cache = cache_over(&transport, MemoryCacheStorage::default());

  let report = cache.cache_all_resources().await;
  assert_eq!(report.failed, vec!["pot_image".to_string()]);
  assert_eq!(report.cached.len(), 2);
  assert_eq!(report.aborted, None);

  let readiness = cache.readiness();
  assert!(readiness.is_loaded);
  assert_eq!(readiness.progress, 100);

  let integrity = cache.check_cache_integrity().await;
  assert!(!integrity.is_complete);
  assert_eq!(integrity.missing_resources, vec!["pot_image".to_string()]);
  assert!(!cache.are_all_resources_cached().await);
}

#[tokio::test]
async fn progress_never_goes_backwards() {
  let transport = Arc::new(FakeTransport::serving(&[
    "/videos/seed.mp4",
    "/images/pot.png",
    "/audio/ambient.mp3",
  ]));
  let cache = cache_over(&transport, MemoryCacheStorage::default());

  let mut rx = cache.subscribe_readiness();
  let observer = tokio::spawn(async move {
    let mut seen = Vec::new();
    while rx.changed().await.is_ok() {
      let readiness = rx.borrow_and_update().clone();
      seen.push(readiness.progress);
      if readiness.is_loaded {
        break;
      }
    }
    seen
  });

  cache.cache_all_resources().await;
  let seen = observer.await.unwrap();
  assert!(seen.windows(2).all(|w| w[0] <= w[1]), "progress regressed: {seen:?}");
  assert_eq!(seen.last(), Some(&100));
}

#[tokio::test]
async fn unavailable_durable_tier_degrades_to_memory() {
  let transport = Arc::new(FakeTransport::serving(&[
    "/videos/seed.mp4",
    "/images/pot.png",
    "/audio/ambient.mp3",
  ]));
  let cache = cache_over(&transport, BrokenCacheStorage);

  assert!(!cache.init().await);
  assert!(!cache.is_durable());
  cache.cache_all_resources().await;

  assert!(cache.are_all_resources_cached().await);
  let pot = cache.get_cached_resource("pot_image").await.unwrap();
  assert_eq!(pot.bytes, Bytes::from("body of /images/pot.png"));
}

#[tokio::test]
async fn durable_hits_are_promoted_without_refetching() {
  let transport = Arc::new(FakeTransport::serving(&["/images/pot.png"]));
  let storage = MemoryCacheStorage::default();
  let body = Bytes::from_static(b"png bytes");
  storage
    .open(NAME)
    .await
    .unwrap()
    .put(CachedResource {
      key:           "pot_image".into(),
      url:           "/images/pot.png".into(),
      resource_type: ResourceType::Image,
      size:          body.len() as u64,
      digest:        content_digest(&body),
      cached_at:     1,
      bytes:         body.clone(),
    })
    .await
    .unwrap();

  let cache = cache_over(&transport, storage);
  let hit = cache.get_cached_resource("pot_image").await.unwrap();
  assert_eq!(hit.bytes, body);
  assert_eq!(transport.total_fetches(), 0);

  let stats = cache.get_cache_usage_stats().await;
  assert_eq!(stats.item_count, 1);
  assert_eq!(stats.total_size, body.len() as u64);
  assert_eq!(stats.by_type.get(&ResourceType::Image), Some(&1));
}

#[tokio::test]
async fn corrupt_durable_entries_are_evicted() {
  let transport = Arc::new(FakeTransport::serving(&["/images/pot.png"]));
  let storage = MemoryCacheStorage::default();
  let durable = storage.open(NAME).await.unwrap();
  durable
    .put(CachedResource {
      key:           "pot_image".into(),
      url:           "/images/pot.png".into(),
      resource_type: ResourceType::Image,
      bytes:         Bytes::from_static(b"truncated"),
      cached_at:     1,
      size:          9,
      digest:        content_digest(b"the real bytes"),
    })
    .await
    .unwrap();

  let cache = cache_over(&transport, storage);
  assert!(cache.get_cached_resource("pot_image").await.is_none());
  assert!(durable.keys().await.unwrap().is_empty());
}

#[tokio::test]
async fn corrupt_durable_entries_count_as_missing() {
  let transport = Arc::new(FakeTransport::serving(&[
    "/videos/seed.mp4",
    "/images/pot.png",
    "/audio/ambient.mp3",
  ]));
  let storage = MemoryCacheStorage::default();
  cache_over(&transport, storage.clone()).cache_all_resources().await;

  let durable = storage.open(NAME).await.unwrap();
  let mut pot = durable.get("/images/pot.png").await.unwrap().unwrap();
  pot.bytes = Bytes::from_static(b"bit rot");
  durable.put(pot).await.unwrap();

  // A fresh cache has nothing in memory, so only the durable tier answers.
  let cache = cache_over(&transport, storage);
  let integrity = cache.check_cache_integrity().await;
  assert!(!integrity.is_complete);
  assert_eq!(integrity.missing_resources, vec!["pot_image".to_string()]);
  assert!(!cache.are_all_resources_cached().await);
  assert!(durable.get("/images/pot.png").await.unwrap().is_none());

  let report = cache.repair_cache().await;
  assert_eq!(report.cached, vec!["pot_image".to_string()]);
  assert!(cache.are_all_resources_cached().await);
}

#[tokio::test]
async fn usage_stats_read_metadata_without_loading_bodies() {
  let transport = Arc::new(FakeTransport::default());
  let storage = MemoryCacheStorage::default();
  let durable = storage.open(NAME).await.unwrap();
  let body = Bytes::from_static(b"mp3 bytes");
  durable
    .put(CachedResource {
      key:           "ambient_audio".into(),
      url:           "/audio/ambient.mp3".into(),
      resource_type: ResourceType::Audio,
      size:          body.len() as u64,
      digest:        content_digest(&body),
      cached_at:     1,
      bytes:         body.clone(),
    })
    .await
    .unwrap();
  durable
    .put(CachedResource {
      key:           "stale".into(),
      url:           "/not/in/the/table".into(),
      resource_type: ResourceType::Video,
      size:          1_000,
      digest:        String::new(),
      cached_at:     1,
      bytes:         Bytes::new(),
    })
    .await
    .unwrap();

  let cache = cache_over(&transport, storage);
  let stats = cache.get_cache_usage_stats().await;
  assert_eq!(stats.item_count, 1);
  assert_eq!(stats.total_size, body.len() as u64);
  assert_eq!(stats.by_type.get(&ResourceType::Audio), Some(&1));

  // Had the stats promoted the entry, this read would come from memory.
  let mut rotten = durable.get("/audio/ambient.mp3").await.unwrap().unwrap();
  rotten.bytes = Bytes::from_static(b"garbage");
  durable.put(rotten).await.unwrap();
  assert!(cache.get_cached_resource("ambient_audio").await.is_none());
}

#[tokio::test]
async fn repair_fetches_only_what_is_missing() {
  let transport = Arc::new(FakeTransport::serving(&["/videos/seed.mp4", "/audio/ambient.mp3"]));
  let cache = cache_over(&transport, MemoryCacheStorage::default());
  cache.cache_all_resources().await;

  transport.serve("/images/pot.png", b"png".to_vec());
  let report = cache.repair_cache().await;
  assert_eq!(report.cached, vec!["pot_image".to_string()]);
  assert_eq!(transport.fetches("/videos/seed.mp4"), 1);
  assert_eq!(transport.fetches("/images/pot.png"), 2);
  assert!(cache.check_cache_integrity().await.is_complete);

  assert_eq!(cache.repair_cache().await, Default::default());
}

#[tokio::test]
async fn high_priority_pass_skips_normal_assets() {
  let transport = Arc::new(FakeTransport::serving(&[
    "/videos/seed.mp4",
    "/images/pot.png",
    "/audio/ambient.mp3",
  ]));
  let cache = cache_over(&transport, MemoryCacheStorage::default());

  let report = cache.cache_high_priority_resources().await;
  assert_eq!(report.cached, vec!["seed_video".to_string()]);
  assert_eq!(transport.total_fetches(), 1);
  assert!(!cache.readiness().is_loaded);
}

#[tokio::test]
async fn object_urls_wrap_cached_bytes() {
  let transport = Arc::new(FakeTransport::serving(&["/videos/seed.mp4"]));
  let cache = cache_over(&transport, MemoryCacheStorage::default());
  cache.refresh_resource("seed_video").await.unwrap();

  let url = cache.get_cached_resource_url("seed_video").await.unwrap();
  assert_eq!(
    cache.resolve_object_url(&url),
    Some(Bytes::from("body of /videos/seed.mp4"))
  );
  assert!(cache.revoke_object_url(&url));
  assert_eq!(cache.resolve_object_url(&url), None);

  assert!(cache.get_cached_resource_url("pot_image").await.is_none());
  assert!(cache.get_cached_resource_url("no_such_key").await.is_none());
}

#[tokio::test]
async fn clear_empties_both_tiers() {
  let transport = Arc::new(FakeTransport::serving(&[
    "/videos/seed.mp4",
    "/images/pot.png",
    "/audio/ambient.mp3",
  ]));
  let storage = MemoryCacheStorage::default();
  let cache = cache_over(&transport, storage.clone());
  cache.cache_all_resources().await;
  let url = cache.get_cached_resource_url("seed_video").await.unwrap();

  cache.clear_cache().await.unwrap();
  assert_eq!(cache.check_cache_integrity().await.missing_resources.len(), 3);
  assert!(storage.open(NAME).await.unwrap().keys().await.unwrap().is_empty());
  assert_eq!(cache.resolve_object_url(&url), None);
  assert!(!cache.readiness().is_loaded);
  assert_eq!(cache.get_cache_usage_stats().await.item_count, 0);
}
