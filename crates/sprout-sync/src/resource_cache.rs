//! [`ResourceCache`]: two-tier cache for the game's static assets.
//!
//! The durable tier is a named [`BlobCache`] keyed by asset URL; the memory
//! tier mirrors it keyed by resource key. If the durable tier cannot be
//! opened the cache keeps working from memory alone.

use std::{
  collections::HashMap,
  sync::{
    Arc, Mutex, MutexGuard, PoisonError,
    atomic::{AtomicUsize, Ordering},
  },
};

use bytes::Bytes;
use serde::Serialize;
use sprout_core::{
  cache::{BlobCache, CacheStorage},
  now_ms,
  remote::AssetTransport,
  resource::{
    CacheIntegrity, CacheReadiness, CacheUsageStats, CachedEntryMeta, CachedResource, RESOURCES,
    ResourceDescriptor, ResourcePriority,
  },
};
use tokio::{
  sync::{OnceCell, watch},
  task::JoinSet,
};
use tracing::{debug, error, info, warn};

use crate::{
  digest::{content_digest, verify},
  error::CacheError,
  object_url::ObjectUrlRegistry,
};

/// Outcome of one batch of downloads.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheRunReport {
  pub cached:  Vec<String>,
  pub failed:  Vec<String>,
  /// Set when the batch itself broke down, as opposed to single downloads.
  pub aborted: Option<String>,
}

pub struct ResourceCache<T, C: CacheStorage> {
  transport:   Arc<T>,
  storage:     C,
  cache_name:  String,
  descriptors: Vec<ResourceDescriptor>,
  /// `Some(None)` once opening the durable tier has failed.
  durable:     OnceCell<Option<C::Cache>>,
  memory:      Mutex<HashMap<String, CachedResource>>,
  readiness:   watch::Sender<CacheReadiness>,
  object_urls: ObjectUrlRegistry,
}

impl<T, C> ResourceCache<T, C>
where
  T: AssetTransport + 'static,
  C: CacheStorage + 'static,
  C::Cache: 'static,
{
  /// A cache over the full [`RESOURCES`] table.
  pub fn new(transport: Arc<T>, storage: C, cache_name: impl Into<String>) -> Arc<Self> {
    Self::with_descriptors(transport, storage, cache_name, RESOURCES.to_vec())
  }

  pub fn with_descriptors(
    transport: Arc<T>,
    storage: C,
    cache_name: impl Into<String>,
    descriptors: Vec<ResourceDescriptor>,
  ) -> Arc<Self> {
    let (readiness, _) = watch::channel(CacheReadiness::default());
    Arc::new(Self {
      transport,
      storage,
      cache_name: cache_name.into(),
      descriptors,
      durable: OnceCell::new(),
      memory: Mutex::new(HashMap::new()),
      readiness,
      object_urls: ObjectUrlRegistry::default(),
    })
  }

  pub fn descriptors(&self) -> &[ResourceDescriptor] { &self.descriptors }

  // ── Readiness ─────────────────────────────────────────────────────────────

  pub fn readiness(&self) -> CacheReadiness { self.readiness.borrow().clone() }

  pub fn subscribe_readiness(&self) -> watch::Receiver<CacheReadiness> {
    self.readiness.subscribe()
  }

  /// Declare the cache usable whatever its download state, recording `note`
  /// as the readiness error.
  pub fn force_ready(&self, note: Option<String>) {
    self.readiness.send_modify(|r| {
      r.is_loaded = true;
      if note.is_some() {
        r.error = note;
      }
    });
  }

  pub(crate) fn mark_loaded(&self) {
    self.readiness.send_modify(|r| {
      r.is_loaded = true;
      r.progress = 100;
      r.error = None;
    });
  }

  fn publish_progress(&self, done: usize, total: usize) {
    let pct = u8::try_from(done * 100 / total.max(1)).unwrap_or(100).min(100);
    self.readiness.send_if_modified(|r| {
      if pct > r.progress {
        r.progress = pct;
        true
      } else {
        false
      }
    });
  }

  // ── Tiers ─────────────────────────────────────────────────────────────────

  /// Open the durable tier. Idempotent; returns whether it is available.
  pub async fn init(&self) -> bool { self.durable().await.is_some() }

  /// Whether the durable tier has been opened successfully.
  pub fn is_durable(&self) -> bool { self.durable.get().is_some_and(Option::is_some) }

  async fn durable(&self) -> Option<&C::Cache> {
    self
      .durable
      .get_or_init(|| async {
        match self.storage.open(&self.cache_name).await {
          Ok(cache) => {
            debug!(cache = %self.cache_name, "durable cache opened");
            Some(cache)
          }
          Err(e) => {
            warn!(cache = %self.cache_name, error = %e, "durable cache unavailable; running from memory");
            None
          }
        }
      })
      .await
      .as_ref()
  }

  fn memory(&self) -> MutexGuard<'_, HashMap<String, CachedResource>> {
    self.memory.lock().unwrap_or_else(PoisonError::into_inner)
  }

  fn descriptor(&self, key: &str) -> Option<ResourceDescriptor> {
    self.descriptors.iter().find(|d| d.key == key).copied()
  }

  /// Descriptors with no usable copy in either tier. A durable entry only
  /// counts when its bytes still match their digest.
  async fn missing(&self) -> Vec<ResourceDescriptor> {
    let mut missing = Vec::new();
    for descriptor in &self.descriptors {
      if self.memory().contains_key(descriptor.key) {
        continue;
      }
      if self.durable_entry(descriptor).await.is_none() {
        missing.push(*descriptor);
      }
    }
    missing
  }

  /// The durable entry for `descriptor` if its digest verifies. Corrupt
  /// entries are evicted on the way.
  async fn durable_entry(&self, descriptor: &ResourceDescriptor) -> Option<CachedResource> {
    let cache = self.durable().await?;
    match cache.get(descriptor.url).await {
      Ok(Some(entry)) if verify(&entry) => Some(entry),
      Ok(Some(_)) => {
        warn!(resource = descriptor.key, "digest mismatch; evicting cached entry");
        if let Err(e) = cache.delete(descriptor.url).await {
          warn!(resource = descriptor.key, error = %e, "evicting corrupt entry failed");
        }
        None
      }
      Ok(None) => None,
      Err(e) => {
        warn!(resource = descriptor.key, error = %e, "durable cache read failed");
        None
      }
    }
  }

  // ── Queries ───────────────────────────────────────────────────────────────

  pub async fn are_all_resources_cached(&self) -> bool { self.missing().await.is_empty() }

  pub async fn check_cache_integrity(&self) -> CacheIntegrity {
    let missing: Vec<String> = self
      .missing()
      .await
      .into_iter()
      .map(|d| d.key.to_owned())
      .collect();
    CacheIntegrity { is_complete: missing.is_empty(), missing_resources: missing }
  }

  /// The cached resource for `key`, from memory or else the durable tier.
  ///
  /// Durable hits are checked against their digest and promoted into
  /// memory; corrupt entries are evicted and reported as absent.
  pub async fn get_cached_resource(&self, key: &str) -> Option<CachedResource> {
    let descriptor = self.descriptor(key)?;
    let hit = self.memory().get(key).cloned();
    if hit.is_some() {
      return hit;
    }

    let entry = self.durable_entry(&descriptor).await?;
    self.memory().insert(key.to_owned(), entry.clone());
    Some(entry)
  }

  /// An object URL wrapping the cached bytes for `key`.
  pub async fn get_cached_resource_url(&self, key: &str) -> Option<String> {
    let resource = self.get_cached_resource(key).await?;
    Some(self.object_urls.create(resource.bytes))
  }

  pub fn resolve_object_url(&self, url: &str) -> Option<Bytes> { self.object_urls.resolve(url) }

  pub fn revoke_object_url(&self, url: &str) -> bool { self.object_urls.revoke(url) }

  /// Sizes come from stored metadata; no entry body is read or promoted.
  pub async fn get_cache_usage_stats(&self) -> CacheUsageStats {
    let mut durable: HashMap<String, CachedEntryMeta> = HashMap::new();
    if let Some(cache) = self.durable().await {
      match cache.entries().await {
        Ok(entries) => durable.extend(entries.into_iter().map(|m| (m.url.clone(), m))),
        Err(e) => warn!(error = %e, "listing durable cache failed"),
      }
    }

    let mut stats = CacheUsageStats::default();
    for descriptor in &self.descriptors {
      let meta = match durable.remove(descriptor.url) {
        Some(meta) => meta,
        None => match self.memory().get(descriptor.key) {
          Some(entry) => CachedEntryMeta::from(entry),
          None => continue,
        },
      };
      stats.total_size += meta.size;
      stats.item_count += 1;
      *stats.by_type.entry(meta.resource_type).or_default() += 1;
    }
    stats
  }

  // ── Downloads ─────────────────────────────────────────────────────────────

  /// Download every descriptor concurrently, publishing progress as each
  /// one finishes. Single failures are logged and skipped.
  pub async fn cache_all_resources(self: &Arc<Self>) -> CacheRunReport {
    self.readiness.send_replace(CacheReadiness::default());
    info!(count = self.descriptors.len(), "caching resources");

    let report = self.run_batch(self.descriptors.clone(), true).await;
    match &report.aborted {
      None => {
        self.mark_loaded();
        info!(cached = report.cached.len(), failed = report.failed.len(), "resource caching finished");
      }
      Some(reason) => {
        let reason = reason.clone();
        self.readiness.send_modify(|r| r.error = Some(reason));
      }
    }
    report
  }

  /// Download only the descriptors needed for first render.
  pub async fn cache_high_priority_resources(self: &Arc<Self>) -> CacheRunReport {
    let high: Vec<_> = self
      .descriptors
      .iter()
      .filter(|d| d.priority == ResourcePriority::High)
      .copied()
      .collect();
    self.run_batch(high, false).await
  }

  /// Evict corrupt durable entries, then download whatever is missing.
  pub async fn repair_cache(self: &Arc<Self>) -> CacheRunReport {
    let evicted = self.evict_corrupt().await;
    let missing = self.missing().await;
    if missing.is_empty() {
      info!("cache intact; nothing to repair");
      return CacheRunReport::default();
    }

    info!(missing = missing.len(), evicted, "repairing cache");
    let report = self.run_batch(missing, false).await;
    if self.are_all_resources_cached().await {
      self.mark_loaded();
    }
    report
  }

  /// Remove every entry from both tiers and revoke all object URLs.
  pub async fn clear_cache(&self) -> Result<(), CacheError> {
    if let Some(cache) = self.durable().await {
      cache
        .clear()
        .await
        .map_err(|e| CacheError::Durable(e.to_string()))?;
    }
    self.memory().clear();
    self.object_urls.revoke_all();
    self.readiness.send_replace(CacheReadiness::default());
    info!(cache = %self.cache_name, "resource cache cleared");
    Ok(())
  }

  /// Download one resource by key, replacing any cached copy.
  pub async fn refresh_resource(&self, key: &str) -> Result<(), CacheError> {
    let descriptor = self
      .descriptor(key)
      .ok_or_else(|| CacheError::UnknownResource(key.to_owned()))?;
    self.cache_resource(&descriptor).await
  }

  async fn run_batch(self: &Arc<Self>, batch: Vec<ResourceDescriptor>, track_progress: bool) -> CacheRunReport {
    let total = batch.len();
    let completed = Arc::new(AtomicUsize::new(0));
    let mut tasks = JoinSet::new();

    for descriptor in batch {
      let this = Arc::clone(self);
      let completed = Arc::clone(&completed);
      tasks.spawn(async move {
        let outcome = this.cache_resource(&descriptor).await;
        let done = completed.fetch_add(1, Ordering::SeqCst) + 1;
        if track_progress {
          this.publish_progress(done, total);
        }
        (descriptor.key, outcome)
      });
    }

    let mut report = CacheRunReport::default();
    while let Some(joined) = tasks.join_next().await {
      match joined {
        Ok((key, Ok(()))) => report.cached.push(key.to_owned()),
        Ok((key, Err(e))) => {
          warn!(resource = key, error = %e, "failed to cache resource");
          report.failed.push(key.to_owned());
        }
        Err(e) => {
          error!(error = %e, "resource download task died");
          report.aborted = Some(e.to_string());
        }
      }
    }
    report.cached.sort();
    report.failed.sort();
    report
  }

  async fn cache_resource(&self, descriptor: &ResourceDescriptor) -> Result<(), CacheError> {
    let bytes = self.transport.fetch(descriptor.url).await?;
    let entry = CachedResource {
      key:           descriptor.key.to_owned(),
      url:           descriptor.url.to_owned(),
      resource_type: descriptor.resource_type,
      size:          bytes.len() as u64,
      digest:        content_digest(&bytes),
      cached_at:     now_ms(),
      bytes,
    };

    if let Some(cache) = self.durable().await
      && let Err(e) = cache.put(entry.clone()).await
    {
      warn!(resource = descriptor.key, error = %e, "durable write failed; kept in memory only");
    }
    debug!(resource = descriptor.key, size = entry.size, "resource cached");
    self.memory().insert(descriptor.key.to_owned(), entry);
    Ok(())
  }

  /// Drop durable entries whose bytes no longer match their digest.
  async fn evict_corrupt(&self) -> usize {
    let Some(cache) = self.durable().await else {
      return 0;
    };
    let mut evicted = 0;
    for descriptor in &self.descriptors {
      let Ok(Some(entry)) = cache.get(descriptor.url).await else {
        continue;
      };
      if verify(&entry) {
        continue;
      }
      warn!(resource = descriptor.key, "evicting corrupt cache entry");
      // The memory copy may predate the corruption; drop it so the durable
      // tier gets rewritten.
      self.memory().remove(descriptor.key);
      if cache.delete(descriptor.url).await.unwrap_or(false) {
        evicted += 1;
      }
    }
    evicted
  }
}
