//! Process-local backends: [`MemoryStore`] and [`MemoryCacheStorage`].
//!
//! Used as the degraded tier when durable storage is unavailable, and by
//! tests that need deterministic, I/O-free stores.

use std::{
  collections::{BTreeMap, HashMap},
  convert::Infallible,
  sync::{Arc, Mutex, PoisonError},
};

use uuid::Uuid;

use crate::{
  Result,
  cache::{BlobCache, CacheStorage},
  clock::Clock,
  entity::EntityKind,
  plant::Plant,
  resource::{CachedEntryMeta, CachedResource},
  state::{DEFAULT_FORCE_EXPIRE_WINDOW_MS, StoreState},
  store::EntityStore,
  sync_status::{SyncStatus, SyncStatusPatch},
  watering::WateringRecord,
};

// ─── MemoryStore ─────────────────────────────────────────────────────────────

/// An [`EntityStore`] that keeps its state in process memory only.
pub struct MemoryStore {
  state:                  Mutex<StoreState>,
  clock:                  Clock,
  force_expire_window_ms: i64,
}

impl Default for MemoryStore {
  fn default() -> Self { Self::new() }
}

impl MemoryStore {
  pub fn new() -> Self { Self::with_state(StoreState::default()) }

  /// Start from an existing state, as if it had just been loaded.
  pub fn with_state(mut state: StoreState) -> Self {
    state.reset_liveness();
    Self {
      state:                  Mutex::new(state),
      clock:                  Clock::new(),
      force_expire_window_ms: DEFAULT_FORCE_EXPIRE_WINDOW_MS,
    }
  }

  /// Stamp mutations from `clock` instead of one anchored now.
  pub fn with_clock(mut self, clock: Clock) -> Self {
    self.clock = clock;
    self
  }

  pub fn with_force_expire_window(mut self, window_ms: i64) -> Self {
    self.force_expire_window_ms = window_ms;
    self
  }

  fn read<T>(&self, f: impl FnOnce(&StoreState) -> T) -> T {
    f(&self.state.lock().unwrap_or_else(PoisonError::into_inner))
  }

  fn write<T>(&self, f: impl FnOnce(&mut StoreState, i64, i64) -> Result<T>) -> Result<T> {
    let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
    f(&mut state, self.clock.now_ms(), self.force_expire_window_ms)
  }
}

impl EntityStore for MemoryStore {
  type Error = crate::Error;

  fn now_ms(&self) -> i64 { self.clock.now_ms() }

  // ── Plants ────────────────────────────────────────────────────────────────

  async fn get_plant(&self, id: &str) -> Result<Option<Plant>> {
    Ok(self.read(|s| s.plant(id).cloned()))
  }

  async fn list_plants(&self) -> Result<Vec<Plant>> {
    Ok(self.read(|s| s.plants.values().cloned().collect()))
  }

  async fn add_plant(&self, plant: Plant) -> Result<()> {
    self.write(|s, now, window| s.add_plant(plant, now, window))
  }

  async fn update_plant(&self, plant: Plant) -> Result<()> {
    self.write(|s, now, window| s.update_plant(plant, now, window))
  }

  async fn replace_plant(&self, snapshot: Plant) -> Result<()> {
    self.write(|s, _, _| {
      s.replace_plant(snapshot);
      Ok(())
    })
  }

  async fn remove_plant(&self, id: &str) -> Result<Option<Plant>> {
    self.write(|s, _, _| Ok(s.remove_plant(id)))
  }

  async fn apply_growth(&self, plant_id: &str, increment: i64) -> Result<Plant> {
    self.write(|s, now, window| s.apply_growth(plant_id, increment, now, window))
  }

  // ── Watering records ──────────────────────────────────────────────────────

  async fn get_watering_record(&self, id: &str) -> Result<Option<WateringRecord>> {
    Ok(self.read(|s| s.watering_record(id).cloned()))
  }

  async fn list_watering_records(&self) -> Result<Vec<WateringRecord>> {
    Ok(self.read(|s| s.watering_records.values().cloned().collect()))
  }

  async fn list_watering_records_for_plant(
    &self,
    plant_id: &str,
  ) -> Result<Vec<WateringRecord>> {
    Ok(self.read(|s| s.watering_records_for_plant(plant_id)))
  }

  async fn add_watering_record(&self, record: WateringRecord) -> Result<()> {
    self.write(|s, now, window| s.add_watering_record(record, now, window))
  }

  async fn update_watering_record(&self, record: WateringRecord) -> Result<()> {
    self.write(|s, now, window| s.update_watering_record(record, now, window))
  }

  async fn record_watering(
    &self,
    plant_id: &str,
    record_id: Option<String>,
  ) -> Result<WateringRecord> {
    let record_id = record_id.unwrap_or_else(|| Uuid::new_v4().to_string());
    self.write(|s, now, window| s.record_watering(plant_id, record_id, now, window))
  }

  async fn replace_watering_record(&self, snapshot: WateringRecord) -> Result<()> {
    self.write(|s, _, _| {
      s.replace_watering_record(snapshot);
      Ok(())
    })
  }

  async fn remove_watering_record(&self, id: &str) -> Result<Option<WateringRecord>> {
    self.write(|s, _, _| Ok(s.remove_watering_record(id)))
  }

  async fn incomplete_watering_records(&self) -> Result<Vec<WateringRecord>> {
    Ok(self.read(StoreState::incomplete_watering_records))
  }

  // ── Sync status ───────────────────────────────────────────────────────────

  async fn get_sync_status(&self, kind: EntityKind, id: &str) -> Result<SyncStatus> {
    Ok(self.read(|s| s.sync_status(kind, id)))
  }

  async fn set_sync_status(
    &self,
    kind: EntityKind,
    id: &str,
    patch: SyncStatusPatch,
  ) -> Result<()> {
    self.write(|s, _, _| {
      s.set_sync_status(kind, id, &patch);
      Ok(())
    })
  }

  async fn last_global_sync(&self) -> Result<i64> {
    Ok(self.read(|s| s.last_global_sync))
  }

  async fn set_last_global_sync(&self, ts: i64) -> Result<()> {
    self.write(|s, _, _| {
      s.last_global_sync = ts;
      Ok(())
    })
  }

  async fn snapshot(&self) -> Result<StoreState> { Ok(self.read(StoreState::clone)) }
}

// ─── MemoryCacheStorage ──────────────────────────────────────────────────────

/// Named in-memory blob caches. Opening the same name twice yields handles
/// onto the same entries.
#[derive(Clone, Default)]
pub struct MemoryCacheStorage {
  caches: Arc<Mutex<HashMap<String, MemoryBlobCache>>>,
}

impl CacheStorage for MemoryCacheStorage {
  type Cache = MemoryBlobCache;
  type Error = Infallible;

  async fn open(&self, name: &str) -> Result<MemoryBlobCache, Infallible> {
    let mut caches = self.caches.lock().unwrap_or_else(PoisonError::into_inner);
    Ok(caches.entry(name.to_owned()).or_default().clone())
  }
}

/// One in-memory named cache. Cloning shares the entries.
#[derive(Clone, Default)]
pub struct MemoryBlobCache {
  entries: Arc<Mutex<BTreeMap<String, CachedResource>>>,
}

impl MemoryBlobCache {
  fn guard(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, CachedResource>> {
    self.entries.lock().unwrap_or_else(PoisonError::into_inner)
  }
}

impl BlobCache for MemoryBlobCache {
  type Error = Infallible;

  async fn put(&self, entry: CachedResource) -> Result<(), Infallible> {
    self.guard().insert(entry.url.clone(), entry);
    Ok(())
  }

  async fn get(&self, url: &str) -> Result<Option<CachedResource>, Infallible> {
    Ok(self.guard().get(url).cloned())
  }

  async fn delete(&self, url: &str) -> Result<bool, Infallible> {
    Ok(self.guard().remove(url).is_some())
  }

  async fn keys(&self) -> Result<Vec<String>, Infallible> {
    Ok(self.guard().keys().cloned().collect())
  }

  async fn entries(&self) -> Result<Vec<CachedEntryMeta>, Infallible> {
    Ok(self.guard().values().map(CachedEntryMeta::from).collect())
  }

  async fn clear(&self) -> Result<(), Infallible> {
    self.guard().clear();
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use bytes::Bytes;

  use super::*;
  use crate::{entity::Entity, now_ms, resource::ResourceType};

  #[tokio::test]
  async fn record_watering_generates_an_id() {
    let store = MemoryStore::new();
    store.add_plant(Plant::new("p1", "fern", 0)).await.unwrap();

    let record = store.record_watering("p1", None).await.unwrap();
    assert!(!record.id.is_empty());
    assert_eq!(store.incomplete_watering_records().await.unwrap().len(), 1);
    assert_eq!(
      store.list_watering_records_for_plant("p1").await.unwrap(),
      vec![record]
    );
  }

  #[tokio::test]
  async fn replace_entity_dispatches_on_kind() {
    let store = MemoryStore::new();
    store.add_plant(Plant::new("p1", "fern", 0)).await.unwrap();
    let record = store.record_watering("p1", Some("r1".into())).await.unwrap();

    let mut plant = Plant::new("p1", "fern", 0);
    plant.growth_value = 12;
    store.replace_entity(Entity::from(plant)).await.unwrap();
    let mut enriched = record.clone();
    enriched.memory_text = "rained all day".into();
    store.replace_entity(Entity::from(enriched)).await.unwrap();

    assert_eq!(store.get_plant("p1").await.unwrap().unwrap().growth_value, 12);
    let stored = store.get_watering_record("r1").await.unwrap().unwrap();
    assert_eq!(stored.memory_text, "rained all day");
  }

  #[tokio::test(start_paused = true)]
  async fn mutations_are_stamped_from_the_store_clock() {
    let ahead = now_ms() + 3_600_000;
    let store = MemoryStore::new().with_clock(Clock::starting_at(ahead));
    store.add_plant(Plant::new("p1", "fern", 0)).await.unwrap();

    let status = store.get_sync_status(EntityKind::Plant, "p1").await.unwrap();
    assert_eq!(status.last_modified, ahead);
    assert_eq!(store.now_ms(), ahead);
  }

  #[tokio::test]
  async fn with_state_resets_syncing() {
    let mut state = StoreState::default();
    state.set_sync_status(
      EntityKind::Watering,
      "r1",
      &SyncStatusPatch::default().syncing(true),
    );
    let store = MemoryStore::with_state(state);
    let status = store.get_sync_status(EntityKind::Watering, "r1").await.unwrap();
    assert!(!status.is_syncing);
  }

  #[tokio::test]
  async fn named_caches_share_entries() {
    let storage = MemoryCacheStorage::default();
    let a = storage.open("assets").await.unwrap();
    let b = storage.open("assets").await.unwrap();
    let other = storage.open("other").await.unwrap();

    a.put(CachedResource {
      key:           "pot_image".into(),
      url:           "/images/pot.png".into(),
      resource_type: ResourceType::Image,
      bytes:         Bytes::from_static(b"png"),
      cached_at:     1,
      size:          3,
      digest:        String::new(),
    })
    .await
    .unwrap();

    assert!(b.get("/images/pot.png").await.unwrap().is_some());
    assert!(other.keys().await.unwrap().is_empty());
    assert!(b.delete("/images/pot.png").await.unwrap());
    assert!(a.keys().await.unwrap().is_empty());
  }
}
