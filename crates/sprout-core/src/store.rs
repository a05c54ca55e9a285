//! The `EntityStore` trait: the single source of truth for plants, watering
//! records, and their sync status.
//!
//! The trait is implemented by [`crate::memory::MemoryStore`] and by storage
//! backends (e.g. `sprout-store-sqlite`). The sync orchestrator and the
//! bootstrap depend on this abstraction and mutate state only through it.

use std::future::Future;

use crate::{
  entity::{Entity, EntityKind},
  plant::Plant,
  state::StoreState,
  sync_status::{SyncStatus, SyncStatusPatch},
  watering::WateringRecord,
};

/// Abstraction over an entity store backend.
///
/// Local mutations (`add_*`, `update_*`, `record_watering`, `apply_growth`)
/// stamp `last_modified` and a force-expire window. Sync overwrites
/// (`replace_*`) do not.
///
/// All methods return `Send` futures so the trait can be used from spawned
/// tokio tasks.
pub trait EntityStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Epoch ms from the clock local mutations are stamped with. Sync
  /// bookkeeping reads the same clock so the two stay comparable.
  fn now_ms(&self) -> i64;

  // ── Plants ────────────────────────────────────────────────────────────────

  fn get_plant<'a>(
    &'a self,
    id: &'a str,
  ) -> impl Future<Output = Result<Option<Plant>, Self::Error>> + Send + 'a;

  fn list_plants(
    &self,
  ) -> impl Future<Output = Result<Vec<Plant>, Self::Error>> + Send + '_;

  /// Insert a new plant. Fails if the id is already present.
  fn add_plant(
    &self,
    plant: Plant,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Apply a local edit to an existing plant.
  fn update_plant(
    &self,
    plant: Plant,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Overwrite a plant with a fetched server snapshot.
  fn replace_plant(
    &self,
    snapshot: Plant,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  fn remove_plant<'a>(
    &'a self,
    id: &'a str,
  ) -> impl Future<Output = Result<Option<Plant>, Self::Error>> + Send + 'a;

  /// Add `increment` to a plant's growth value as a local action.
  fn apply_growth<'a>(
    &'a self,
    plant_id: &'a str,
    increment: i64,
  ) -> impl Future<Output = Result<Plant, Self::Error>> + Send + 'a;

  // ── Watering records ──────────────────────────────────────────────────────

  fn get_watering_record<'a>(
    &'a self,
    id: &'a str,
  ) -> impl Future<Output = Result<Option<WateringRecord>, Self::Error>> + Send + 'a;

  fn list_watering_records(
    &self,
  ) -> impl Future<Output = Result<Vec<WateringRecord>, Self::Error>> + Send + '_;

  fn list_watering_records_for_plant<'a>(
    &'a self,
    plant_id: &'a str,
  ) -> impl Future<Output = Result<Vec<WateringRecord>, Self::Error>> + Send + 'a;

  /// Insert a locally-authored record; also stamps its parent plant.
  fn add_watering_record(
    &self,
    record: WateringRecord,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  fn update_watering_record(
    &self,
    record: WateringRecord,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Create the record for a watering action on `plant_id`, with empty
  /// enrichment fields. `record_id` is generated when `None`.
  fn record_watering<'a>(
    &'a self,
    plant_id: &'a str,
    record_id: Option<String>,
  ) -> impl Future<Output = Result<WateringRecord, Self::Error>> + Send + 'a;

  /// Overwrite a record with a fetched server snapshot.
  fn replace_watering_record(
    &self,
    snapshot: WateringRecord,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Overwrite whichever entity `snapshot` tags with the fetched server copy.
  fn replace_entity(
    &self,
    snapshot: Entity,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_ {
    async move {
      match snapshot {
        Entity::Plant(plant) => self.replace_plant(plant).await,
        Entity::Watering(record) => self.replace_watering_record(record).await,
      }
    }
  }

  fn remove_watering_record<'a>(
    &'a self,
    id: &'a str,
  ) -> impl Future<Output = Result<Option<WateringRecord>, Self::Error>> + Send + 'a;

  /// Records whose enrichment is still incomplete, oldest first.
  fn incomplete_watering_records(
    &self,
  ) -> impl Future<Output = Result<Vec<WateringRecord>, Self::Error>> + Send + '_;

  // ── Sync status ───────────────────────────────────────────────────────────

  /// The status for `(kind, id)`; unknown ids yield the default status.
  fn get_sync_status<'a>(
    &'a self,
    kind: EntityKind,
    id: &'a str,
  ) -> impl Future<Output = Result<SyncStatus, Self::Error>> + Send + 'a;

  /// Merge `patch` into the status for `(kind, id)`.
  fn set_sync_status<'a>(
    &'a self,
    kind: EntityKind,
    id: &'a str,
    patch: SyncStatusPatch,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  fn last_global_sync(
    &self,
  ) -> impl Future<Output = Result<i64, Self::Error>> + Send + '_;

  fn set_last_global_sync(
    &self,
    ts: i64,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// A point-in-time copy of the whole state, for read-only views.
  fn snapshot(
    &self,
  ) -> impl Future<Output = Result<StoreState, Self::Error>> + Send + '_;
}
