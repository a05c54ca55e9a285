//! [`StoreState`]: the whole persisted state of the entity store.
//!
//! Backends hold one `StoreState` and call its mutators; persistence is a
//! JSON snapshot of the whole value. All merge logic lives here so that
//! every backend applies exactly the same rules.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{
  Error, Result,
  completeness,
  entity::EntityKind,
  plant::{Plant, SyncTag},
  sync_status::{SyncStatus, SyncStatusPatch},
  watering::WateringRecord,
};

/// Fixed name the snapshot is persisted under.
pub const STORAGE_NAME: &str = "plant-storage";

/// Length of the force-expire window stamped on local mutations.
pub const DEFAULT_FORCE_EXPIRE_WINDOW_MS: i64 = 30_000;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreState {
  #[serde(default)]
  pub plants:                BTreeMap<String, Plant>,
  #[serde(default)]
  pub watering_records:      BTreeMap<String, WateringRecord>,
  #[serde(default)]
  pub plant_sync_status:     BTreeMap<String, SyncStatus>,
  #[serde(default)]
  pub watering_sync_status:  BTreeMap<String, SyncStatus>,
  /// Epoch ms of the last completed full sync.
  #[serde(default)]
  pub last_global_sync:      i64,
}

impl StoreState {
  // ── Persistence ───────────────────────────────────────────────────────────

  /// Rehydrate from a persisted snapshot. Liveness flags are reset.
  pub fn from_snapshot(json: &str) -> Result<Self> {
    let mut state: Self = serde_json::from_str(json)?;
    state.reset_liveness();
    Ok(state)
  }

  /// Serialise for persistence. `is_syncing` is always written as `false`.
  pub fn to_snapshot(&self) -> Result<String> {
    let mut persisted = self.clone();
    persisted.reset_liveness();
    Ok(serde_json::to_string(&persisted)?)
  }

  /// Clear every `is_syncing` flag.
  pub fn reset_liveness(&mut self) {
    self
      .plant_sync_status
      .values_mut()
      .chain(self.watering_sync_status.values_mut())
      .for_each(|s| s.is_syncing = false);
  }

  // ── Plants ────────────────────────────────────────────────────────────────

  pub fn plant(&self, id: &str) -> Option<&Plant> { self.plants.get(id) }

  pub fn add_plant(&mut self, plant: Plant, now: i64, window_ms: i64) -> Result<()> {
    if self.plants.contains_key(&plant.id) {
      return Err(Error::DuplicatePlant(plant.id));
    }
    let id = plant.id.clone();
    self.plants.insert(id.clone(), plant);
    self.stamp_modified(EntityKind::Plant, &id, now, window_ms);
    Ok(())
  }

  /// Apply a local edit to an existing plant.
  pub fn update_plant(&mut self, plant: Plant, now: i64, window_ms: i64) -> Result<()> {
    let Some(slot) = self.plants.get_mut(&plant.id) else {
      return Err(Error::PlantNotFound(plant.id));
    };
    let id = plant.id.clone();
    *slot = Plant { sync_status: SyncTag::Pending, ..plant };
    self.stamp_modified(EntityKind::Plant, &id, now, window_ms);
    Ok(())
  }

  /// Overwrite a plant with a server snapshot. Client sync bookkeeping on the
  /// entity is carried over; everything else comes from `snapshot`.
  pub fn replace_plant(&mut self, snapshot: Plant) {
    let (last_sync_time, sync_status) = self
      .plants
      .get(&snapshot.id)
      .map(|p| (p.last_sync_time, p.sync_status))
      .unwrap_or_default();
    self.plants.insert(
      snapshot.id.clone(),
      Plant { last_sync_time, sync_status, ..snapshot },
    );
  }

  pub fn remove_plant(&mut self, id: &str) -> Option<Plant> {
    self.plant_sync_status.remove(id);
    self.plants.remove(id)
  }

  /// Add `increment` to a plant's growth as a local action.
  pub fn apply_growth(
    &mut self,
    plant_id: &str,
    increment: i64,
    now: i64,
    window_ms: i64,
  ) -> Result<Plant> {
    let plant = self
      .plants
      .get_mut(plant_id)
      .ok_or_else(|| Error::PlantNotFound(plant_id.to_owned()))?;
    plant.grow(increment);
    plant.sync_status = SyncTag::Pending;
    let plant = plant.clone();
    self.stamp_modified(EntityKind::Plant, plant_id, now, window_ms);
    Ok(plant)
  }

  // ── Watering records ──────────────────────────────────────────────────────

  pub fn watering_record(&self, id: &str) -> Option<&WateringRecord> {
    self.watering_records.get(id)
  }

  pub fn watering_records_for_plant(&self, plant_id: &str) -> Vec<WateringRecord> {
    self
      .watering_records
      .values()
      .filter(|r| r.plant_id == plant_id)
      .cloned()
      .collect()
  }

  /// Insert a locally-authored record. The record and its parent plant are
  /// both stamped as freshly modified.
  pub fn add_watering_record(
    &mut self,
    record: WateringRecord,
    now: i64,
    window_ms: i64,
  ) -> Result<()> {
    if self.watering_records.contains_key(&record.id) {
      return Err(Error::DuplicateWateringRecord(record.id));
    }
    let id = record.id.clone();
    let plant_id = record.plant_id.clone();
    let complete = completeness::is_complete(&record);
    self.watering_records.insert(id.clone(), record);

    self.stamp_modified(EntityKind::Watering, &id, now, window_ms);
    self.set_sync_status(
      EntityKind::Watering,
      &id,
      &SyncStatusPatch::default().complete(complete),
    );
    if let Some(plant) = self.plants.get_mut(&plant_id) {
      plant.sync_status = SyncTag::Pending;
      self.stamp_modified(EntityKind::Plant, &plant_id, now, window_ms);
    }
    Ok(())
  }

  /// Apply a local edit to an existing record.
  pub fn update_watering_record(
    &mut self,
    record: WateringRecord,
    now: i64,
    window_ms: i64,
  ) -> Result<()> {
    let Some(slot) = self.watering_records.get_mut(&record.id) else {
      return Err(Error::WateringRecordNotFound(record.id));
    };
    let id = record.id.clone();
    *slot = record;
    self.stamp_modified(EntityKind::Watering, &id, now, window_ms);
    Ok(())
  }

  /// Create and insert the record for a watering action on `plant_id`.
  pub fn record_watering(
    &mut self,
    plant_id: &str,
    record_id: String,
    now: i64,
    window_ms: i64,
  ) -> Result<WateringRecord> {
    let plant = self
      .plants
      .get_mut(plant_id)
      .ok_or_else(|| Error::PlantNotFound(plant_id.to_owned()))?;
    plant.last_watering_time = Some(now);
    let record =
      WateringRecord::new_local(record_id, plant_id, plant.growth_value, now);
    self.add_watering_record(record.clone(), now, window_ms)?;
    Ok(record)
  }

  /// Overwrite a record with a server snapshot.
  pub fn replace_watering_record(&mut self, snapshot: WateringRecord) {
    self.watering_records.insert(snapshot.id.clone(), snapshot);
  }

  pub fn remove_watering_record(&mut self, id: &str) -> Option<WateringRecord> {
    self.watering_sync_status.remove(id);
    self.watering_records.remove(id)
  }

  /// Records the completeness predicate rejects, oldest watering first.
  pub fn incomplete_watering_records(&self) -> Vec<WateringRecord> {
    let mut records: Vec<_> = self
      .watering_records
      .values()
      .filter(|r| !completeness::is_complete(r))
      .cloned()
      .collect();
    records.sort_by_key(|r| r.watering_time);
    records
  }

  // ── Sync status ───────────────────────────────────────────────────────────

  fn status_table(&self, kind: EntityKind) -> &BTreeMap<String, SyncStatus> {
    match kind {
      EntityKind::Plant => &self.plant_sync_status,
      EntityKind::Watering => &self.watering_sync_status,
    }
  }

  fn status_table_mut(&mut self, kind: EntityKind) -> &mut BTreeMap<String, SyncStatus> {
    match kind {
      EntityKind::Plant => &mut self.plant_sync_status,
      EntityKind::Watering => &mut self.watering_sync_status,
    }
  }

  /// The status for `(kind, id)`, or the default status for unknown ids.
  pub fn sync_status(&self, kind: EntityKind, id: &str) -> SyncStatus {
    self.status_table(kind).get(id).cloned().unwrap_or_default()
  }

  /// Merge `patch` into the status for `(kind, id)`.
  ///
  /// For plants, `last_sync` and `is_complete` are mirrored onto the entity's
  /// own `last_sync_time` / `sync_status` fields.
  pub fn set_sync_status(&mut self, kind: EntityKind, id: &str, patch: &SyncStatusPatch) {
    self
      .status_table_mut(kind)
      .entry(id.to_owned())
      .or_default()
      .apply(patch);

    if kind == EntityKind::Plant
      && let Some(plant) = self.plants.get_mut(id)
    {
      if let Some(ts) = patch.last_sync {
        plant.last_sync_time = ts;
      }
      if let Some(complete) = patch.is_complete {
        plant.sync_status = if complete { SyncTag::Complete } else { SyncTag::Pending };
      }
    }
  }

  fn stamp_modified(&mut self, kind: EntityKind, id: &str, now: i64, window_ms: i64) {
    self.set_sync_status(
      kind,
      id,
      &SyncStatusPatch::default().modified(now, now.saturating_add(window_ms)),
    );
  }

  /// Number of watering records whose retries are exhausted.
  pub fn failed_count(&self) -> usize {
    self.watering_sync_status.values().filter(|s| s.is_failed).count()
  }
}
