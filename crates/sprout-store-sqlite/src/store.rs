//! [`SqliteStore`]: the SQLite implementation of [`EntityStore`].

use std::{path::Path, sync::Arc};

use chrono::Utc;
use rusqlite::OptionalExtension as _;
use sprout_core::{
  Clock,
  entity::EntityKind,
  plant::Plant,
  state::{DEFAULT_FORCE_EXPIRE_WINDOW_MS, STORAGE_NAME, StoreState},
  store::EntityStore,
  sync_status::{SyncStatus, SyncStatusPatch},
  watering::WateringRecord,
};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::{
  Result,
  blob_cache::SqliteCacheStorage,
  encode::encode_dt,
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// An entity store persisted as a JSON snapshot in a single SQLite file.
///
/// The working state lives in memory; every mutation is applied to a copy,
/// written through to the `kv_store` table, and only then made visible.
/// Cloning is cheap; the connection and state are reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn:                   tokio_rusqlite::Connection,
  state:                  Arc<Mutex<StoreState>>,
  clock:                  Clock,
  force_expire_window_ms: i64,
}

impl SqliteStore {
  /// Open (or create) a store at `path`, run schema initialisation, and
  /// rehydrate the persisted snapshot.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    Self::from_connection(conn).await
  }

  /// Open an in-memory store for tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    Self::from_connection(conn).await
  }

  async fn from_connection(conn: tokio_rusqlite::Connection) -> Result<Self> {
    conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;

    let state = Self::load(&conn).await?;
    tracing::debug!(
      plants = state.plants.len(),
      watering_records = state.watering_records.len(),
      "rehydrated entity store"
    );

    Ok(Self {
      conn,
      state: Arc::new(Mutex::new(state)),
      clock: Clock::new(),
      force_expire_window_ms: DEFAULT_FORCE_EXPIRE_WINDOW_MS,
    })
  }

  /// Override the force-expire window stamped on local mutations.
  pub fn with_force_expire_window(mut self, window_ms: i64) -> Self {
    self.force_expire_window_ms = window_ms;
    self
  }

  /// Named blob caches stored in the same database file.
  pub fn cache_storage(&self) -> SqliteCacheStorage {
    SqliteCacheStorage::from_connection(self.conn.clone())
  }

  async fn load(conn: &tokio_rusqlite::Connection) -> Result<StoreState> {
    let snapshot: Option<String> = conn
      .call(|conn| {
        Ok(
          conn
            .query_row(
              "SELECT snapshot FROM kv_store WHERE name = ?1",
              rusqlite::params![STORAGE_NAME],
              |row| row.get(0),
            )
            .optional()?,
        )
      })
      .await?;

    match snapshot {
      Some(json) => Ok(StoreState::from_snapshot(&json)?),
      None => Ok(StoreState::default()),
    }
  }

  async fn persist(&self, snapshot: String) -> Result<()> {
    let at_str = encode_dt(Utc::now());
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO kv_store (name, snapshot, updated_at) VALUES (?1, ?2, ?3)
           ON CONFLICT(name) DO UPDATE
             SET snapshot = excluded.snapshot, updated_at = excluded.updated_at",
          rusqlite::params![STORAGE_NAME, snapshot, at_str],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn read<T>(&self, f: impl FnOnce(&StoreState) -> T) -> T {
    f(&*self.state.lock().await)
  }

  /// Apply `f` to a copy of the state, persist the copy, then publish it.
  /// A failed write leaves the visible state untouched.
  async fn write<T>(
    &self,
    f: impl FnOnce(&mut StoreState, i64, i64) -> sprout_core::Result<T> + Send,
  ) -> Result<T>
  where
    T: Send,
  {
    let mut state = self.state.lock().await;
    let mut next = state.clone();
    let out = f(&mut next, self.clock.now_ms(), self.force_expire_window_ms)?;
    self.persist(next.to_snapshot()?).await?;
    *state = next;
    Ok(out)
  }
}

// ─── EntityStore impl ────────────────────────────────────────────────────────

impl EntityStore for SqliteStore {
  type Error = crate::Error;

  fn now_ms(&self) -> i64 { self.clock.now_ms() }

  // ── Plants ────────────────────────────────────────────────────────────────

  async fn get_plant(&self, id: &str) -> Result<Option<Plant>> {
    Ok(self.read(|s| s.plant(id).cloned()).await)
  }

  async fn list_plants(&self) -> Result<Vec<Plant>> {
    Ok(self.read(|s| s.plants.values().cloned().collect()).await)
  }

  async fn add_plant(&self, plant: Plant) -> Result<()> {
    self.write(|s, now, window| s.add_plant(plant, now, window)).await
  }

  async fn update_plant(&self, plant: Plant) -> Result<()> {
    self.write(|s, now, window| s.update_plant(plant, now, window)).await
  }

  async fn replace_plant(&self, snapshot: Plant) -> Result<()> {
    self
      .write(|s, _, _| {
        s.replace_plant(snapshot);
        Ok(())
      })
      .await
  }

  async fn remove_plant(&self, id: &str) -> Result<Option<Plant>> {
    self.write(|s, _, _| Ok(s.remove_plant(id))).await
  }

  async fn apply_growth(&self, plant_id: &str, increment: i64) -> Result<Plant> {
    self
      .write(|s, now, window| s.apply_growth(plant_id, increment, now, window))
      .await
  }

  // ── Watering records ──────────────────────────────────────────────────────

  async fn get_watering_record(&self, id: &str) -> Result<Option<WateringRecord>> {
    Ok(self.read(|s| s.watering_record(id).cloned()).await)
  }

  async fn list_watering_records(&self) -> Result<Vec<WateringRecord>> {
    Ok(self.read(|s| s.watering_records.values().cloned().collect()).await)
  }

  async fn list_watering_records_for_plant(
    &self,
    plant_id: &str,
  ) -> Result<Vec<WateringRecord>> {
    Ok(self.read(|s| s.watering_records_for_plant(plant_id)).await)
  }

  async fn add_watering_record(&self, record: WateringRecord) -> Result<()> {
    self
      .write(|s, now, window| s.add_watering_record(record, now, window))
      .await
  }

  async fn update_watering_record(&self, record: WateringRecord) -> Result<()> {
    self
      .write(|s, now, window| s.update_watering_record(record, now, window))
      .await
  }

  async fn record_watering(
    &self,
    plant_id: &str,
    record_id: Option<String>,
  ) -> Result<WateringRecord> {
    let record_id = record_id.unwrap_or_else(|| Uuid::new_v4().to_string());
    self
      .write(|s, now, window| s.record_watering(plant_id, record_id, now, window))
      .await
  }

  async fn replace_watering_record(&self, snapshot: WateringRecord) -> Result<()> {
    self
      .write(|s, _, _| {
        s.replace_watering_record(snapshot);
        Ok(())
      })
      .await
  }

  async fn remove_watering_record(&self, id: &str) -> Result<Option<WateringRecord>> {
    self.write(|s, _, _| Ok(s.remove_watering_record(id))).await
  }

  async fn incomplete_watering_records(&self) -> Result<Vec<WateringRecord>> {
    Ok(self.read(StoreState::incomplete_watering_records).await)
  }

  // ── Sync status ───────────────────────────────────────────────────────────

  async fn get_sync_status(&self, kind: EntityKind, id: &str) -> Result<SyncStatus> {
    Ok(self.read(|s| s.sync_status(kind, id)).await)
  }

  async fn set_sync_status(
    &self,
    kind: EntityKind,
    id: &str,
    patch: SyncStatusPatch,
  ) -> Result<()> {
    self
      .write(|s, _, _| {
        s.set_sync_status(kind, id, &patch);
        Ok(())
      })
      .await
  }

  async fn last_global_sync(&self) -> Result<i64> {
    Ok(self.read(|s| s.last_global_sync).await)
  }

  async fn set_last_global_sync(&self, ts: i64) -> Result<()> {
    self
      .write(|s, _, _| {
        s.last_global_sync = ts;
        Ok(())
      })
      .await
  }

  async fn snapshot(&self) -> Result<StoreState> {
    Ok(self.read(StoreState::clone).await)
  }
}
