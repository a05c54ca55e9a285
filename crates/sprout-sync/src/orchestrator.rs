//! [`SyncOrchestrator`]: reconciles local entities with the server.
//!
//! Watering records are polled until the server's enrichment pipeline has
//! filled them in, one retry timer per record at most. A record reaching
//! completeness cascades into a sync of its parent plant. Concurrent syncs
//! of the same plant, or polls of the same record, share a single fetch.

use std::{
  collections::HashMap,
  sync::{
    Arc, Mutex, MutexGuard, PoisonError,
    atomic::{AtomicBool, AtomicU64, Ordering},
  },
  time::Duration,
};

use serde::Serialize;
use sprout_core::{
  completeness,
  entity::{Entity, EntityKind},
  plant::OFFLINE_ID_PREFIX,
  remote::{Connectivity, RemoteSource},
  store::EntityStore,
  sync_status::{SyncStatus, SyncStatusPatch},
  watering::WateringRecord,
};
use tokio::{sync::watch, task::AbortHandle};
use tracing::{debug, info, warn};

use crate::{
  Result, SyncError,
  config::SyncConfig,
  flight::Flights,
  notify::{NotificationKind, Notifier},
};

// ─── Views ───────────────────────────────────────────────────────────────────

/// Global sync state exposed to the UI.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncState {
  pub is_syncing:     bool,
  /// Epoch ms of the last completed full sync.
  pub last_sync_time: i64,
  pub error:          Option<String>,
  /// Watering records waiting on a manual retry.
  pub failed_count:   usize,
}

/// What one watering-record sync attempt did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordSyncOutcome {
  /// No such record locally.
  Missing,
  /// Already enriched; nothing was fetched.
  AlreadyComplete,
  /// Enrichment arrived on this attempt.
  Completed,
  /// Still incomplete; a retry is scheduled.
  Pending,
  /// Offline; picked up again on reconnect.
  Deferred,
  /// Retries are exhausted; only a manual retry resumes polling.
  Exhausted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlantSyncOutcome {
  /// The server snapshot differed and replaced local state.
  Updated,
  /// The server agreed with local state.
  Unchanged,
  /// The server agreed, but local state is inside its force-expire window,
  /// so the plant stays pending and is re-checked when the window closes.
  Unconfirmed,
  /// Offline placeholders have no server counterpart.
  Skipped,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FullSyncReport {
  pub plants_synced:   usize,
  pub plants_failed:   usize,
  pub plants_skipped:  usize,
  pub records_synced:  usize,
  pub records_failed:  usize,
  pub finished_at:     i64,
}

impl FullSyncReport {
  pub fn has_failures(&self) -> bool { self.plants_failed + self.records_failed > 0 }
}

// ─── Internals ───────────────────────────────────────────────────────────────

type Timers = Mutex<HashMap<String, Timer>>;

/// A sleeping task; it only acts if its generation is still the live one.
struct Timer {
  generation: u64,
  handle:     AbortHandle,
}

/// A fetched record merged into local state.
struct Merged {
  record:       WateringRecord,
  was_complete: bool,
}

// ─── Orchestrator ────────────────────────────────────────────────────────────

pub struct SyncOrchestrator<S, R> {
  store:             Arc<S>,
  remote:            Arc<R>,
  config:            SyncConfig,
  connectivity:      watch::Receiver<Connectivity>,
  notifier:          Notifier,
  state:             watch::Sender<SyncState>,
  retry_timers:      Timers,
  plant_timers:      Timers,
  next_generation:   AtomicU64,
  plant_syncs:       Flights<Result<PlantSyncOutcome>>,
  record_polls:      Flights<Result<RecordSyncOutcome>>,
  full_sync_running: AtomicBool,
}

impl<S, R> SyncOrchestrator<S, R>
where
  S: EntityStore + 'static,
  R: RemoteSource + 'static,
{
  pub fn new(
    store: Arc<S>,
    remote: Arc<R>,
    config: SyncConfig,
    connectivity: watch::Receiver<Connectivity>,
    notifier: Notifier,
  ) -> Arc<Self> {
    let (state, _) = watch::channel(SyncState::default());
    Arc::new(Self {
      store,
      remote,
      config,
      connectivity,
      notifier,
      state,
      retry_timers: Mutex::new(HashMap::new()),
      plant_timers: Mutex::new(HashMap::new()),
      next_generation: AtomicU64::new(0),
      plant_syncs: Flights::default(),
      record_polls: Flights::default(),
      full_sync_running: AtomicBool::new(false),
    })
  }

  // ── Views ─────────────────────────────────────────────────────────────────

  pub fn sync_state(&self) -> SyncState { self.state.borrow().clone() }

  pub fn subscribe_state(&self) -> watch::Receiver<SyncState> { self.state.subscribe() }

  pub fn pending_retry_count(&self) -> usize { self.timers().len() }

  pub fn has_pending_retry(&self, record_id: &str) -> bool {
    self.timers().contains_key(record_id)
  }

  /// Plant syncs waiting on a cascade delay or a fresh-window re-check.
  pub fn pending_plant_sync_count(&self) -> usize { lock(&self.plant_timers).len() }

  pub fn is_online(&self) -> bool { self.connectivity.borrow().is_online() }

  /// Seed the published state from the store after a restart.
  pub async fn load_state(&self) -> Result<SyncState> {
    let last = self.store.last_global_sync().await.map_err(SyncError::store)?;
    let snapshot = self.store.snapshot().await.map_err(SyncError::store)?;
    let failed = snapshot.failed_count();
    self.state.send_modify(|s| {
      s.last_sync_time = last;
      s.failed_count = failed;
    });
    Ok(self.sync_state())
  }

  // ── Watering records ──────────────────────────────────────────────────────

  /// Begin (or continue) polling a watering record until it is enriched.
  ///
  /// Complete or unknown records are left alone without touching the
  /// network. Otherwise one poll runs immediately and, if the record is
  /// still incomplete, a single retry timer is armed.
  pub async fn start_watering_record_sync(
    self: &Arc<Self>,
    record_id: &str,
  ) -> Result<RecordSyncOutcome> {
    let local = self
      .store
      .get_watering_record(record_id)
      .await
      .map_err(SyncError::store)?;
    let Some(local) = local else {
      self.cancel_retry(record_id);
      return Ok(RecordSyncOutcome::Missing);
    };
    if completeness::is_complete(&local) {
      self.cancel_retry(record_id);
      return Ok(RecordSyncOutcome::AlreadyComplete);
    }
    if self.status(EntityKind::Watering, record_id).await?.is_failed {
      debug!(record = record_id, "retries exhausted; waiting for a manual retry");
      return Ok(RecordSyncOutcome::Exhausted);
    }
    self.poll_watering_record(record_id).await
  }

  /// Clear a record's failure state and poll it again.
  pub async fn retry_watering_record_sync(
    self: &Arc<Self>,
    record_id: &str,
  ) -> Result<RecordSyncOutcome> {
    self.ensure_online("manual retry")?;
    let exists = self
      .store
      .get_watering_record(record_id)
      .await
      .map_err(SyncError::store)?
      .is_some();
    if !exists {
      return Ok(RecordSyncOutcome::Missing);
    }

    info!(record = record_id, "manual retry requested");
    self
      .patch(
        EntityKind::Watering,
        record_id,
        SyncStatusPatch::default()
          .failed(false)
          .retry_count(0)
          .failure_count(0)
          .clear_error(),
      )
      .await?;
    self.refresh_failed_count().await?;
    self.start_watering_record_sync(record_id).await
  }

  /// Re-run [`Self::start_watering_record_sync`] for every incomplete
  /// record. Returns how many are now actively polling.
  pub async fn restart_pending_syncs(self: &Arc<Self>) -> Result<usize> {
    let pending = self
      .store
      .incomplete_watering_records()
      .await
      .map_err(SyncError::store)?;

    let mut restarted = 0;
    for record in pending {
      match self.start_watering_record_sync(&record.id).await {
        Ok(RecordSyncOutcome::Pending | RecordSyncOutcome::Completed) => restarted += 1,
        Ok(_) => {}
        Err(e) => warn!(record = %record.id, error = %e, "could not restart sync"),
      }
    }
    info!(restarted, "restarted pending watering-record syncs");
    Ok(restarted)
  }

  /// Poll once, or join a poll of the same record already in flight so
  /// that overlapping callers cannot double-count a retry.
  async fn poll_watering_record(self: &Arc<Self>, record_id: &str) -> Result<RecordSyncOutcome> {
    self
      .record_polls
      .run(record_id, self.poll_once(record_id))
      .await
      .unwrap_or_else(|| Err(SyncError::Abandoned(record_id.to_owned())))
  }

  async fn poll_once(self: &Arc<Self>, record_id: &str) -> Result<RecordSyncOutcome> {
    if !self.is_online() {
      debug!(record = record_id, "offline; poll deferred until reconnect");
      return Ok(RecordSyncOutcome::Deferred);
    }

    self
      .patch(EntityKind::Watering, record_id, SyncStatusPatch::default().syncing(true))
      .await?;
    let fetched = self.remote.get_watering_record_by_id(record_id).await;
    let status = self.status(EntityKind::Watering, record_id).await?;
    let now = self.store.now_ms();
    let max_retries = self.config.max_retries;

    let snapshot = match fetched {
      Ok(snapshot) => snapshot,
      Err(e) => {
        let failure_count = status.failure_count.saturating_add(1);
        warn!(record = record_id, failure_count, error = %e, "watering record fetch failed");
        self
          .patch(
            EntityKind::Watering,
            record_id,
            SyncStatusPatch::default()
              .syncing(false)
              .error(e.to_string())
              .failure_count(failure_count)
              .max_retries(max_retries),
          )
          .await?;
        return self.reschedule_or_fail(record_id).await;
      }
    };

    let Some(merged) = self.merge_watering_record(snapshot).await? else {
      self.cancel_retry(record_id);
      self
        .patch(EntityKind::Watering, record_id, SyncStatusPatch::default().syncing(false))
        .await?;
      return Ok(RecordSyncOutcome::Missing);
    };

    if completeness::is_complete(&merged.record) {
      self.mark_record_complete(&merged.record, now).await?;
      return Ok(RecordSyncOutcome::Completed);
    }

    let retry_count = status.retry_count.saturating_add(1);
    debug!(
      record = record_id,
      retry_count,
      missing = ?completeness::missing_fields(&merged.record),
      "watering record still incomplete"
    );
    self
      .patch(
        EntityKind::Watering,
        record_id,
        SyncStatusPatch::default()
          .syncing(false)
          .synced_at(now)
          .complete(false)
          .clear_error()
          .retry_count(retry_count)
          .max_retries(max_retries),
      )
      .await?;
    self.reschedule_or_fail(record_id).await
  }

  /// Apply a fetched record to local state.
  ///
  /// Unchanged snapshots are ignored. An incomplete snapshot never replaces
  /// a complete local record. Returns `None` if the record is gone locally.
  async fn merge_watering_record(&self, snapshot: WateringRecord) -> Result<Option<Merged>> {
    let local = self
      .store
      .get_watering_record(&snapshot.id)
      .await
      .map_err(SyncError::store)?;
    let Some(local) = local else {
      return Ok(None);
    };
    let was_complete = completeness::is_complete(&local);

    let fetched = Entity::from(snapshot.clone());
    if !Entity::from(local.clone()).has_changed(&fetched) {
      return Ok(Some(Merged { record: local, was_complete }));
    }
    if was_complete && !completeness::is_complete(&snapshot) {
      warn!(record = %local.id, "ignoring incomplete snapshot of an enriched record");
      return Ok(Some(Merged { record: local, was_complete }));
    }

    self.store.replace_entity(fetched).await.map_err(SyncError::store)?;
    debug!(record = %snapshot.id, "watering record replaced from server");
    Ok(Some(Merged { record: snapshot, was_complete }))
  }

  async fn mark_record_complete(self: &Arc<Self>, record: &WateringRecord, now: i64) -> Result<()> {
    self.cancel_retry(&record.id);
    self
      .patch(
        EntityKind::Watering,
        &record.id,
        SyncStatusPatch::default()
          .syncing(false)
          .synced_at(now)
          .complete(true)
          .clear_error()
          .retry_count(0)
          .failure_count(0)
          .failed(false),
      )
      .await?;

    info!(record = %record.id, plant = %record.plant_id, "watering record enriched");
    self.notifier.emit(
      NotificationKind::Success,
      "Memory ready",
      format!("The memory from watering plant {} is ready", record.plant_id),
    );
    self.schedule_plant_sync(record.plant_id.clone(), self.config.cascade_delay(), "cascade");
    Ok(())
  }

  async fn reschedule_or_fail(self: &Arc<Self>, record_id: &str) -> Result<RecordSyncOutcome> {
    let status = self.status(EntityKind::Watering, record_id).await?;
    if !status.retries_exhausted() {
      self.schedule_retry(record_id);
      return Ok(RecordSyncOutcome::Pending);
    }

    self.cancel_retry(record_id);
    let mut reason = format!(
      "gave up after {} incomplete polls and {} failed requests",
      status.retry_count, status.failure_count
    );
    if let Some(last) = &status.error {
      reason.push_str(&format!(" (last error: {last})"));
    }
    warn!(record = record_id, %reason, "watering record sync exhausted");
    self
      .patch(
        EntityKind::Watering,
        record_id,
        SyncStatusPatch::default().failed(true).error(reason),
      )
      .await?;
    self.notifier.emit(
      NotificationKind::Error,
      "Sync failed",
      format!("Watering record {record_id} could not be completed. Retry it to try again."),
    );
    self.refresh_failed_count().await?;
    Ok(RecordSyncOutcome::Exhausted)
  }

  // ── Retry timers ──────────────────────────────────────────────────────────

  /// Arm the retry timer for `record_id`, cancelling any existing one.
  fn schedule_retry(self: &Arc<Self>, record_id: &str) {
    let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
    let delay = self.config.retry_interval();

    let mut timers = self.timers();
    if let Some(previous) = timers.remove(record_id) {
      previous.handle.abort();
    }
    let this = Arc::clone(self);
    let id = record_id.to_owned();
    let task = tokio::spawn(async move {
      tokio::time::sleep(delay).await;
      this.fire_retry(id, generation).await;
    });
    timers.insert(record_id.to_owned(), Timer {
      generation,
      handle: task.abort_handle(),
    });
    debug!(record = record_id, delay_secs = delay.as_secs(), "retry scheduled");
  }

  async fn fire_retry(self: Arc<Self>, record_id: String, generation: u64) {
    if !take_if_live(&self.retry_timers, &record_id, generation) {
      return;
    }

    debug!(record = %record_id, "retry timer fired");
    if let Err(e) = self.start_watering_record_sync(&record_id).await {
      warn!(record = %record_id, error = %e, "scheduled retry failed");
    }
  }

  /// Returns whether a timer was live.
  fn cancel_retry(&self, record_id: &str) -> bool {
    match self.timers().remove(record_id) {
      Some(timer) => {
        timer.handle.abort();
        true
      }
      None => false,
    }
  }

  /// Cancel every retry timer and scheduled plant sync. Call on shutdown.
  pub fn cleanup(&self) {
    let retries = abort_all(&self.retry_timers);
    let plants = abort_all(&self.plant_timers);
    debug!(retries, plants, "cancelled timers");
  }

  fn timers(&self) -> MutexGuard<'_, HashMap<String, Timer>> { lock(&self.retry_timers) }

  // ── Plants ────────────────────────────────────────────────────────────────

  /// User-initiated plant refresh.
  pub async fn sync_plant_now(self: &Arc<Self>, plant_id: &str) -> Result<PlantSyncOutcome> {
    self.ensure_online("plant sync")?;
    self.sync_single_plant(plant_id).await
  }

  /// Fetch one plant and reconcile it with local state.
  ///
  /// A caller arriving while a sync of the same plant is in flight waits for
  /// that sync's result instead of issuing a second request.
  pub async fn sync_single_plant(self: &Arc<Self>, plant_id: &str) -> Result<PlantSyncOutcome> {
    self
      .plant_syncs
      .run(plant_id, self.fetch_and_merge_plant(plant_id))
      .await
      .unwrap_or_else(|| Err(SyncError::Abandoned(plant_id.to_owned())))
  }

  async fn fetch_and_merge_plant(self: &Arc<Self>, plant_id: &str) -> Result<PlantSyncOutcome> {
    if plant_id.starts_with(OFFLINE_ID_PREFIX) {
      return Ok(PlantSyncOutcome::Skipped);
    }

    self
      .patch(EntityKind::Plant, plant_id, SyncStatusPatch::default().syncing(true))
      .await?;
    let fetched = match self.remote.get_plant_by_id(plant_id).await {
      Ok(plant) => plant,
      Err(e) => {
        warn!(plant = plant_id, error = %e, "plant fetch failed");
        self
          .patch(
            EntityKind::Plant,
            plant_id,
            SyncStatusPatch::default().syncing(false).error(e.to_string()),
          )
          .await?;
        return Err(e.into());
      }
    };

    let now = self.store.now_ms();
    let local = self.store.get_plant(plant_id).await.map_err(SyncError::store)?;
    let status = self.status(EntityKind::Plant, plant_id).await?;
    let fetched = Entity::from(fetched);
    let changed = local
      .map(Entity::from)
      .is_none_or(|l| l.has_changed(&fetched));

    if changed {
      self.store.replace_entity(fetched).await.map_err(SyncError::store)?;
    }
    let confirmed = changed || !status.is_fresh(now);
    self
      .patch(
        EntityKind::Plant,
        plant_id,
        SyncStatusPatch::default()
          .syncing(false)
          .synced_at(now)
          .complete(confirmed)
          .clear_error(),
      )
      .await?;

    if changed {
      info!(plant = plant_id, "plant updated from server");
      return Ok(PlantSyncOutcome::Updated);
    }
    if confirmed {
      return Ok(PlantSyncOutcome::Unchanged);
    }

    let wait = u64::try_from(status.force_expire_until.saturating_sub(now)).unwrap_or(0);
    debug!(plant = plant_id, wait_ms = wait, "local plant still fresh; re-checking later");
    self.schedule_plant_sync(plant_id.to_owned(), Duration::from_millis(wait), "fresh-window recheck");
    Ok(PlantSyncOutcome::Unconfirmed)
  }

  /// Arm a delayed sync of `plant_id`, replacing any already scheduled.
  fn schedule_plant_sync(self: &Arc<Self>, plant_id: String, delay: Duration, reason: &'static str) {
    let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);

    let mut timers = lock(&self.plant_timers);
    if let Some(previous) = timers.remove(&plant_id) {
      previous.handle.abort();
    }
    let this = Arc::clone(self);
    let id = plant_id.clone();
    let task = tokio::spawn(async move {
      tokio::time::sleep(delay).await;
      this.fire_plant_sync(id, generation, reason).await;
    });
    timers.insert(plant_id, Timer {
      generation,
      handle: task.abort_handle(),
    });
  }

  async fn fire_plant_sync(self: Arc<Self>, plant_id: String, generation: u64, reason: &'static str) {
    if !take_if_live(&self.plant_timers, &plant_id, generation) {
      return;
    }

    match self.sync_single_plant(&plant_id).await {
      Ok(outcome) => debug!(plant = %plant_id, ?outcome, reason, "plant sync finished"),
      Err(e) => warn!(plant = %plant_id, error = %e, reason, "plant sync failed"),
    }
  }

  // ── Full sync ─────────────────────────────────────────────────────────────

  /// Reconcile every local plant and watering record with the server.
  pub async fn perform_full_sync(self: &Arc<Self>) -> Result<FullSyncReport> {
    self.ensure_online("full sync")?;
    if self.full_sync_running.swap(true, Ordering::AcqRel) {
      return Err(SyncError::InProgress);
    }
    self.state.send_modify(|s| {
      s.is_syncing = true;
      s.error = None;
    });
    info!("full sync started");

    let result = self.full_sync_pass().await;
    self.full_sync_running.store(false, Ordering::Release);

    let failed_count = match self.store.snapshot().await {
      Ok(snapshot) => snapshot.failed_count(),
      Err(_) => self.state.borrow().failed_count,
    };
    self.state.send_modify(|s| {
      s.is_syncing = false;
      s.failed_count = failed_count;
      match &result {
        Ok(report) => {
          s.last_sync_time = report.finished_at;
          s.error = report
            .has_failures()
            .then(|| "some entities could not be synced".to_owned());
        }
        Err(e) => s.error = Some(e.to_string()),
      }
    });

    match &result {
      Ok(report) if report.has_failures() => {
        warn!(?report, "full sync finished with failures");
        self.notifier.emit(
          NotificationKind::Warning,
          "Sync incomplete",
          format!(
            "{} plants and {} watering records could not be synced",
            report.plants_failed, report.records_failed
          ),
        );
      }
      Ok(report) => {
        info!(?report, "full sync finished");
        self.notifier.emit(NotificationKind::Success, "Sync complete", "Everything is up to date");
      }
      Err(e) => {
        warn!(error = %e, "full sync failed");
        self.notifier.emit(NotificationKind::Error, "Sync failed", e.to_string());
      }
    }
    result
  }

  async fn full_sync_pass(self: &Arc<Self>) -> Result<FullSyncReport> {
    let mut report = FullSyncReport::default();

    let plants = self.store.list_plants().await.map_err(SyncError::store)?;
    for plant in plants {
      if plant.is_offline_placeholder() {
        report.plants_skipped += 1;
        continue;
      }
      match self.sync_single_plant(&plant.id).await {
        Ok(_) => report.plants_synced += 1,
        Err(e) => {
          warn!(plant = %plant.id, error = %e, "plant failed during full sync");
          report.plants_failed += 1;
        }
      }
    }

    let records = self
      .store
      .list_watering_records()
      .await
      .map_err(SyncError::store)?;
    for record in records {
      match self.refresh_watering_record(&record.id).await {
        Ok(()) => report.records_synced += 1,
        Err(e) => {
          warn!(record = %record.id, error = %e, "watering record failed during full sync");
          report.records_failed += 1;
        }
      }
    }

    report.finished_at = self.store.now_ms();
    self
      .store
      .set_last_global_sync(report.finished_at)
      .await
      .map_err(SyncError::store)?;
    Ok(report)
  }

  /// One fetch-and-merge of a record, without touching its retry counters.
  async fn refresh_watering_record(self: &Arc<Self>, record_id: &str) -> Result<()> {
    self
      .patch(EntityKind::Watering, record_id, SyncStatusPatch::default().syncing(true))
      .await?;
    let snapshot = match self.remote.get_watering_record_by_id(record_id).await {
      Ok(snapshot) => snapshot,
      Err(e) => {
        self
          .patch(
            EntityKind::Watering,
            record_id,
            SyncStatusPatch::default().syncing(false).error(e.to_string()),
          )
          .await?;
        return Err(e.into());
      }
    };
    let now = self.store.now_ms();

    let Some(merged) = self.merge_watering_record(snapshot).await? else {
      self
        .patch(EntityKind::Watering, record_id, SyncStatusPatch::default().syncing(false))
        .await?;
      return Ok(());
    };
    if completeness::is_complete(&merged.record) {
      if merged.was_complete {
        self
          .patch(
            EntityKind::Watering,
            record_id,
            SyncStatusPatch::default()
              .syncing(false)
              .synced_at(now)
              .complete(true)
              .clear_error(),
          )
          .await?;
      } else {
        self.mark_record_complete(&merged.record, now).await?;
      }
      return Ok(());
    }

    self
      .patch(
        EntityKind::Watering,
        record_id,
        SyncStatusPatch::default()
          .syncing(false)
          .synced_at(now)
          .complete(false)
          .clear_error(),
      )
      .await?;
    let status = self.status(EntityKind::Watering, record_id).await?;
    // A poll in flight arms its own retry.
    let armed = self.has_pending_retry(record_id) || self.record_polls.is_running(record_id);
    if !status.is_failed && !armed {
      self.schedule_retry(record_id);
    }
    Ok(())
  }

  // ── Helpers ───────────────────────────────────────────────────────────────

  fn ensure_online(&self, action: &'static str) -> Result<()> {
    if self.is_online() {
      Ok(())
    } else {
      Err(SyncError::Offline(action))
    }
  }

  async fn status(&self, kind: EntityKind, id: &str) -> Result<SyncStatus> {
    self
      .store
      .get_sync_status(kind, id)
      .await
      .map_err(SyncError::store)
  }

  async fn patch(&self, kind: EntityKind, id: &str, patch: SyncStatusPatch) -> Result<()> {
    self
      .store
      .set_sync_status(kind, id, patch)
      .await
      .map_err(SyncError::store)
  }

  async fn refresh_failed_count(&self) -> Result<()> {
    let snapshot = self.store.snapshot().await.map_err(SyncError::store)?;
    let failed = snapshot.failed_count();
    self.state.send_modify(|s| s.failed_count = failed);
    Ok(())
  }
}

// ─── Timer maps ──────────────────────────────────────────────────────────────

fn lock(timers: &Timers) -> MutexGuard<'_, HashMap<String, Timer>> {
  timers.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Remove `id`'s timer if `generation` is still the live one. A mismatch
/// means it was superseded or cancelled.
fn take_if_live(timers: &Timers, id: &str, generation: u64) -> bool {
  let mut timers = lock(timers);
  if timers.get(id).map(|t| t.generation) != Some(generation) {
    return false;
  }
  timers.remove(id);
  true
}

/// Abort and forget every timer; returns how many there were.
fn abort_all(timers: &Timers) -> usize {
  let mut timers = lock(timers);
  let count = timers.len();
  for (_, timer) in timers.drain() {
    timer.handle.abort();
  }
  count
}
