//! Wires the SQLite store, the HTTP client, and the sync layer together and
//! implements each subcommand on top of the result.

use std::{sync::Arc, time::Duration};

use anyhow::Context as _;
use serde::Serialize;
use sprout_client::{ApiClient, ClientConfig, HealthCheck};
use sprout_core::{remote::Connectivity, store::EntityStore};
use sprout_store_sqlite::{SqliteCacheStorage, SqliteStore};
use sprout_sync::{AppContext, Notification, NotificationKind, RecordSyncOutcome};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{info, warn};

use crate::config::AppConfig;

type Context = AppContext<SqliteStore, ApiClient, ApiClient, SqliteCacheStorage>;

pub struct App {
  ctx:    Context,
  client: ApiClient,
  config: AppConfig,
}

impl App {
  pub async fn open(config: AppConfig) -> anyhow::Result<Self> {
    if let Some(parent) = config.store_path.parent() {
      std::fs::create_dir_all(parent)
        .with_context(|| format!("failed to create {}", parent.display()))?;
    }

    let store = SqliteStore::open(&config.store_path)
      .await
      .with_context(|| {
        format!("failed to open store at {}", config.store_path.display())
      })?
      .with_force_expire_window(config.sync.force_expire_window_ms);
    info!(path = %config.store_path.display(), "opened entity store");

    let client = ApiClient::new(ClientConfig {
      api_base_url:   config.api_base_url.clone(),
      asset_base_url: config.asset_base_url.clone(),
      timeout:        Duration::from_secs(config.request_timeout_secs),
    })
    .context("failed to build HTTP client")?;

    let cache_storage = store.cache_storage();
    let ctx = AppContext::new(
      Arc::new(store),
      Arc::new(client.clone()),
      Arc::new(client.clone()),
      cache_storage,
      &config.cache_name,
      config.sync.clone(),
    );

    Ok(Self { ctx, client, config })
  }

  fn health_check(&self) -> HealthCheck {
    HealthCheck::new(
      self.client.clone(),
      Duration::from_secs(self.config.health_check_interval_secs),
    )
  }

  /// Check once and publish the result to the monitor.
  async fn refresh_connectivity(&self) -> Connectivity {
    let connectivity = self.health_check().check().await;
    self.ctx.network.set_connectivity(connectivity);
    connectivity
  }

  // ─── Long-running ──────────────────────────────────────────────────────────

  pub async fn run(&self) -> anyhow::Result<()> {
    let notes = tokio::spawn(log_notifications(self.ctx.notifier.subscribe()));

    let online = self.refresh_connectivity().await.is_online();
    let report = self.ctx.bootstrap().await;
    if !report.durable_cache {
      warn!("durable asset cache unavailable; assets are kept in memory only");
    }

    let monitor = self.ctx.start_background();
    let network = Arc::clone(&self.ctx.network);
    let health = tokio::spawn(self.health_check().run(move |connectivity| {
      network.set_connectivity(connectivity);
    }));

    if online {
      match self.ctx.orchestrator.perform_full_sync().await {
        Ok(report) => info!(
          plants = report.plants_synced,
          records = report.records_synced,
          failed = report.plants_failed + report.records_failed,
          "initial sync finished"
        ),
        Err(e) => warn!(error = %e, "initial sync failed"),
      }
    }

    tokio::signal::ctrl_c()
      .await
      .context("failed to listen for ctrl-c")?;
    info!("shutting down");

    health.abort();
    self.ctx.shutdown(monitor);
    notes.abort();
    Ok(())
  }

  // ─── One-shot ──────────────────────────────────────────────────────────────

  pub async fn sync(&self) -> anyhow::Result<()> {
    self.refresh_connectivity().await;
    self.ctx.orchestrator.load_state().await?;
    let report = self.ctx.orchestrator.perform_full_sync().await?;
    print_json(&report)?;
    self.ctx.orchestrator.cleanup();
    Ok(())
  }

  pub async fn status(&self) -> anyhow::Result<()> {
    let sync = self.ctx.orchestrator.load_state().await?;
    let plants = self.ctx.store.list_plants().await?;
    let records = self.ctx.store.list_watering_records().await?;
    let incomplete = self.ctx.store.incomplete_watering_records().await?;
    let connectivity = self.refresh_connectivity().await;

    print_json(&serde_json::json!({
      "sync": sync,
      "plants": plants.len(),
      "wateringRecords": records.len(),
      "incompleteRecords": incomplete.len(),
      "connectivity": connectivity.to_string(),
    }))
  }

  pub async fn water(&self, plant_id: &str) -> anyhow::Result<()> {
    let record = self
      .ctx
      .store
      .record_watering(plant_id, None)
      .await
      .with_context(|| format!("failed to record watering for {plant_id}"))?;
    println!("{}", record.id);

    self.refresh_connectivity().await;
    let outcome = self
      .ctx
      .orchestrator
      .start_watering_record_sync(&record.id)
      .await?;
    self.finish_record(&record.plant_id, outcome).await
  }

  pub async fn retry(&self, record_id: &str) -> anyhow::Result<()> {
    let record = self
      .ctx
      .store
      .get_watering_record(record_id)
      .await?
      .with_context(|| format!("no watering record {record_id}"))?;

    self.refresh_connectivity().await;
    let outcome = self
      .ctx
      .orchestrator
      .retry_watering_record_sync(record_id)
      .await?;
    self.finish_record(&record.plant_id, outcome).await
  }

  /// Report a record outcome. A completed record gets its plant synced
  /// in-line, since the process exits before a scheduled cascade would fire.
  async fn finish_record(
    &self,
    plant_id: &str,
    outcome: RecordSyncOutcome,
  ) -> anyhow::Result<()> {
    println!("{outcome:?}");
    if outcome == RecordSyncOutcome::Completed {
      let plant = self.ctx.orchestrator.sync_single_plant(plant_id).await?;
      println!("plant {plant_id}: {plant:?}");
    } else if outcome == RecordSyncOutcome::Pending {
      println!("enrichment pending; `sprout run` keeps polling");
    }
    self.ctx.orchestrator.cleanup();
    Ok(())
  }

  // ─── Cache ─────────────────────────────────────────────────────────────────

  pub async fn cache_status(&self) -> anyhow::Result<()> {
    let durable = self.ctx.resources.init().await;
    let integrity = self.ctx.resources.check_cache_integrity().await;
    print_json(&serde_json::json!({
      "durable": durable,
      "integrity": integrity,
    }))
  }

  pub async fn cache_stats(&self) -> anyhow::Result<()> {
    self.ctx.resources.init().await;
    print_json(&self.ctx.resources.get_cache_usage_stats().await)
  }

  pub async fn cache_warm(&self) -> anyhow::Result<()> {
    self.ctx.resources.init().await;
    print_json(&self.ctx.resources.cache_all_resources().await)
  }

  pub async fn cache_repair(&self) -> anyhow::Result<()> {
    self.ctx.resources.init().await;
    print_json(&self.ctx.resources.repair_cache().await)
  }

  pub async fn cache_clear(&self) -> anyhow::Result<()> {
    self.ctx.resources.init().await;
    self.ctx.resources.clear_cache().await?;
    println!("cache cleared");
    Ok(())
  }
}

fn print_json(value: &impl Serialize) -> anyhow::Result<()> {
  println!("{}", serde_json::to_string_pretty(value)?);
  Ok(())
}

async fn log_notifications(mut rx: broadcast::Receiver<Notification>) {
  loop {
    match rx.recv().await {
      Ok(note) => match note.kind {
        NotificationKind::Warning | NotificationKind::Error => {
          warn!(title = %note.title, "{}", note.message)
        }
        NotificationKind::Info | NotificationKind::Success => {
          info!(title = %note.title, "{}", note.message)
        }
      },
      Err(RecvError::Lagged(skipped)) => warn!(skipped, "dropped notifications"),
      Err(RecvError::Closed) => break,
    }
  }
}
