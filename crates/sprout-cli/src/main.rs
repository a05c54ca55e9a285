//! `sprout` binary.
//!
//! Reads `config.toml` (or the path given with `--config`) plus `SPROUT_*`
//! environment overrides, opens the SQLite entity store, and either runs the
//! sync layer until interrupted or performs a single maintenance command.

mod app;
mod config;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

use crate::{app::App, config::AppConfig};

#[derive(Parser)]
#[command(author, version, about = "Sprout offline sync and asset cache")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand)]
enum Command {
  /// Bootstrap, then keep syncing in the background until ctrl-c.
  Run,
  /// Run one full sync pass and print the report.
  Sync,
  /// Inspect or maintain the asset cache.
  Cache {
    #[command(subcommand)]
    action: CacheAction,
  },
  /// Print the global sync state and entity counts.
  Status,
  /// Clear a failed watering record and poll it again.
  Retry { record_id: String },
  /// Record a watering for a plant and start polling its enrichment.
  Water { plant_id: String },
}

#[derive(Subcommand)]
enum CacheAction {
  /// Show which assets are missing.
  Status,
  /// Evict corrupt entries and fetch whatever is missing.
  Repair,
  /// Drop every cached asset.
  Clear,
  /// Show item count and total size.
  Stats,
  /// Download every asset.
  Warm,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();
  let config = AppConfig::load(&cli.config)?;
  let app = App::open(config).await?;

  match cli.command {
    Command::Run => app.run().await,
    Command::Sync => app.sync().await,
    Command::Status => app.status().await,
    Command::Retry { record_id } => app.retry(&record_id).await,
    Command::Water { plant_id } => app.water(&plant_id).await,
    Command::Cache { action } => match action {
      CacheAction::Status => app.cache_status().await,
      CacheAction::Repair => app.cache_repair().await,
      CacheAction::Clear => app.cache_clear().await,
      CacheAction::Stats => app.cache_stats().await,
      CacheAction::Warm => app.cache_warm().await,
    },
  }
}
