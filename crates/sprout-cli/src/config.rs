//! `AppConfig`: read from `config.toml` and `SPROUT_*` environment variables.

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use serde::Deserialize;
use sprout_sync::{DEFAULT_CACHE_NAME, SyncConfig};

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
  pub api_base_url:               String,
  pub asset_base_url:             String,
  pub store_path:                 PathBuf,
  pub cache_name:                 String,
  pub request_timeout_secs:       u64,
  pub health_check_interval_secs: u64,
  pub sync:                       SyncConfig,
}

impl Default for AppConfig {
  fn default() -> Self {
    Self {
      api_base_url:               "http://localhost:8080".into(),
      asset_base_url:             "http://localhost:8080".into(),
      store_path:                 PathBuf::from("~/.local/share/sprout/sprout.db"),
      cache_name:                 DEFAULT_CACHE_NAME.into(),
      request_timeout_secs:       30,
      health_check_interval_secs: 15,
      sync:                       SyncConfig::default(),
    }
  }
}

impl AppConfig {
  /// Layer the optional file at `path` under the environment.
  ///
  /// Nested keys use a double underscore: `SPROUT_SYNC__MAX_RETRIES=5`.
  pub fn load(path: &Path) -> anyhow::Result<Self> {
    let settings = config::Config::builder()
      .add_source(config::File::from(path).required(false))
      .add_source(
        config::Environment::with_prefix("SPROUT")
          .prefix_separator("_")
          .separator("__")
          .try_parsing(true),
      )
      .build()
      .context("failed to read config file")?;

    let mut cfg: AppConfig = settings
      .try_deserialize()
      .context("failed to deserialise AppConfig")?;
    cfg.store_path = expand_tilde(&cfg.store_path);
    Ok(cfg)
  }
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
