//! Error types for `sprout-sync`.

use std::sync::Arc;

use sprout_core::remote::RemoteError;
use thiserror::Error;

/// Failure of a sync operation.
///
/// Cheap to clone so that one in-flight sync can hand the same result to
/// every caller waiting on it.
#[derive(Debug, Clone, Error)]
pub enum SyncError {
  #[error("offline: {0} needs a network connection")]
  Offline(&'static str),

  #[error("a full sync is already running")]
  InProgress,

  #[error("remote error: {0}")]
  Remote(#[from] RemoteError),

  #[error("store error: {0}")]
  Store(#[source] Arc<dyn std::error::Error + Send + Sync>),

  #[error("sync of {0} was abandoned before it finished")]
  Abandoned(String),
}

impl SyncError {
  pub(crate) fn store<E>(e: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Self::Store(Arc::new(e))
  }
}

/// Failure to cache one resource.
#[derive(Debug, Error)]
pub enum CacheError {
  #[error("download failed: {0}")]
  Fetch(#[from] RemoteError),

  #[error("durable cache error: {0}")]
  Durable(String),

  #[error("unknown resource key: {0}")]
  UnknownResource(String),
}

pub type Result<T, E = SyncError> = std::result::Result<T, E>;
