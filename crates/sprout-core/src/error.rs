//! Error types for `sprout-core`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("plant not found: {0}")]
  PlantNotFound(String),

  #[error("watering record not found: {0}")]
  WateringRecordNotFound(String),

  #[error("plant {0} already exists")]
  DuplicatePlant(String),

  #[error("watering record {0} already exists")]
  DuplicateWateringRecord(String),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
