//! Remote collaborators the sync layer consumes.
//!
//! Implemented over HTTP by `sprout-client`; tests substitute scripted fakes.

use std::future::Future;

use bytes::Bytes;
use strum::Display;
use thiserror::Error;

use crate::{plant::Plant, watering::WateringRecord};

/// Why a remote call failed. Cheap to clone so it can be copied into status
/// tables and shared between de-duplicated callers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteError {
  #[error("network error: {0}")]
  Network(String),

  #[error("server error {status}: {message}")]
  Server { status: u16, message: String },

  #[error("not found: {0}")]
  NotFound(String),

  #[error("malformed response: {0}")]
  Decode(String),
}

/// Whether the remote collaborators are currently reachable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display)]
#[strum(serialize_all = "lowercase")]
pub enum Connectivity {
  #[default]
  Online,
  Offline,
}

impl Connectivity {
  pub fn is_online(self) -> bool { self == Self::Online }
}

/// Authoritative plant and watering-record reads.
pub trait RemoteSource: Send + Sync {
  fn get_plant_by_id<'a>(
    &'a self,
    id: &'a str,
  ) -> impl Future<Output = Result<Plant, RemoteError>> + Send + 'a;

  fn get_watering_record_by_id<'a>(
    &'a self,
    id: &'a str,
  ) -> impl Future<Output = Result<WateringRecord, RemoteError>> + Send + 'a;
}

/// Byte transport for asset downloads.
pub trait AssetTransport: Send + Sync {
  fn fetch<'a>(
    &'a self,
    url: &'a str,
  ) -> impl Future<Output = Result<Bytes, RemoteError>> + Send + 'a;
}
