//! Error type for `sprout-client` construction.
//!
//! Request failures are reported as [`sprout_core::remote::RemoteError`].

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("failed to build HTTP client: {0}")]
  Build(#[from] reqwest::Error),

  #[error("invalid base url {0:?}")]
  InvalidBaseUrl(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
