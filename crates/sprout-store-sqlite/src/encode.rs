//! Encoding and decoding helpers between Rust domain types and the plain
//! representations stored in SQLite columns.
//!
//! Timestamps on bookkeeping columns are RFC 3339 strings; cache timestamps
//! are epoch milliseconds, matching the domain types.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use sprout_core::resource::{CachedEntryMeta, CachedResource, ResourceType};

use crate::{Error, Result};

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

// ─── ResourceType ────────────────────────────────────────────────────────────

pub fn encode_resource_type(t: ResourceType) -> &'static str {
  match t {
    ResourceType::Video => "video",
    ResourceType::Image => "image",
    ResourceType::Audio => "audio",
  }
}

pub fn decode_resource_type(s: &str) -> Result<ResourceType> {
  s.parse()
    .map_err(|_| Error::Decode(format!("unknown resource type: {s:?}")))
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw values read directly from a `cache_entries` row.
pub struct RawCacheEntry {
  pub url:           String,
  pub resource_key:  String,
  pub resource_type: String,
  pub body:          Vec<u8>,
  pub cached_at:     i64,
  pub size:          i64,
  pub digest:        String,
}

/// The `url`, `resource_type` and `size` columns of a `cache_entries` row.
pub struct RawEntryMeta {
  pub url:           String,
  pub resource_type: String,
  pub size:          i64,
}

impl RawEntryMeta {
  pub fn into_meta(self) -> Result<CachedEntryMeta> {
    Ok(CachedEntryMeta {
      url:           self.url,
      resource_type: decode_resource_type(&self.resource_type)?,
      size:          decode_size(self.size)?,
    })
  }
}

fn decode_size(size: i64) -> Result<u64> {
  u64::try_from(size).map_err(|_| Error::Decode(format!("negative size: {size}")))
}

impl RawCacheEntry {
  pub fn into_resource(self) -> Result<CachedResource> {
    Ok(CachedResource {
      key:           self.resource_key,
      url:           self.url,
      resource_type: decode_resource_type(&self.resource_type)?,
      bytes:         Bytes::from(self.body),
      cached_at:     self.cached_at,
      size:          decode_size(self.size)?,
      digest:        self.digest,
    })
  }
}
