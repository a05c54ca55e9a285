//! The static table of assets the game needs for offline play, plus the
//! value types the resource cache reports.

use std::collections::BTreeMap;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

// ─── Descriptors ─────────────────────────────────────────────────────────────

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  PartialOrd,
  Ord,
  Serialize,
  Deserialize,
  Display,
  EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ResourceType {
  Video,
  Image,
  Audio,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourcePriority {
  /// Needed before the first screen can render.
  High,
  Normal,
}

/// One cacheable asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceDescriptor {
  /// Logical name used by callers.
  pub key:           &'static str,
  /// Fetch source, relative to the asset base URL. Also the durable-tier key.
  pub url:           &'static str,
  pub resource_type: ResourceType,
  pub priority:      ResourcePriority,
}

const fn descriptor(
  key: &'static str,
  url: &'static str,
  resource_type: ResourceType,
  priority: ResourcePriority,
) -> ResourceDescriptor {
  ResourceDescriptor { key, url, resource_type, priority }
}

/// Every asset the game needs offline.
pub const RESOURCES: &[ResourceDescriptor] = &[
  descriptor("seed_video", "/videos/seed.mp4", ResourceType::Video, ResourcePriority::High),
  descriptor("sprout_video", "/videos/sprout.mp4", ResourceType::Video, ResourcePriority::High),
  descriptor("mature_video", "/videos/mature.mp4", ResourceType::Video, ResourcePriority::Normal),
  descriptor("flowering_video", "/videos/flowering.mp4", ResourceType::Video, ResourcePriority::Normal),
  descriptor("fruiting_video", "/videos/fruiting.mp4", ResourceType::Video, ResourcePriority::Normal),
  descriptor("watering_video", "/videos/watering.mp4", ResourceType::Video, ResourcePriority::High),
  descriptor("background_image", "/images/background.png", ResourceType::Image, ResourcePriority::High),
  descriptor("pot_image", "/images/pot.png", ResourceType::Image, ResourcePriority::High),
  descriptor("watering_can_image", "/images/watering-can.png", ResourceType::Image, ResourcePriority::Normal),
  descriptor("ambient_audio", "/audio/ambient.mp3", ResourceType::Audio, ResourcePriority::Normal),
  descriptor("watering_audio", "/audio/watering.mp3", ResourceType::Audio, ResourcePriority::Normal),
];

// ─── Cached form ─────────────────────────────────────────────────────────────

/// An asset's bytes plus the metadata stored alongside them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedResource {
  pub key:           String,
  pub url:           String,
  pub resource_type: ResourceType,
  pub bytes:         Bytes,
  /// Epoch ms at which the bytes were stored.
  pub cached_at:     i64,
  pub size:          u64,
  /// Lowercase hex SHA-256 of `bytes`, computed at download time.
  pub digest:        String,
}

/// The stored metadata of a cache entry, without its bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedEntryMeta {
  pub url:           String,
  pub resource_type: ResourceType,
  pub size:          u64,
}

impl From<&CachedResource> for CachedEntryMeta {
  fn from(entry: &CachedResource) -> Self {
    Self {
      url:           entry.url.clone(),
      resource_type: entry.resource_type,
      size:          entry.size,
    }
  }
}

// ─── Reports ─────────────────────────────────────────────────────────────────

/// Readiness signal consumed by the bootstrap to gate first render.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheReadiness {
  pub is_loaded: bool,
  /// Integer percent, 0..=100.
  pub progress:  u8,
  pub error:     Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheIntegrity {
  pub is_complete:       bool,
  pub missing_resources: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheUsageStats {
  pub total_size: u64,
  pub item_count: usize,
  pub by_type:    BTreeMap<ResourceType, usize>,
}

#[cfg(test)]
mod tests {
  use std::collections::HashSet;

  use super::*;

  #[test]
  fn descriptor_keys_and_urls_are_unique() {
    let keys: HashSet<_> = RESOURCES.iter().map(|d| d.key).collect();
    let urls: HashSet<_> = RESOURCES.iter().map(|d| d.url).collect();
    assert_eq!(keys.len(), RESOURCES.len());
    assert_eq!(urls.len(), RESOURCES.len());
  }

  #[test]
  fn table_has_high_priority_assets() {
    assert!(
      RESOURCES
        .iter()
        .any(|d| d.priority == ResourcePriority::High)
    );
  }
}
