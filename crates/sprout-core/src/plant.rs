//! Plant: the long-lived entity a player grows by watering it.
//!
//! Most fields are server-authoritative. `last_sync_time` and `sync_status`
//! are client-side bookkeeping and never participate in change detection.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

/// Prefix of ids minted locally for plants created while offline.
pub const OFFLINE_ID_PREFIX: &str = "offline_";

// ─── Growth ──────────────────────────────────────────────────────────────────

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  PartialOrd,
  Ord,
  Default,
  Serialize,
  Deserialize,
  Display,
  EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum GrowthStage {
  #[default]
  Seed,
  Sprout,
  Mature,
  Flowering,
  Fruiting,
}

impl GrowthStage {
  /// The stage a plant with `growth_value` has reached.
  pub fn for_growth_value(growth_value: i64) -> Self {
    match growth_value {
      i64::MIN..10 => Self::Seed,
      10..30 => Self::Sprout,
      30..60 => Self::Mature,
      60..100 => Self::Flowering,
      _ => Self::Fruiting,
    }
  }
}

/// Coarse sync marker carried on the plant itself.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SyncTag {
  Complete,
  #[default]
  Pending,
}

// ─── Plant ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Plant {
  pub id:                 String,
  pub variety:            String,
  #[serde(default)]
  pub growth_stage:       GrowthStage,
  #[serde(default)]
  pub growth_value:       i64,
  #[serde(default)]
  pub last_watering_time: Option<i64>,
  #[serde(default)]
  pub recent_status:      String,
  #[serde(default)]
  pub personality_tags:   BTreeSet<String>,
  #[serde(default)]
  pub nft_minted:         bool,
  #[serde(default)]
  pub nft_address:        Option<String>,
  #[serde(default)]
  pub created_at:         i64,

  /// Epoch ms of the last confirmed sync; 0 means never.
  #[serde(default)]
  pub last_sync_time: i64,
  #[serde(default)]
  pub sync_status:    SyncTag,
}

impl Plant {
  /// A fresh seed with the given server-assigned id.
  pub fn new(id: impl Into<String>, variety: impl Into<String>, now: i64) -> Self {
    Self {
      id:                 id.into(),
      variety:            variety.into(),
      growth_stage:       GrowthStage::Seed,
      growth_value:       0,
      last_watering_time: None,
      recent_status:      String::new(),
      personality_tags:   BTreeSet::new(),
      nft_minted:         false,
      nft_address:        None,
      created_at:         now,
      last_sync_time:     0,
      sync_status:        SyncTag::Pending,
    }
  }

  /// A fresh seed created without a server round trip.
  pub fn new_offline(variety: impl Into<String>, now: i64) -> Self {
    Self::new(format!("{OFFLINE_ID_PREFIX}{}", Uuid::new_v4()), variety, now)
  }

  pub fn is_offline_placeholder(&self) -> bool {
    self.id.starts_with(OFFLINE_ID_PREFIX)
  }

  /// Add `increment` to the growth value and move the stage accordingly.
  pub fn grow(&mut self, increment: i64) {
    self.growth_value = self.growth_value.saturating_add(increment).max(0);
    self.growth_stage = GrowthStage::for_growth_value(self.growth_value);
  }

  /// Whether any server-authoritative field differs from `other`.
  pub fn differs_from(&self, other: &Plant) -> bool {
    self.id != other.id
      || self.variety != other.variety
      || self.growth_stage != other.growth_stage
      || self.growth_value != other.growth_value
      || self.last_watering_time != other.last_watering_time
      || self.recent_status != other.recent_status
      || self.personality_tags != other.personality_tags
      || self.nft_minted != other.nft_minted
      || self.nft_address != other.nft_address
  }
}
