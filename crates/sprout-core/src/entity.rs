//! Entity kinds and the shared diff rule.
//!
//! When a fetched snapshot differs from local state in any
//! server-authoritative field, the local entity is replaced wholesale. Local
//! fields are always a subset of what the server eventually returns, so a
//! whole-record replacement cannot drop client-authored information.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::{plant::Plant, watering::WateringRecord};

/// The two kinds of synchronised entity.
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
pub enum EntityKind {
  Plant,
  Watering,
}

/// A synchronised entity tagged with its kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "lowercase")]
pub enum Entity {
  Plant(Plant),
  Watering(WateringRecord),
}

impl Entity {
  pub fn kind(&self) -> EntityKind {
    match self {
      Self::Plant(_) => EntityKind::Plant,
      Self::Watering(_) => EntityKind::Watering,
    }
  }

  pub fn id(&self) -> &str {
    match self {
      Self::Plant(p) => &p.id,
      Self::Watering(r) => &r.id,
    }
  }

  /// Whether `fetched` should replace `self`.
  ///
  /// Entities of different kinds are always considered changed.
  pub fn has_changed(&self, fetched: &Entity) -> bool {
    match (self, fetched) {
      (Self::Plant(local), Self::Plant(remote)) => local.differs_from(remote),
      (Self::Watering(local), Self::Watering(remote)) => {
        local.differs_from(remote)
      }
      _ => true,
    }
  }
}

impl From<Plant> for Entity {
  fn from(p: Plant) -> Self { Self::Plant(p) }
}

impl From<WateringRecord> for Entity {
  fn from(r: WateringRecord) -> Self { Self::Watering(r) }
}
