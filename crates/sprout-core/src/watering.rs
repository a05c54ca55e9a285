//! WateringRecord: created the instant a player waters a plant, enriched
//! later by the server-side analysis pipeline.

use serde::{Deserialize, Deserializer, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WateringRecord {
  pub id:                 String,
  pub plant_id:           String,
  /// Growth value of the plant at the moment of watering.
  #[serde(default)]
  pub plant_growth_value: i64,
  pub watering_time:      i64,

  // ── Enrichment (filled in asynchronously by the server) ─────────────────
  #[serde(default, deserialize_with = "null_as_default")]
  pub memory_text:       String,
  #[serde(default, deserialize_with = "null_as_default")]
  pub emotion_tags:      Vec<String>,
  #[serde(default)]
  pub emotion_intensity: Option<f64>,
  #[serde(default, deserialize_with = "null_as_default")]
  pub core_event:        String,
  #[serde(default)]
  pub growth_increment:  Option<i64>,
  /// Opaque token referencing the stored audio memory.
  #[serde(default)]
  pub memory_file:       Option<String>,
  #[serde(default)]
  pub nft_minted:        bool,
  #[serde(default)]
  pub nft_address:       Option<String>,
}

impl WateringRecord {
  /// A record as it exists right after submission: no enrichment yet.
  pub fn new_local(
    id: impl Into<String>,
    plant_id: impl Into<String>,
    plant_growth_value: i64,
    watering_time: i64,
  ) -> Self {
    Self {
      id: id.into(),
      plant_id: plant_id.into(),
      plant_growth_value,
      watering_time,
      memory_text: String::new(),
      emotion_tags: Vec::new(),
      emotion_intensity: None,
      core_event: String::new(),
      growth_increment: None,
      memory_file: None,
      nft_minted: false,
      nft_address: None,
    }
  }

  /// Whether any server-authoritative field differs from `other`.
  ///
  /// Every field of a record is server-authoritative, so this is plain
  /// value inequality.
  pub fn differs_from(&self, other: &WateringRecord) -> bool { self != other }
}

/// Servers send `null` for enrichment fields that have not arrived yet.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
  D: Deserializer<'de>,
  T: Default + Deserialize<'de>,
{
  Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn deserialises_server_payload_with_nulls() {
    let json = r#"{
      "id": "r1",
      "plantId": "p1",
      "plantGrowthValue": 12,
      "wateringTime": 1700000000000,
      "memoryText": null,
      "emotionTags": null,
      "emotionIntensity": null,
      "coreEvent": null
    }"#;
    let record: WateringRecord = serde_json::from_str(json).unwrap();
    assert_eq!(record, WateringRecord::new_local("r1", "p1", 12, 1_700_000_000_000));
  }

  #[test]
  fn any_enrichment_change_is_a_difference() {
    let local = WateringRecord::new_local("r1", "p1", 3, 10);
    let mut remote = local.clone();
    assert!(!local.differs_from(&remote));

    remote.emotion_tags.push("calm".into());
    assert!(local.differs_from(&remote));
  }
}
