//! The completeness predicate for watering records.
//!
//! A record is complete once every enrichment field produced by the server
//! pipeline has arrived. An un-enriched record is simply incomplete; it is
//! never an error state.

use strum::{Display, EnumIter, IntoEnumIterator};

use crate::watering::WateringRecord;

/// One of the enrichment fields the server fills in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumIter)]
#[strum(serialize_all = "camelCase")]
pub enum EnrichmentField {
  MemoryText,
  EmotionTags,
  EmotionIntensity,
  CoreEvent,
  GrowthIncrement,
}

impl EnrichmentField {
  fn is_present(self, record: &WateringRecord) -> bool {
    match self {
      Self::MemoryText => !record.memory_text.is_empty(),
      Self::EmotionTags => !record.emotion_tags.is_empty(),
      Self::EmotionIntensity => record.emotion_intensity.is_some(),
      Self::CoreEvent => !record.core_event.is_empty(),
      Self::GrowthIncrement => record.growth_increment.is_some(),
    }
  }
}

/// Whether all server-derived fields of `record` have arrived.
pub fn is_complete(record: &WateringRecord) -> bool {
  EnrichmentField::iter().all(|field| field.is_present(record))
}

/// The enrichment fields still missing from `record`, in declaration order.
pub fn missing_fields(record: &WateringRecord) -> Vec<EnrichmentField> {
  EnrichmentField::iter()
    .filter(|field| !field.is_present(record))
    .collect()
}
