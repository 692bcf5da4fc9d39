use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::{ChakraType, EnergyState};

/// Persisted Stage-1 result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnergyDiagnosisRecord {
    pub id: Uuid,
    pub timestamp: NaiveDateTime,
    pub detected_emotions: Vec<String>,
    pub chakra_balance: BTreeMap<ChakraType, f64>,
    pub energy_state: EnergyState,
}

/// Persisted affirmation card. `related_diagnosis_id` is nulled when the
/// diagnosis row is deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmotionCardRecord {
    pub id: Uuid,
    pub timestamp: NaiveDateTime,
    pub raw_input: String,
    pub response_text: String,
    pub quote: String,
    pub related_diagnosis_id: Option<Uuid>,
}
