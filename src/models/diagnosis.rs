use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::enums::{EnergyState, Participant};

/// One chat message as sent to the completion API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendMessage {
    pub role: Participant,
    pub content: String,
}

impl SendMessage {
    pub fn new(role: Participant, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Participant::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Participant::User, content)
    }
}

/// Stage-1 output: what the model read in the user's release.
///
/// `chakra_balance` keeps the model's raw keys; the closed chakra set is
/// applied only when the result is persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosisResult {
    pub detected_emotions: Vec<String>,
    pub chakra_balance: BTreeMap<String, f64>,
    pub energy_state: EnergyState,
}

/// Stage-2 output: the affirmation card.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardResult {
    pub response_text: String,
    pub quote: String,
}
