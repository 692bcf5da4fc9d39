//! Observable release state.
//!
//! The orchestrator publishes one `ReleaseState` snapshot per transition;
//! the UI never sees individual fields change on their own.

use serde::Serialize;

use super::ErrorCategory;
use crate::models::{CardResult, DiagnosisResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum ReleasePhase {
    Idle,
    AwaitingDiagnosis,
    /// Stage-1 model rejected the text. Terminal.
    InvalidInput,
    /// Stage-1 failed (transport or decode). Terminal.
    DiagnosisFailed { reason: ErrorCategory },
    AwaitingCard,
    /// Stage-2 failed; the diagnosis is kept. Terminal.
    CardFailed { reason: ErrorCategory },
    CardReady,
}

/// One atomic snapshot of everything the release screen observes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReleaseState {
    /// Submit counter of the chain that produced this snapshot.
    pub generation: u64,
    pub phase: ReleasePhase,
    pub diagnosis: Option<DiagnosisResult>,
    pub card: Option<CardResult>,
    pub error_message: Option<String>,
}

impl Default for ReleaseState {
    fn default() -> Self {
        Self::idle(0)
    }
}

impl ReleaseState {
    pub fn idle(generation: u64) -> Self {
        Self {
            generation,
            phase: ReleasePhase::Idle,
            diagnosis: None,
            card: None,
            error_message: None,
        }
    }

    pub fn awaiting_diagnosis(generation: u64) -> Self {
        Self {
            phase: ReleasePhase::AwaitingDiagnosis,
            ..Self::idle(generation)
        }
    }

    pub fn invalid_input(generation: u64) -> Self {
        Self {
            phase: ReleasePhase::InvalidInput,
            ..Self::idle(generation)
        }
    }

    pub fn diagnosis_failed(generation: u64, reason: ErrorCategory, message: String) -> Self {
        Self {
            phase: ReleasePhase::DiagnosisFailed { reason },
            error_message: Some(message),
            ..Self::idle(generation)
        }
    }

    pub fn awaiting_card(generation: u64, diagnosis: DiagnosisResult) -> Self {
        Self {
            phase: ReleasePhase::AwaitingCard,
            diagnosis: Some(diagnosis),
            ..Self::idle(generation)
        }
    }

    pub fn card_failed(
        generation: u64,
        diagnosis: DiagnosisResult,
        reason: ErrorCategory,
        message: String,
    ) -> Self {
        Self {
            phase: ReleasePhase::CardFailed { reason },
            diagnosis: Some(diagnosis),
            error_message: Some(message),
            ..Self::idle(generation)
        }
    }

    pub fn card_ready(generation: u64, diagnosis: DiagnosisResult, card: CardResult) -> Self {
        Self {
            phase: ReleasePhase::CardReady,
            diagnosis: Some(diagnosis),
            card: Some(card),
            ..Self::idle(generation)
        }
    }

    /// A request is in flight. False in every terminal phase.
    pub fn loading(&self) -> bool {
        matches!(
            self.phase,
            ReleasePhase::AwaitingDiagnosis | ReleasePhase::AwaitingCard
        )
    }

    /// Show the "please revise your input" notice with retry.
    ///
    /// Also raised when the diagnosis could not be decoded, so the user is
    /// offered to rewrite rather than stare at a generic error.
    pub fn invalid_input_notice(&self) -> bool {
        matches!(
            self.phase,
            ReleasePhase::InvalidInput
                | ReleasePhase::DiagnosisFailed {
                    reason: ErrorCategory::Decode
                }
        )
    }

    pub fn show_card(&self) -> bool {
        self.phase == ReleasePhase::CardReady
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self.phase,
            ReleasePhase::InvalidInput
                | ReleasePhase::DiagnosisFailed { .. }
                | ReleasePhase::CardFailed { .. }
                | ReleasePhase::CardReady
        )
    }

    /// Flattened form for the UI layer.
    pub fn view(&self) -> ReleaseView {
        ReleaseView {
            generation: self.generation,
            phase: self.phase,
            loading: self.loading(),
            invalid_input_notice: self.invalid_input_notice(),
            show_card: self.show_card(),
            diagnosis: self.diagnosis.clone(),
            card: self.card.clone(),
            error_message: self.error_message.clone(),
        }
    }
}

/// Serializable snapshot with the derived flags spelled out.
#[derive(Debug, Clone, Serialize)]
pub struct ReleaseView {
    pub generation: u64,
    pub phase: ReleasePhase,
    pub loading: bool,
    pub invalid_input_notice: bool,
    pub show_card: bool,
    pub diagnosis: Option<DiagnosisResult>,
    pub card: Option<CardResult>,
    pub error_message: Option<String>,
}
