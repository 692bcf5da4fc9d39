//! Persistence mapper: a finished release becomes one diagnosis row and
//! one card row linked to it.
//!
//! Storage failures never reach the user; they are logged and the release
//! still counts as shown.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use rusqlite::Connection;
use uuid::Uuid;

use crate::db::{self, DatabaseError};
use crate::models::enums::ChakraType;
use crate::models::{CardResult, DiagnosisResult, EmotionCardRecord, EnergyDiagnosisRecord};

/// Storage collaborator for completed releases.
pub trait ReleaseStore: Send + Sync {
    /// Insert both records in one transaction.
    fn save_release(
        &self,
        diagnosis: &EnergyDiagnosisRecord,
        card: &EmotionCardRecord,
    ) -> Result<(), DatabaseError>;
}

/// SQLite-backed store. Opens one connection per operation.
pub struct SqliteReleaseStore {
    db_path: PathBuf,
}

impl SqliteReleaseStore {
    pub fn new(db_path: &Path) -> Self {
        Self {
            db_path: db_path.to_path_buf(),
        }
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    fn open(&self) -> Result<Connection, DatabaseError> {
        db::open_database(&self.db_path)
    }

    /// Most recent cards first.
    pub fn recent_cards(&self, limit: u32) -> Result<Vec<EmotionCardRecord>, DatabaseError> {
        db::list_recent_emotion_cards(&self.open()?, limit)
    }

    pub fn card(&self, id: &Uuid) -> Result<Option<EmotionCardRecord>, DatabaseError> {
        db::get_emotion_card(&self.open()?, id)
    }

    pub fn diagnosis(&self, id: &Uuid) -> Result<Option<EnergyDiagnosisRecord>, DatabaseError> {
        db::get_energy_diagnosis(&self.open()?, id)
    }

    /// Delete a diagnosis; cards pointing at it keep their text and lose the link.
    pub fn delete_diagnosis(&self, id: &Uuid) -> Result<bool, DatabaseError> {
        db::delete_energy_diagnosis(&self.open()?, id)
    }

    pub fn delete_card(&self, id: &Uuid) -> Result<bool, DatabaseError> {
        db::delete_emotion_card(&self.open()?, id)
    }
}

impl ReleaseStore for SqliteReleaseStore {
    fn save_release(
        &self,
        diagnosis: &EnergyDiagnosisRecord,
        card: &EmotionCardRecord,
    ) -> Result<(), DatabaseError> {
        let conn = self.open()?;
        let tx = conn.unchecked_transaction()?;
        db::insert_energy_diagnosis(&tx, diagnosis)?;
        db::insert_emotion_card(&tx, card)?;
        tx.commit()?;
        Ok(())
    }
}

/// Ids of the rows written for one release.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PersistedRelease {
    pub diagnosis_id: Uuid,
    pub card_id: Uuid,
}

/// Keep only keys that name a known chakra.
pub fn map_chakra_balance(raw: &BTreeMap<String, f64>) -> BTreeMap<ChakraType, f64> {
    raw.iter()
        .filter_map(|(key, value)| match ChakraType::from_key(key) {
            Some(chakra) => Some((chakra, *value)),
            None => {
                tracing::debug!(key = %key, "Dropping unknown chakra key");
                None
            }
        })
        .collect()
}

/// Build the record pair for one release: fresh ids, shared timestamp,
/// card linked to the diagnosis.
pub fn build_records(
    diagnosis: &DiagnosisResult,
    card: &CardResult,
    raw_input: &str,
    now: NaiveDateTime,
) -> (EnergyDiagnosisRecord, EmotionCardRecord) {
    let diagnosis_record = EnergyDiagnosisRecord {
        id: Uuid::new_v4(),
        timestamp: now,
        detected_emotions: diagnosis.detected_emotions.clone(),
        chakra_balance: map_chakra_balance(&diagnosis.chakra_balance),
        energy_state: diagnosis.energy_state,
    };
    let card_record = EmotionCardRecord {
        id: Uuid::new_v4(),
        timestamp: now,
        raw_input: raw_input.to_string(),
        response_text: card.response_text.clone(),
        quote: card.quote.clone(),
        related_diagnosis_id: Some(diagnosis_record.id),
    };
    (diagnosis_record, card_record)
}

/// Write a completed release. Returns `None` (after logging) on failure.
pub fn persist_release(
    store: &dyn ReleaseStore,
    diagnosis: &DiagnosisResult,
    card: &CardResult,
    raw_input: &str,
) -> Option<PersistedRelease> {
    let now = chrono::Local::now().naive_local();
    let (diagnosis_record, card_record) = build_records(diagnosis, card, raw_input, now);

    match store.save_release(&diagnosis_record, &card_record) {
        Ok(()) => {
            tracing::info!(
                diagnosis_id = %diagnosis_record.id,
                card_id = %card_record.id,
                "Release saved"
            );
            Some(PersistedRelease {
                diagnosis_id: diagnosis_record.id,
                card_id: card_record.id,
            })
        }
        Err(e) => {
            tracing::warn!(error = %e, "Failed to save release");
            None
        }
    }
}
