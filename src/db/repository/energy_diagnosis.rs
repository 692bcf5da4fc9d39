use std::collections::BTreeMap;
use std::str::FromStr;

use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use crate::db::DatabaseError;
use crate::models::enums::{ChakraType, EnergyState};
use crate::models::EnergyDiagnosisRecord;

use super::{parse_timestamp, parse_uuid};

pub fn insert_energy_diagnosis(
    conn: &Connection,
    record: &EnergyDiagnosisRecord,
) -> Result<(), DatabaseError> {
    let emotions_json = serde_json::to_string(&record.detected_emotions)
        .map_err(|e| DatabaseError::Serialization(e.to_string()))?;
    let chakra_json = serde_json::to_string(&record.chakra_balance)
        .map_err(|e| DatabaseError::Serialization(e.to_string()))?;

    conn.execute(
        "INSERT INTO energy_diagnoses (id, timestamp, detected_emotions, chakra_balance, energy_state)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            record.id.to_string(),
            record.timestamp.to_string(),
            emotions_json,
            chakra_json,
            record.energy_state.as_str(),
        ],
    )?;
    Ok(())
}

pub fn get_energy_diagnosis(
    conn: &Connection,
    id: &Uuid,
) -> Result<Option<EnergyDiagnosisRecord>, DatabaseError> {
    let row = conn
        .query_row(
            "SELECT id, timestamp, detected_emotions, chakra_balance, energy_state
             FROM energy_diagnoses WHERE id = ?1",
            params![id.to_string()],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                ))
            },
        )
        .optional()?;

    row.map(diagnosis_from_row).transpose()
}

/// Delete a diagnosis. Linked cards survive with their link cleared.
/// Returns whether a row was removed.
pub fn delete_energy_diagnosis(conn: &Connection, id: &Uuid) -> Result<bool, DatabaseError> {
    let affected = conn.execute(
        "DELETE FROM energy_diagnoses WHERE id = ?1",
        params![id.to_string()],
    )?;
    Ok(affected > 0)
}

pub fn count_energy_diagnoses(conn: &Connection) -> Result<u32, DatabaseError> {
    let count: u32 = conn.query_row("SELECT COUNT(*) FROM energy_diagnoses", [], |row| row.get(0))?;
    Ok(count)
}

type DiagnosisRow = (String, String, String, String, String);

fn diagnosis_from_row(row: DiagnosisRow) -> Result<EnergyDiagnosisRecord, DatabaseError> {
    let (id, timestamp, emotions_json, chakra_json, energy_state) = row;

    let detected_emotions: Vec<String> = serde_json::from_str(&emotions_json)
        .map_err(|e| DatabaseError::Serialization(e.to_string()))?;
    let chakra_balance: BTreeMap<ChakraType, f64> = serde_json::from_str(&chakra_json)
        .map_err(|e| DatabaseError::Serialization(e.to_string()))?;

    Ok(EnergyDiagnosisRecord {
        id: parse_uuid(&id)?,
        timestamp: parse_timestamp(&timestamp)?,
        detected_emotions,
        chakra_balance,
        energy_state: EnergyState::from_str(&energy_state)?,
    })
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDateTime;

    use super::*;
    use crate::db::sqlite::open_memory_database;

    fn sample(state: EnergyState) -> EnergyDiagnosisRecord {
        EnergyDiagnosisRecord {
            id: Uuid::new_v4(),
            timestamp: NaiveDateTime::parse_from_str("2025-03-07 21:15:00", "%Y-%m-%d %H:%M:%S")
                .unwrap(),
            detected_emotions: vec!["anxious".into(), "tense".into()],
            chakra_balance: BTreeMap::from([(ChakraType::Heart, 0.3), (ChakraType::Root, 0.8)]),
            energy_state: state,
        }
    }

    #[test]
    fn insert_then_get() {
        let conn = open_memory_database().unwrap();
        let record = sample(EnergyState::Blocked);
        insert_energy_diagnosis(&conn, &record).unwrap();

        let loaded = get_energy_diagnosis(&conn, &record.id).unwrap().unwrap();
        assert_eq!(loaded, record);
    }

    #[test]
    fn get_missing_is_none() {
        let conn = open_memory_database().unwrap();
        assert!(get_energy_diagnosis(&conn, &Uuid::new_v4()).unwrap().is_none());
    }

    #[test]
    fn chakra_column_uses_snake_case_keys() {
        let conn = open_memory_database().unwrap();
        let mut record = sample(EnergyState::Balanced);
        record.chakra_balance = BTreeMap::from([(ChakraType::SolarPlexus, 0.5)]);
        insert_energy_diagnosis(&conn, &record).unwrap();

        let raw: String = conn
            .query_row(
                "SELECT chakra_balance FROM energy_diagnoses WHERE id = ?1",
                params![record.id.to_string()],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(raw, r#"{"solar_plexus":0.5}"#);
    }

    #[test]
    fn delete_reports_whether_removed() {
        let conn = open_memory_database().unwrap();
        let record = sample(EnergyState::Depleted);
        insert_energy_diagnosis(&conn, &record).unwrap();

        assert!(delete_energy_diagnosis(&conn, &record.id).unwrap());
        assert!(!delete_energy_diagnosis(&conn, &record.id).unwrap());
        assert_eq!(count_energy_diagnoses(&conn).unwrap(), 0);
    }
}
