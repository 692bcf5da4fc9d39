use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use crate::db::DatabaseError;
use crate::models::EmotionCardRecord;

use super::{parse_timestamp, parse_uuid};

pub fn insert_emotion_card(conn: &Connection, card: &EmotionCardRecord) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO emotion_cards (id, timestamp, raw_input, response_text, quote, related_diagnosis_id)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            card.id.to_string(),
            card.timestamp.to_string(),
            card.raw_input,
            card.response_text,
            card.quote,
            card.related_diagnosis_id.map(|id| id.to_string()),
        ],
    )?;
    Ok(())
}

pub fn get_emotion_card(
    conn: &Connection,
    id: &Uuid,
) -> Result<Option<EmotionCardRecord>, DatabaseError> {
    let row = conn
        .query_row(
            "SELECT id, timestamp, raw_input, response_text, quote, related_diagnosis_id
             FROM emotion_cards WHERE id = ?1",
            params![id.to_string()],
            map_card_row,
        )
        .optional()?;

    row.map(card_from_row).transpose()
}

/// Most recent cards first.
pub fn list_recent_emotion_cards(
    conn: &Connection,
    limit: u32,
) -> Result<Vec<EmotionCardRecord>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, timestamp, raw_input, response_text, quote, related_diagnosis_id
         FROM emotion_cards ORDER BY timestamp DESC, rowid DESC LIMIT ?1",
    )?;

    let rows = stmt.query_map(params![limit], map_card_row)?;

    let mut cards = Vec::new();
    for row in rows {
        cards.push(card_from_row(row?)?);
    }
    Ok(cards)
}

/// Delete a card. The linked diagnosis is left in place.
pub fn delete_emotion_card(conn: &Connection, id: &Uuid) -> Result<bool, DatabaseError> {
    let affected = conn.execute(
        "DELETE FROM emotion_cards WHERE id = ?1",
        params![id.to_string()],
    )?;
    Ok(affected > 0)
}

pub fn count_emotion_cards(conn: &Connection) -> Result<u32, DatabaseError> {
    let count: u32 = conn.query_row("SELECT COUNT(*) FROM emotion_cards", [], |row| row.get(0))?;
    Ok(count)
}

type CardRow = (String, String, String, String, String, Option<String>);

fn map_card_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<CardRow> {
    Ok((
        row.get::<_, String>(0)?,
        row.get::<_, String>(1)?,
        row.get::<_, String>(2)?,
        row.get::<_, String>(3)?,
        row.get::<_, String>(4)?,
        row.get::<_, Option<String>>(5)?,
    ))
}

fn card_from_row(row: CardRow) -> Result<EmotionCardRecord, DatabaseError> {
    let (id, timestamp, raw_input, response_text, quote, related) = row;
    Ok(EmotionCardRecord {
        id: parse_uuid(&id)?,
        timestamp: parse_timestamp(&timestamp)?,
        raw_input,
        response_text,
        quote,
        related_diagnosis_id: related.as_deref().map(parse_uuid).transpose()?,
    })
}
