use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::{params, Connection};

use crate::db::DatabaseError;

/// Record one release against its local calendar day.
pub fn insert_release(conn: &Connection, released_at: &NaiveDateTime) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO release_log (release_date, released_at) VALUES (?1, ?2)",
        params![released_at.date().to_string(), released_at.to_string()],
    )?;
    Ok(())
}

pub fn count_releases_on(conn: &Connection, day: &NaiveDate) -> Result<u32, DatabaseError> {
    let count: u32 = conn.query_row(
        "SELECT COUNT(*) FROM release_log WHERE release_date = ?1",
        params![day.to_string()],
        |row| row.get(0),
    )?;
    Ok(count)
}

/// Drop log rows older than `keep_from` (exclusive). Returns rows removed.
pub fn prune_releases_before(conn: &Connection, keep_from: &NaiveDate) -> Result<usize, DatabaseError> {
    let removed = conn.execute(
        "DELETE FROM release_log WHERE release_date < ?1",
        params![keep_from.to_string()],
    )?;
    Ok(removed)
}
