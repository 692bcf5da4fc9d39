//! Repository layer: entity-scoped database operations.
//!
//! One sub-module per table; everything is re-exported here.

mod emotion_card;
mod energy_diagnosis;
mod release_log;

use chrono::NaiveDateTime;
use uuid::Uuid;

use super::DatabaseError;

pub use emotion_card::*;
pub use energy_diagnosis::*;
pub use release_log::*;

/// Timestamps are stored with `NaiveDateTime`'s `Display` form.
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

pub(crate) fn parse_uuid(s: &str) -> Result<Uuid, DatabaseError> {
    Uuid::parse_str(s).map_err(|e| DatabaseError::ConstraintViolation(e.to_string()))
}

pub(crate) fn parse_timestamp(s: &str) -> Result<NaiveDateTime, DatabaseError> {
    NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT)
        .map_err(|e| DatabaseError::ConstraintViolation(format!("Bad timestamp '{s}': {e}")))
}
