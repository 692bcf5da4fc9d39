//! Daily release counter.
//!
//! Each release is logged against the local calendar day; the counter
//! resets implicitly when the day changes.

use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use rusqlite::{Connection, TransactionBehavior};

use crate::db::{self, DatabaseError};

/// Rate-limit collaborator consulted before every release.
pub trait ReleaseLimiter: Send + Sync {
    /// Whether one more release is allowed today.
    fn can_release(&self) -> bool;
    /// Count one release against today.
    fn release(&self) -> Result<(), DatabaseError>;
    /// Check and count in one step: `Ok(false)` when today's limit is
    /// already used up, in which case nothing is recorded.
    fn try_release(&self) -> Result<bool, DatabaseError>;
    /// Releases already made today.
    fn release_count(&self) -> Result<u32, DatabaseError>;
    fn daily_limit(&self) -> u32;

    /// Releases left today. Zero when the count cannot be read.
    fn remaining(&self) -> u32 {
        match self.release_count() {
            Ok(count) => self.daily_limit().saturating_sub(count),
            Err(_) => 0,
        }
    }
}

fn local_now() -> NaiveDateTime {
    chrono::Local::now().naive_local()
}

/// SQLite-backed daily limit.
pub struct DailyReleaseLimit {
    db_path: PathBuf,
    limit: u32,
    clock: fn() -> NaiveDateTime,
}

impl DailyReleaseLimit {
    pub fn new(db_path: &Path, limit: u32) -> Self {
        Self::with_clock(db_path, limit, local_now)
    }

    /// Use a fixed clock instead of local time.
    pub fn with_clock(db_path: &Path, limit: u32, clock: fn() -> NaiveDateTime) -> Self {
        Self {
            db_path: db_path.to_path_buf(),
            limit,
            clock,
        }
    }

    fn open(&self) -> Result<Connection, DatabaseError> {
        db::open_database(&self.db_path)
    }
}

impl ReleaseLimiter for DailyReleaseLimit {
    fn can_release(&self) -> bool {
        match self.release_count() {
            Ok(count) => count < self.limit,
            Err(e) => {
                tracing::warn!(error = %e, "Release counter unreadable, refusing release");
                false
            }
        }
    }

    fn release(&self) -> Result<(), DatabaseError> {
        let now = (self.clock)();
        let conn = self.open()?;
        let tx = conn.unchecked_transaction()?;
        let pruned = db::prune_releases_before(&tx, &now.date())?;
        db::insert_release(&tx, &now)?;
        tx.commit()?;

        if pruned > 0 {
            tracing::debug!(pruned, "Pruned release log from earlier days");
        }
        Ok(())
    }

    fn try_release(&self) -> Result<bool, DatabaseError> {
        let now = (self.clock)();
        let mut conn = self.open()?;
        // IMMEDIATE takes the write lock before counting, so concurrent
        // callers serialize on the check.
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let count = db::count_releases_on(&tx, &now.date())?;
        if count >= self.limit {
            return Ok(false);
        }
        let pruned = db::prune_releases_before(&tx, &now.date())?;
        db::insert_release(&tx, &now)?;
        tx.commit()?;

        if pruned > 0 {
            tracing::debug!(pruned, "Pruned release log from earlier days");
        }
        Ok(true)
    }

    fn release_count(&self) -> Result<u32, DatabaseError> {
        let today = (self.clock)().date();
        db::count_releases_on(&self.open()?, &today)
    }

    fn daily_limit(&self) -> u32 {
        self.limit
    }
}
