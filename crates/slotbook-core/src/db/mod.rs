//! Database layer for slotbook.
//!
//! Each store is a thin view over a [`Connection`], so the same operations run
//! either directly on the database or inside a [`Transaction`] (which derefs
//! to `Connection`). Every state change is a single conditional `UPDATE`;
//! callers learn whether they won from the affected-row count.

mod appointments;
mod doctors;
mod schema;
mod slots;

pub use appointments::*;
pub use doctors::*;
pub use schema::*;
pub use slots::*;

use std::path::Path;
use std::time::Duration;

use rusqlite::{Connection, Transaction, TransactionBehavior};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Database errors.
#[derive(Error, Debug)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Duplicate record: {0}")]
    Conflict(String),

    #[error("Constraint violation: {0}")]
    Constraint(String),
}

pub type DbResult<T> = Result<T, DbError>;

const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Database connection wrapper.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open database at path, creating if needed.
    pub fn open<P: AsRef<Path>>(path: P) -> DbResult<Self> {
        let conn = Connection::open(path)?;
        // Readers keep going while a booking transaction holds the write lock.
        let _mode: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        let db = Self { conn };
        db.initialize()?;
        Ok(db)
    }

    /// Create in-memory database (for testing).
    pub fn open_in_memory() -> DbResult<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.initialize()?;
        Ok(db)
    }

    /// Initialize schema.
    fn initialize(&self) -> DbResult<()> {
        self.conn.busy_timeout(DEFAULT_BUSY_TIMEOUT)?;
        self.conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    /// How long a writer waits for a competing writer before failing with `SQLITE_BUSY`.
    pub fn set_busy_timeout(&self, timeout: Duration) -> DbResult<()> {
        self.conn.busy_timeout(timeout)?;
        Ok(())
    }

    /// Get raw connection (for advanced queries).
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Begin a write transaction.
    ///
    /// `IMMEDIATE` takes the write lock up front, so everything read inside the
    /// transaction is current until commit and no later lock upgrade can fail.
    pub fn transaction(&mut self) -> DbResult<Transaction<'_>> {
        Ok(self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?)
    }

    pub fn slots(&self) -> SlotStore<'_> {
        SlotStore::new(&self.conn)
    }

    pub fn appointments(&self) -> AppointmentStore<'_> {
        AppointmentStore::new(&self.conn)
    }

    pub fn doctors(&self) -> DoctorDirectory<'_> {
        DoctorDirectory::new(&self.conn)
    }

    /// Row counts for health reporting.
    pub fn stats(&self) -> DbResult<StoreStats> {
        let count = |sql: &str| -> DbResult<u64> {
            let n: i64 = self.conn.query_row(sql, [], |row| row.get(0))?;
            Ok(n as u64)
        };

        Ok(StoreStats {
            doctors: count("SELECT COUNT(*) FROM doctors")?,
            slots: count("SELECT COUNT(*) FROM slots")?,
            available_slots: count("SELECT COUNT(*) FROM slots WHERE state = 'available'")?,
            appointments: count("SELECT COUNT(*) FROM appointments")?,
            pending: count("SELECT COUNT(*) FROM appointments WHERE status = 'pending'")?,
            confirmed: count("SELECT COUNT(*) FROM appointments WHERE status = 'confirmed'")?,
            cancelled: count("SELECT COUNT(*) FROM appointments WHERE status = 'cancelled'")?,
            expired: count("SELECT COUNT(*) FROM appointments WHERE status = 'expired'")?,
        })
    }
}

/// Snapshot of store sizes.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoreStats {
    pub doctors: u64,
    pub slots: u64,
    pub available_slots: u64,
    pub appointments: u64,
    pub pending: u64,
    pub confirmed: u64,
    pub cancelled: u64,
    pub expired: u64,
}

/// True for UNIQUE / PRIMARY KEY violations.
pub(crate) fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                || e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
    )
}
