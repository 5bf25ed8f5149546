//! Slot store.

use chrono::{NaiveDate, NaiveTime};
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{is_unique_violation, DbError, DbResult};
use crate::models::{format_date, format_time, parse_date, parse_time, Slot, SlotState};

const SLOT_COLUMNS: &str = "id, doctor_id, date, start_time, state, created_at";

/// Slot operations over a connection or an open transaction.
pub struct SlotStore<'c> {
    conn: &'c Connection,
}

impl<'c> SlotStore<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    /// Insert a slot unless its natural key already exists.
    ///
    /// Returns `false` when the key was taken; no row is written in that case.
    pub fn insert_if_absent(&self, slot: &Slot) -> DbResult<bool> {
        let result = self.conn.execute(
            r#"
            INSERT INTO slots (id, doctor_id, date, start_time, state, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT (doctor_id, date, start_time) DO NOTHING
            "#,
            params![
                slot.id,
                slot.doctor_id,
                format_date(slot.date),
                format_time(slot.start_time),
                slot.state.as_str(),
                slot.created_at,
            ],
        );

        match result {
            Ok(rows_affected) => Ok(rows_affected > 0),
            Err(e) if is_unique_violation(&e) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Create an available slot; a duplicate natural key is a `Conflict`.
    pub fn create(
        &self,
        doctor_id: &str,
        date: NaiveDate,
        start_time: NaiveTime,
        created_at: &str,
    ) -> DbResult<Slot> {
        let slot = Slot::new(doctor_id.to_string(), date, start_time, created_at.to_string());
        if self.insert_if_absent(&slot)? {
            Ok(slot)
        } else {
            Err(DbError::Conflict(format!(
                "slot {} {} {} already exists",
                doctor_id,
                format_date(date),
                format_time(start_time)
            )))
        }
    }

    /// Get a slot by ID.
    pub fn get(&self, slot_id: &str) -> DbResult<Option<Slot>> {
        let sql = format!("SELECT {SLOT_COLUMNS} FROM slots WHERE id = ?");
        self.conn
            .query_row(&sql, [slot_id], SlotRow::from_row)
            .optional()?
            .map(Slot::try_from)
            .transpose()
    }

    /// Look up a slot by natural key, in any state.
    pub fn find_by_key(
        &self,
        doctor_id: &str,
        date: NaiveDate,
        start_time: NaiveTime,
    ) -> DbResult<Option<Slot>> {
        let sql = format!(
            "SELECT {SLOT_COLUMNS} FROM slots WHERE doctor_id = ?1 AND date = ?2 AND start_time = ?3"
        );
        self.conn
            .query_row(
                &sql,
                params![doctor_id, format_date(date), format_time(start_time)],
                SlotRow::from_row,
            )
            .optional()?
            .map(Slot::try_from)
            .transpose()
    }

    /// Available slots for a doctor on a date, earliest first.
    pub fn list_available(&self, doctor_id: &str, date: NaiveDate) -> DbResult<Vec<Slot>> {
        let sql = format!(
            r#"
            SELECT {SLOT_COLUMNS} FROM slots
            WHERE doctor_id = ?1 AND date = ?2 AND state = 'available'
            ORDER BY start_time ASC
            "#
        );
        self.collect(&sql, params![doctor_id, format_date(date)])
    }

    /// Every slot for a doctor on a date regardless of state, earliest first.
    pub fn list_for_doctor(&self, doctor_id: &str, date: NaiveDate) -> DbResult<Vec<Slot>> {
        let sql = format!(
            r#"
            SELECT {SLOT_COLUMNS} FROM slots
            WHERE doctor_id = ?1 AND date = ?2
            ORDER BY start_time ASC
            "#
        );
        self.collect(&sql, params![doctor_id, format_date(date)])
    }

    /// Compare-and-set on slot state.
    ///
    /// Returns `false` if the slot is missing or not in `from`.
    pub fn transition(&self, slot_id: &str, from: SlotState, to: SlotState) -> DbResult<bool> {
        let rows_affected = self.conn.execute(
            "UPDATE slots SET state = ?3 WHERE id = ?1 AND state = ?2",
            params![slot_id, from.as_str(), to.as_str()],
        )?;
        Ok(rows_affected > 0)
    }

    /// Return a held or booked slot to `Available`.
    ///
    /// Returns `false` if it was already available.
    pub fn release(&self, slot_id: &str) -> DbResult<bool> {
        let rows_affected = self.conn.execute(
            "UPDATE slots SET state = 'available' WHERE id = ?1 AND state IN ('held', 'booked')",
            [slot_id],
        )?;
        Ok(rows_affected > 0)
    }

    fn collect(&self, sql: &str, params: impl rusqlite::Params) -> DbResult<Vec<Slot>> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map(params, SlotRow::from_row)?;

        let mut slots = Vec::new();
        for row in rows {
            slots.push(Slot::try_from(row?)?);
        }
        Ok(slots)
    }
}

/// Intermediate row struct for database mapping.
struct SlotRow {
    id: String,
    doctor_id: String,
    date: String,
    start_time: String,
    state: String,
    created_at: String,
}

impl SlotRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            doctor_id: row.get(1)?,
            date: row.get(2)?,
            start_time: row.get(3)?,
            state: row.get(4)?,
            created_at: row.get(5)?,
        })
    }
}

impl TryFrom<SlotRow> for Slot {
    type Error = DbError;

    fn try_from(row: SlotRow) -> Result<Self, Self::Error> {
        let state = SlotState::parse(&row.state)
            .ok_or_else(|| DbError::Constraint(format!("Unknown slot state: {}", row.state)))?;
        let date = parse_date(&row.date)
            .ok_or_else(|| DbError::Constraint(format!("Bad slot date: {}", row.date)))?;
        let start_time = parse_time(&row.start_time)
            .ok_or_else(|| DbError::Constraint(format!("Bad slot time: {}", row.start_time)))?;

        Ok(Slot {
            id: row.id,
            doctor_id: row.doctor_id,
            date,
            start_time,
            state,
            created_at: row.created_at,
        })
    }
}
