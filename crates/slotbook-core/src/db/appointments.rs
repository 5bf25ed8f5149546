//! Appointment store.

use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{DbError, DbResult};
use crate::models::{
    format_date, format_time, parse_date, parse_time, Appointment, AppointmentStatus,
    AppointmentSummary,
};

const APPOINTMENT_COLUMNS: &str = "a.id, a.doctor_id, a.slot_id, a.patient_name, a.patient_email, \
     a.patient_phone, a.appointment_date, a.appointment_time, a.reason, a.status, \
     a.expires_at, a.created_at, a.updated_at";

/// Appointment operations over a connection or an open transaction.
pub struct AppointmentStore<'c> {
    conn: &'c Connection,
}

impl<'c> AppointmentStore<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    /// Insert a new appointment.
    pub fn insert(&self, appointment: &Appointment) -> DbResult<()> {
        self.conn.execute(
            r#"
            INSERT INTO appointments (
                id, doctor_id, slot_id, patient_name, patient_email, patient_phone,
                appointment_date, appointment_time, reason, status,
                expires_at, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
            "#,
            params![
                appointment.id,
                appointment.doctor_id,
                appointment.slot_id,
                appointment.patient_name,
                appointment.patient_email,
                appointment.patient_phone,
                format_date(appointment.appointment_date),
                format_time(appointment.appointment_time),
                appointment.reason,
                appointment.status.as_str(),
                appointment.expires_at,
                appointment.created_at,
                appointment.updated_at,
            ],
        )?;
        Ok(())
    }

    /// Get an appointment by ID.
    pub fn get(&self, id: &str) -> DbResult<Option<Appointment>> {
        let sql = format!("SELECT {APPOINTMENT_COLUMNS} FROM appointments a WHERE a.id = ?");
        self.conn
            .query_row(&sql, [id], AppointmentRow::from_row)
            .optional()?
            .map(Appointment::try_from)
            .transpose()
    }

    /// All appointments, newest first.
    pub fn list_all(&self) -> DbResult<Vec<Appointment>> {
        let sql = format!(
            "SELECT {APPOINTMENT_COLUMNS} FROM appointments a ORDER BY a.created_at DESC, a.rowid DESC"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([], AppointmentRow::from_row)?;

        let mut appointments = Vec::new();
        for row in rows {
            appointments.push(Appointment::try_from(row?)?);
        }
        Ok(appointments)
    }

    /// All appointments with doctor name and specialization, newest first.
    pub fn list_summaries(&self) -> DbResult<Vec<AppointmentSummary>> {
        let sql = format!(
            r#"
            SELECT {APPOINTMENT_COLUMNS}, d.name, d.specialization
            FROM appointments a
            LEFT JOIN doctors d ON d.id = a.doctor_id
            ORDER BY a.created_at DESC, a.rowid DESC
            "#
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([], |row| {
            Ok((
                AppointmentRow::from_row(row)?,
                row.get::<_, Option<String>>(13)?,
                row.get::<_, Option<String>>(14)?,
            ))
        })?;

        let mut summaries = Vec::new();
        for row in rows {
            let (appointment, doctor_name, specialization) = row?;
            summaries.push(AppointmentSummary {
                appointment: appointment.try_into()?,
                doctor_name,
                specialization,
            });
        }
        Ok(summaries)
    }

    /// Compare-and-set on status.
    ///
    /// Leaving `Pending` clears `expires_at`. Returns `false` if the
    /// appointment is missing or not in `expected`.
    pub fn set_status(
        &self,
        id: &str,
        expected: AppointmentStatus,
        new: AppointmentStatus,
        at: &str,
    ) -> DbResult<bool> {
        let rows_affected = self.conn.execute(
            r#"
            UPDATE appointments SET
                status = ?3,
                expires_at = CASE WHEN ?3 = 'pending' THEN expires_at ELSE NULL END,
                updated_at = ?4
            WHERE id = ?1 AND status = ?2
            "#,
            params![id, expected.as_str(), new.as_str(), at],
        )?;
        Ok(rows_affected > 0)
    }

    /// `Pending -> Expired`, only if the hold deadline is at or before `now`.
    pub fn expire_if_due(&self, id: &str, now: &str) -> DbResult<bool> {
        let rows_affected = self.conn.execute(
            r#"
            UPDATE appointments SET
                status = 'expired',
                expires_at = NULL,
                updated_at = ?2
            WHERE id = ?1 AND status = 'pending' AND expires_at <= ?2
            "#,
            params![id, now],
        )?;
        Ok(rows_affected > 0)
    }

    /// IDs of pending appointments whose deadline has passed, earliest deadline first.
    pub fn list_expired(&self, now: &str, limit: u32) -> DbResult<Vec<String>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id FROM appointments
            WHERE status = 'pending' AND expires_at <= ?1
            ORDER BY expires_at ASC
            LIMIT ?2
            "#,
        )?;

        let ids = stmt
            .query_map(params![now, limit], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(ids)
    }

    /// Delete an appointment.
    pub fn delete(&self, id: &str) -> DbResult<bool> {
        let rows_affected = self
            .conn
            .execute("DELETE FROM appointments WHERE id = ?", [id])?;
        Ok(rows_affected > 0)
    }

    /// Delete only if the status still matches.
    pub fn delete_if_status(&self, id: &str, expected: AppointmentStatus) -> DbResult<bool> {
        let rows_affected = self.conn.execute(
            "DELETE FROM appointments WHERE id = ?1 AND status = ?2",
            params![id, expected.as_str()],
        )?;
        Ok(rows_affected > 0)
    }

    /// Active appointments referencing a slot. Never more than one.
    pub fn count_active_for_slot(&self, slot_id: &str) -> DbResult<u32> {
        let count: u32 = self.conn.query_row(
            "SELECT COUNT(*) FROM appointments WHERE slot_id = ? AND status IN ('pending', 'confirmed')",
            [slot_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}

/// Intermediate row struct for database mapping.
struct AppointmentRow {
    id: String,
    doctor_id: String,
    slot_id: String,
    patient_name: String,
    patient_email: String,
    patient_phone: String,
    appointment_date: String,
    appointment_time: String,
    reason: String,
    status: String,
    expires_at: Option<String>,
    created_at: String,
    updated_at: String,
}

impl AppointmentRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            doctor_id: row.get(1)?,
            slot_id: row.get(2)?,
            patient_name: row.get(3)?,
            patient_email: row.get(4)?,
            patient_phone: row.get(5)?,
            appointment_date: row.get(6)?,
            appointment_time: row.get(7)?,
            reason: row.get(8)?,
            status: row.get(9)?,
            expires_at: row.get(10)?,
            created_at: row.get(11)?,
            updated_at: row.get(12)?,
        })
    }
}

impl TryFrom<AppointmentRow> for Appointment {
    type Error = DbError;

    fn try_from(row: AppointmentRow) -> Result<Self, Self::Error> {
        let status = AppointmentStatus::parse(&row.status).ok_or_else(|| {
            DbError::Constraint(format!("Unknown appointment status: {}", row.status))
        })?;
        let appointment_date = parse_date(&row.appointment_date).ok_or_else(|| {
            DbError::Constraint(format!("Bad appointment date: {}", row.appointment_date))
        })?;
        let appointment_time = parse_time(&row.appointment_time).ok_or_else(|| {
            DbError::Constraint(format!("Bad appointment time: {}", row.appointment_time))
        })?;

        Ok(Appointment {
            id: row.id,
            doctor_id: row.doctor_id,
            slot_id: row.slot_id,
            patient_name: row.patient_name,
            patient_email: row.patient_email,
            patient_phone: row.patient_phone,
            appointment_date,
            appointment_time,
            reason: row.reason,
            status,
            expires_at: row.expires_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}
