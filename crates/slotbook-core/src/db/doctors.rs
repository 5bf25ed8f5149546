//! Doctor directory.

use rusqlite::{params, Connection, OptionalExtension, Row};

use super::DbResult;
use crate::models::Doctor;

/// Read-mostly doctor reference data.
pub struct DoctorDirectory<'c> {
    conn: &'c Connection,
}

impl<'c> DoctorDirectory<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    /// Insert a new doctor.
    pub fn insert(&self, doctor: &Doctor) -> DbResult<()> {
        self.conn.execute(
            r#"
            INSERT INTO doctors (
                id, name, specialization, email, phone,
                experience_years, clinic_name, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
            params![
                doctor.id,
                doctor.name,
                doctor.specialization,
                doctor.email,
                doctor.phone,
                doctor.experience_years,
                doctor.clinic_name,
                doctor.created_at,
            ],
        )?;
        Ok(())
    }

    /// Get a doctor by ID.
    pub fn get(&self, id: &str) -> DbResult<Option<Doctor>> {
        self.conn
            .query_row(
                r#"
                SELECT id, name, specialization, email, phone,
                       experience_years, clinic_name, created_at
                FROM doctors
                WHERE id = ?
                "#,
                [id],
                doctor_from_row,
            )
            .optional()
            .map_err(Into::into)
    }

    pub fn exists(&self, id: &str) -> DbResult<bool> {
        let found: Option<i64> = self
            .conn
            .query_row("SELECT 1 FROM doctors WHERE id = ?", [id], |row| row.get(0))
            .optional()?;
        Ok(found.is_some())
    }

    /// List all doctors by name.
    pub fn list(&self) -> DbResult<Vec<Doctor>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, name, specialization, email, phone,
                   experience_years, clinic_name, created_at
            FROM doctors
            ORDER BY name
            "#,
        )?;

        let doctors = stmt
            .query_map([], doctor_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(doctors)
    }
}

fn doctor_from_row(row: &Row<'_>) -> rusqlite::Result<Doctor> {
    Ok(Doctor {
        id: row.get(0)?,
        name: row.get(1)?,
        specialization: row.get(2)?,
        email: row.get(3)?,
        phone: row.get(4)?,
        experience_years: row.get(5)?,
        clinic_name: row.get(6)?,
        created_at: row.get(7)?,
    })
}
