//! Slotbook Core Library
//!
//! Slot reservation and booking transaction engine for doctor appointments.
//!
//! # Architecture
//!
//! ```text
//!   create_slot ──► Slot Store (AVAILABLE)
//!                        │
//!   book ───────► compare-and-set AVAILABLE → HELD ──► doctor check ──► Appointment Store (PENDING)
//!                        │                                  │ unknown
//!                        │                                  └──► rollback (slot stays AVAILABLE)
//!                        │
//!   confirm ────► PENDING → CONFIRMED, HELD → BOOKED
//!   cancel ─────► {PENDING|CONFIRMED} → CANCELLED, slot → AVAILABLE
//!   reaper ─────► PENDING past deadline → EXPIRED, slot → AVAILABLE
//! ```
//!
//! # Core Principle
//!
//! **A slot has at most one active appointment.** Every state change is a
//! single compare-and-set inside a write transaction; the loser of a race gets
//! an error and nothing is retried.
//!
//! # Modules
//!
//! - [`db`]: SQLite stores for doctors, slots and appointments
//! - [`models`]: Domain types (Doctor, Slot, Appointment, ...)
//! - [`engine`]: Reservation engine and expiry reaper
//! - [`config`]: Engine policy
//! - [`clock`]: Injectable time source

pub mod clock;
pub mod config;
pub mod db;
pub mod engine;
pub mod models;

// Re-export commonly used types
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{CancellationMode, EngineConfig};
pub use db::{Database, DbError, StoreStats};
pub use engine::{ExpiryReaper, ReapReport, ReservationEngine};
pub use models::{
    Appointment, AppointmentStatus, AppointmentSummary, BookingRequest, Doctor, NewDoctor,
    PatientDetails, Slot, SlotState,
};

use std::path::Path;
use std::sync::{Arc, Mutex};

// =========================================================================
// Error Type
// =========================================================================

#[derive(Debug, thiserror::Error)]
pub enum BookingError {
    #[error("Slot unavailable: doctor {doctor_id} on {date} at {time}")]
    SlotUnavailable {
        doctor_id: String,
        date: String,
        time: String,
    },

    #[error("Doctor not found: {0}")]
    DoctorNotFound(String),

    #[error("Appointment not found: {0}")]
    NotFound(String),

    #[error("Appointment {id} is already {status:?}")]
    AlreadyFinalized {
        id: String,
        status: AppointmentStatus,
    },

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Database error: {0}")]
    Database(DbError),

    #[error("Lock poisoned: {0}")]
    LockPoisoned(String),
}

pub type BookingResult<T> = Result<T, BookingError>;

impl From<DbError> for BookingError {
    fn from(e: DbError) -> Self {
        match e {
            DbError::Conflict(msg) => BookingError::Conflict(msg),
            other => BookingError::Database(other),
        }
    }
}

impl From<rusqlite::Error> for BookingError {
    fn from(e: rusqlite::Error) -> Self {
        BookingError::Database(DbError::Sqlite(e))
    }
}

impl<T> From<std::sync::PoisonError<T>> for BookingError {
    fn from(e: std::sync::PoisonError<T>) -> Self {
        BookingError::LockPoisoned(e.to_string())
    }
}

// =========================================================================
// Main API Object
// =========================================================================

/// Thread-safe booking service.
///
/// Owns the database, policy and clock. Share it between request handlers
/// and the [`ExpiryReaper`] through an `Arc`.
pub struct SlotBook {
    db: Mutex<Database>,
    config: EngineConfig,
    clock: Arc<dyn Clock>,
}

impl SlotBook {
    /// Open or create a database at the given path.
    pub fn open<P: AsRef<Path>>(path: P, config: EngineConfig) -> BookingResult<Self> {
        let db = Database::open(path)?;
        db.set_busy_timeout(config.busy_timeout())?;
        Ok(Self::from_database(db, config, Arc::new(SystemClock)))
    }

    /// Create an in-memory database (for testing).
    pub fn open_in_memory(config: EngineConfig) -> BookingResult<Self> {
        let db = Database::open_in_memory()?;
        Ok(Self::from_database(db, config, Arc::new(SystemClock)))
    }

    pub fn from_database(db: Database, config: EngineConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            db: Mutex::new(db),
            config,
            clock,
        }
    }

    /// Replace the time source.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn with_engine<T>(
        &self,
        f: impl FnOnce(&mut ReservationEngine<'_>) -> BookingResult<T>,
    ) -> BookingResult<T> {
        let mut db = self.db.lock()?;
        let mut engine = ReservationEngine::new(&mut db, &self.config, self.clock.as_ref());
        f(&mut engine)
    }

    // =========================================================================
    // Doctor Operations
    // =========================================================================

    /// Register a doctor.
    pub fn create_doctor(&self, fields: NewDoctor) -> BookingResult<Doctor> {
        self.with_engine(|engine| engine.create_doctor(fields))
    }

    /// Get a doctor by ID.
    pub fn get_doctor(&self, id: &str) -> BookingResult<Doctor> {
        let db = self.db.lock()?;
        db.doctors()
            .get(id)?
            .ok_or_else(|| BookingError::DoctorNotFound(id.to_string()))
    }

    pub fn list_doctors(&self) -> BookingResult<Vec<Doctor>> {
        let db = self.db.lock()?;
        Ok(db.doctors().list()?)
    }

    // =========================================================================
    // Slot Operations
    // =========================================================================

    /// Offer a slot; fails with `Conflict` if the doctor/date/time already exists.
    pub fn create_slot(&self, doctor_id: &str, date: &str, start_time: &str) -> BookingResult<Slot> {
        self.with_engine(|engine| engine.create_slot(doctor_id, date, start_time))
    }

    /// Offer a slot every `step_minutes` in `[day_start, day_end)`, skipping existing ones.
    pub fn generate_daily_slots(
        &self,
        doctor_id: &str,
        date: &str,
        day_start: &str,
        day_end: &str,
        step_minutes: u32,
    ) -> BookingResult<Vec<Slot>> {
        self.with_engine(|engine| {
            engine.generate_daily_slots(doctor_id, date, day_start, day_end, step_minutes)
        })
    }

    /// Available slots for a doctor on a date, earliest first.
    pub fn list_available_slots(&self, doctor_id: &str, date: &str) -> BookingResult<Vec<Slot>> {
        self.with_engine(|engine| engine.list_available_slots(doctor_id, date))
    }

    // =========================================================================
    // Appointment Operations
    // =========================================================================

    pub fn book_appointment(&self, request: &BookingRequest) -> BookingResult<Appointment> {
        self.with_engine(|engine| engine.book(request))
    }

    pub fn confirm_appointment(&self, id: &str) -> BookingResult<Appointment> {
        self.with_engine(|engine| engine.confirm(id))
    }

    pub fn cancel_appointment(&self, id: &str) -> BookingResult<Appointment> {
        self.with_engine(|engine| engine.cancel(id))
    }

    pub fn get_appointment(&self, id: &str) -> BookingResult<Appointment> {
        self.with_engine(|engine| engine.get_appointment(id))
    }

    /// All appointments, newest first.
    pub fn list_appointments(&self) -> BookingResult<Vec<Appointment>> {
        let db = self.db.lock()?;
        Ok(db.appointments().list_all()?)
    }

    /// All appointments with doctor details, newest first.
    pub fn list_appointment_summaries(&self) -> BookingResult<Vec<AppointmentSummary>> {
        let db = self.db.lock()?;
        Ok(db.appointments().list_summaries()?)
    }

    // =========================================================================
    // Maintenance
    // =========================================================================

    /// Run one expiry sweep now.
    pub fn reap_expired(&self) -> BookingResult<ReapReport> {
        self.with_engine(|engine| engine.reap_expired())
    }

    /// Store sizes for health checks.
    pub fn stats(&self) -> BookingResult<StoreStats> {
        let db = self.db.lock()?;
        Ok(db.stats()?)
    }
}
