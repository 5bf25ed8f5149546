//! Reservation engine: the booking transactions.
//!
//! Every operation runs inside one `IMMEDIATE` transaction and changes state
//! only through the stores' compare-and-set primitives. A booking that fails
//! after its slot was taken (unknown doctor) is undone by rolling the
//! transaction back, so a slot can never be left held without an owner.

mod reaper;

pub use reaper::*;

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, Utc};
use tracing::{debug, info};

use crate::clock::{format_timestamp, Clock};
use crate::config::{CancellationMode, EngineConfig};
use crate::db::{AppointmentStore, Database, DoctorDirectory, SlotStore};
use crate::models::{
    format_date, format_time, parse_date, parse_time, Appointment, AppointmentStatus,
    BookingRequest, Doctor, NewDoctor, Slot, SlotState,
};
use crate::{BookingError, BookingResult};

/// Booking transactions over an injected database.
pub struct ReservationEngine<'a> {
    db: &'a mut Database,
    config: &'a EngineConfig,
    clock: &'a dyn Clock,
}

impl<'a> ReservationEngine<'a> {
    pub fn new(db: &'a mut Database, config: &'a EngineConfig, clock: &'a dyn Clock) -> Self {
        Self { db, config, clock }
    }

    // =========================================================================
    // Directory
    // =========================================================================

    /// Register a doctor.
    pub fn create_doctor(&mut self, fields: NewDoctor) -> BookingResult<Doctor> {
        let missing = fields.missing_fields();
        if !missing.is_empty() {
            return Err(BookingError::InvalidInput(format!(
                "missing required fields: {}",
                missing.join(", ")
            )));
        }

        let doctor = Doctor::new(fields, format_timestamp(self.clock.now()));
        self.db.doctors().insert(&doctor)?;
        info!(doctor_id = %doctor.id, name = %doctor.name, "Doctor created");
        Ok(doctor)
    }

    // =========================================================================
    // Slots
    // =========================================================================

    /// Offer a new slot. The doctor must exist and the natural key must be free.
    pub fn create_slot(&mut self, doctor_id: &str, date: &str, start_time: &str) -> BookingResult<Slot> {
        let date = parse_date_input(date)?;
        let start_time = parse_time_input(start_time)?;
        let created_at = format_timestamp(self.clock.now());

        let tx = self.db.transaction()?;
        if !DoctorDirectory::new(&tx).exists(doctor_id)? {
            return Err(BookingError::DoctorNotFound(doctor_id.to_string()));
        }
        let slot = SlotStore::new(&tx).create(doctor_id, date, start_time, &created_at)?;
        tx.commit()?;

        info!(
            slot_id = %slot.id,
            doctor_id,
            date = %format_date(date),
            start_time = %format_time(start_time),
            "Slot created"
        );
        Ok(slot)
    }

    /// Offer a slot every `step_minutes` in `[day_start, day_end)`.
    ///
    /// Times that already have a slot are skipped; only new slots are returned.
    pub fn generate_daily_slots(
        &mut self,
        doctor_id: &str,
        date: &str,
        day_start: &str,
        day_end: &str,
        step_minutes: u32,
    ) -> BookingResult<Vec<Slot>> {
        let date = parse_date_input(date)?;
        let day_start = parse_time_input(day_start)?;
        let day_end = parse_time_input(day_end)?;
        if step_minutes == 0 {
            return Err(BookingError::InvalidInput("step_minutes must be positive".into()));
        }
        if day_end <= day_start {
            return Err(BookingError::InvalidInput(format!(
                "day_end {} must be after day_start {}",
                format_time(day_end),
                format_time(day_start)
            )));
        }
        let step = Duration::minutes(i64::from(step_minutes));
        let created_at = format_timestamp(self.clock.now());

        let tx = self.db.transaction()?;
        if !DoctorDirectory::new(&tx).exists(doctor_id)? {
            return Err(BookingError::DoctorNotFound(doctor_id.to_string()));
        }

        let store = SlotStore::new(&tx);
        let mut created = Vec::new();
        let mut start = day_start;
        while start < day_end {
            let slot = Slot::new(doctor_id.to_string(), date, start, created_at.clone());
            if store.insert_if_absent(&slot)? {
                created.push(slot);
            }

            let (next, wrapped) = start.overflowing_add_signed(step);
            if wrapped != 0 {
                break;
            }
            start = next;
        }
        tx.commit()?;

        info!(doctor_id, date = %format_date(date), count = created.len(), "Daily slots generated");
        Ok(created)
    }

    /// Open slots for a doctor on a date, earliest first.
    pub fn list_available_slots(&self, doctor_id: &str, date: &str) -> BookingResult<Vec<Slot>> {
        let date = parse_date_input(date)?;
        Ok(self.db.slots().list_available(doctor_id, date)?)
    }

    // =========================================================================
    // Appointments
    // =========================================================================

    /// Reserve a slot and create its appointment.
    ///
    /// With `requires_confirmation` the slot becomes `Held` and the appointment
    /// `Pending` until `now + hold_duration`; otherwise `Booked` / `Confirmed`.
    /// A request that loses the slot's compare-and-set gets `SlotUnavailable`
    /// and is not retried.
    pub fn book(&mut self, request: &BookingRequest) -> BookingResult<Appointment> {
        let missing = request.missing_fields();
        if !missing.is_empty() {
            return Err(BookingError::InvalidInput(format!(
                "missing required fields: {}",
                missing.join(", ")
            )));
        }
        let date = parse_date_input(&request.appointment_date)?;
        let time = parse_time_input(&request.appointment_time)?;

        let now = self.clock.now();
        let (slot_state, status, expires_at) = if self.config.requires_confirmation {
            let deadline = hold_deadline(now, self.config.hold_duration())?;
            (
                SlotState::Held,
                AppointmentStatus::Pending,
                Some(format_timestamp(deadline)),
            )
        } else {
            (SlotState::Booked, AppointmentStatus::Confirmed, None)
        };
        let unavailable = || BookingError::SlotUnavailable {
            doctor_id: request.doctor_id.clone(),
            date: format_date(date),
            time: format_time(time),
        };

        let tx = self.db.transaction()?;
        let slots = SlotStore::new(&tx);

        let Some(slot) = slots.find_by_key(&request.doctor_id, date, time)? else {
            debug!(doctor_id = %request.doctor_id, date = %format_date(date), time = %format_time(time), "No such slot");
            return Err(unavailable());
        };
        if !slots.transition(&slot.id, SlotState::Available, slot_state)? {
            debug!(slot_id = %slot.id, state = ?slot.state, "Slot already taken");
            return Err(unavailable());
        }

        if !DoctorDirectory::new(&tx).exists(&request.doctor_id)? {
            // Undo the hold taken above.
            tx.rollback()?;
            debug!(slot_id = %slot.id, doctor_id = %request.doctor_id, "Hold released, doctor unknown");
            return Err(BookingError::DoctorNotFound(request.doctor_id.clone()));
        }

        let slot = Slot {
            state: slot_state,
            ..slot
        };
        let appointment = Appointment::new(
            &slot,
            &request.patient,
            status,
            expires_at,
            format_timestamp(now),
        );
        AppointmentStore::new(&tx).insert(&appointment)?;
        tx.commit()?;

        info!(
            appointment_id = %appointment.id,
            slot_id = %slot.id,
            status = ?appointment.status,
            patient = %appointment.patient_name,
            "Appointment booked"
        );
        Ok(appointment)
    }

    /// `Pending -> Confirmed`; clears the deadline and marks the slot `Booked`.
    ///
    /// A pending appointment past its deadline still confirms if the reaper has
    /// not swept it yet.
    pub fn confirm(&mut self, id: &str) -> BookingResult<Appointment> {
        let at = format_timestamp(self.clock.now());

        let tx = self.db.transaction()?;
        let appointments = AppointmentStore::new(&tx);
        let Some(current) = appointments.get(id)? else {
            return Err(BookingError::NotFound(id.to_string()));
        };

        if !appointments.set_status(id, AppointmentStatus::Pending, AppointmentStatus::Confirmed, &at)? {
            debug!(appointment_id = id, status = ?current.status, "Confirm rejected");
            return Err(BookingError::AlreadyFinalized {
                id: id.to_string(),
                status: current.status,
            });
        }
        SlotStore::new(&tx).transition(&current.slot_id, SlotState::Held, SlotState::Booked)?;

        let confirmed = appointments
            .get(id)?
            .ok_or_else(|| BookingError::NotFound(id.to_string()))?;
        tx.commit()?;

        info!(appointment_id = id, slot_id = %confirmed.slot_id, "Appointment confirmed");
        Ok(confirmed)
    }

    /// Cancel an appointment and release its slot.
    ///
    /// Cancelling an appointment that is already cancelled or expired changes
    /// nothing and never touches the slot, which may belong to someone else by
    /// now. In `Delete` mode the row is removed and the returned record is the
    /// last state it had, marked cancelled.
    pub fn cancel(&mut self, id: &str) -> BookingResult<Appointment> {
        let at = format_timestamp(self.clock.now());
        let mode = self.config.cancellation;

        let tx = self.db.transaction()?;
        let appointments = AppointmentStore::new(&tx);
        let Some(current) = appointments.get(id)? else {
            return Err(BookingError::NotFound(id.to_string()));
        };

        if !current.is_active() {
            if mode == CancellationMode::Delete {
                appointments.delete(id)?;
                tx.commit()?;
            }
            debug!(appointment_id = id, status = ?current.status, "Cancel on finalized appointment");
            return Ok(current);
        }

        let won = match mode {
            CancellationMode::MarkCancelled => {
                appointments.set_status(id, current.status, AppointmentStatus::Cancelled, &at)?
            }
            CancellationMode::Delete => appointments.delete_if_status(id, current.status)?,
        };
        if !won {
            return Err(BookingError::NotFound(id.to_string()));
        }

        let released = SlotStore::new(&tx).release(&current.slot_id)?;
        if !released {
            debug!(appointment_id = id, slot_id = %current.slot_id, "Slot was already available");
        }

        let cancelled = match mode {
            CancellationMode::MarkCancelled => appointments
                .get(id)?
                .ok_or_else(|| BookingError::NotFound(id.to_string()))?,
            CancellationMode::Delete => Appointment {
                status: AppointmentStatus::Cancelled,
                expires_at: None,
                updated_at: at,
                ..current
            },
        };
        tx.commit()?;

        info!(appointment_id = id, slot_id = %cancelled.slot_id, released, "Appointment cancelled");
        Ok(cancelled)
    }

    pub fn get_appointment(&self, id: &str) -> BookingResult<Appointment> {
        self.db
            .appointments()
            .get(id)?
            .ok_or_else(|| BookingError::NotFound(id.to_string()))
    }
}

/// `now + hold`, limited to four-digit years so stored deadlines keep sorting as text.
fn hold_deadline(now: DateTime<Utc>, hold: Duration) -> BookingResult<DateTime<Utc>> {
    now.checked_add_signed(hold)
        .filter(|deadline| deadline.year() <= 9999)
        .ok_or_else(|| BookingError::InvalidInput(format!("hold deadline out of range for {now}")))
}

fn parse_date_input(s: &str) -> BookingResult<NaiveDate> {
    parse_date(s).ok_or_else(|| BookingError::InvalidInput(format!("invalid date '{s}', expected YYYY-MM-DD")))
}

fn parse_time_input(s: &str) -> BookingResult<NaiveTime> {
    parse_time(s).ok_or_else(|| BookingError::InvalidInput(format!("invalid time '{s}', expected HH:MM")))
}
