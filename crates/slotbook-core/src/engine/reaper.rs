//! Expiry reaper: releases slots whose pending appointments were never confirmed.
//!
//! A sweep expires each overdue appointment with a status compare-and-set and
//! releases the slot only when that transition won. An appointment confirmed
//! between the scan and its transition is skipped.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::ReservationEngine;
use crate::clock::format_timestamp;
use crate::db::{AppointmentStore, SlotStore};
use crate::{BookingResult, SlotBook};

/// Sleep granularity for shutdown responsiveness.
const SLEEP_GRANULARITY: Duration = Duration::from_millis(200);

/// Outcome of one sweep.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReapReport {
    /// Appointments moved to `Expired`
    pub expired: Vec<String>,
    /// Slots returned to `Available`
    pub released_slots: u32,
    /// Overdue candidates that were confirmed or cancelled before their turn
    pub skipped: u32,
}

impl ReapReport {
    pub fn is_empty(&self) -> bool {
        self.expired.is_empty() && self.skipped == 0
    }
}

impl<'a> ReservationEngine<'a> {
    /// Run one expiry sweep at the clock's current time.
    pub fn reap_expired(&mut self) -> BookingResult<ReapReport> {
        let now = format_timestamp(self.clock.now());
        let candidates = self
            .db
            .appointments()
            .list_expired(&now, self.config.reap_batch_size)?;

        let mut report = ReapReport::default();
        for id in candidates {
            // One transaction per appointment; other connections can write between them.
            let tx = self.db.transaction()?;
            let appointments = AppointmentStore::new(&tx);

            let Some(appointment) = appointments.get(&id)? else {
                report.skipped += 1;
                continue;
            };
            if !appointments.expire_if_due(&id, &now)? {
                debug!(appointment_id = %id, "Expiry lost to a concurrent transition");
                report.skipped += 1;
                continue;
            }
            if SlotStore::new(&tx).release(&appointment.slot_id)? {
                report.released_slots += 1;
            }
            tx.commit()?;

            debug!(appointment_id = %id, slot_id = %appointment.slot_id, "Appointment expired");
            report.expired.push(id);
        }

        if !report.is_empty() {
            info!(
                expired = report.expired.len(),
                released = report.released_slots,
                skipped = report.skipped,
                "Expiry sweep finished"
            );
        }
        Ok(report)
    }
}

/// Handle for the background reaper thread.
///
/// Stops on `shutdown()` or when dropped.
pub struct ExpiryReaper {
    shutdown: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl ExpiryReaper {
    /// Start sweeping every `reap_interval` from the book's configuration.
    pub fn start(book: Arc<SlotBook>) -> Self {
        let interval = book.config().reap_interval();
        Self::with_interval(book, interval)
    }

    /// Start sweeping on an explicit interval.
    pub fn with_interval(book: Arc<SlotBook>, interval: Duration) -> Self {
        let shutdown = Arc::new(AtomicBool::new(false));
        let flag = shutdown.clone();

        let handle = std::thread::spawn(move || {
            info!(interval_ms = interval.as_millis() as u64, "Expiry reaper started");
            reaper_loop(&book, interval, &flag);
            info!("Expiry reaper shutting down");
        });

        Self {
            shutdown,
            handle: Some(handle),
        }
    }

    /// Request shutdown. A sweep in progress completes first.
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Relaxed);
    }

    /// Block until the reaper thread exits.
    pub fn join(mut self) {
        if let Some(h) = self.handle.take() {
            let _ = h.join();
        }
    }
}

impl Drop for ExpiryReaper {
    fn drop(&mut self) {
        self.shutdown();
        if let Some(h) = self.handle.take() {
            let _ = h.join();
        }
    }
}

fn reaper_loop(book: &SlotBook, interval: Duration, shutdown: &AtomicBool) {
    loop {
        let wake_at = Instant::now() + interval;
        loop {
            if shutdown.load(Ordering::Relaxed) {
                return;
            }
            let remaining = wake_at.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            std::thread::sleep(remaining.min(SLEEP_GRANULARITY));
        }

        if let Err(e) = book.reap_expired() {
            warn!(error = %e, "Expiry sweep failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::config::EngineConfig;
    use crate::db::Database;
    use crate::models::{AppointmentStatus, BookingRequest, NewDoctor, PatientDetails, SlotState};
    use chrono::{TimeZone, Utc};

    fn setup() -> (Database, EngineConfig, ManualClock, String) {
        let mut db = Database::open_in_memory().unwrap();
        let config = EngineConfig::default();
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2024, 5, 30, 10, 0, 0).unwrap());

        let mut engine = ReservationEngine::new(&mut db, &config, &clock);
        let doctor = engine
            .create_doctor(NewDoctor {
                name: "Dr. Grey".into(),
                specialization: "General Practice".into(),
                email: "grey@clinic.test".into(),
                phone: "555-0100".into(),
                ..NewDoctor::default()
            })
            .unwrap();
        engine
            .generate_daily_slots(&doctor.id, "2024-06-01", "09:00", "10:00", 30)
            .unwrap();
        (db, config, clock, doctor.id)
    }

    fn request(doctor_id: &str, time: &str) -> BookingRequest {
        BookingRequest::new(
            doctor_id,
            "2024-06-01",
            time,
            PatientDetails {
                name: "Pat".into(),
                email: "pat@example.test".into(),
                phone: "555-0101".into(),
                reason: String::new(),
            },
        )
    }

    #[test]
    fn test_sweep_before_deadline_does_nothing() {
        let (mut db, config, clock, doctor_id) = setup();
        let mut engine = ReservationEngine::new(&mut db, &config, &clock);
        engine.book(&request(&doctor_id, "09:00")).unwrap();

        clock.advance(chrono::Duration::seconds(119));
        let report = engine.reap_expired().unwrap();
        assert!(report.is_empty());
    }

    #[test]
    fn test_sweep_expires_and_releases() {
        let (mut db, config, clock, doctor_id) = setup();
        let mut engine = ReservationEngine::new(&mut db, &config, &clock);
        let stale = engine.book(&request(&doctor_id, "09:00")).unwrap();
        let kept = engine.book(&request(&doctor_id, "09:30")).unwrap();
        engine.confirm(&kept.id).unwrap();

        clock.advance(chrono::Duration::minutes(3));
        let report = engine.reap_expired().unwrap();
        assert_eq!(report.expired, vec![stale.id.clone()]);
        assert_eq!(report.released_slots, 1);

        let expired = engine.get_appointment(&stale.id).unwrap();
        assert_eq!(expired.status, AppointmentStatus::Expired);
        assert_eq!(expired.expires_at, None);
        assert_eq!(engine.get_appointment(&kept.id).unwrap().status, AppointmentStatus::Confirmed);

        drop(engine);
        assert_eq!(db.slots().get(&stale.slot_id).unwrap().unwrap().state, SlotState::Available);
        assert_eq!(db.slots().get(&kept.slot_id).unwrap().unwrap().state, SlotState::Booked);
    }

    #[test]
    fn test_sweep_respects_batch_size() {
        let (mut db, mut config, clock, doctor_id) = setup();
        config.reap_batch_size = 1;
        let mut engine = ReservationEngine::new(&mut db, &config, &clock);
        engine.book(&request(&doctor_id, "09:00")).unwrap();
        engine.book(&request(&doctor_id, "09:30")).unwrap();

        clock.advance(chrono::Duration::minutes(3));
        assert_eq!(engine.reap_expired().unwrap().expired.len(), 1);
        assert_eq!(engine.reap_expired().unwrap().expired.len(), 1);
        assert!(engine.reap_expired().unwrap().is_empty());
    }

    #[test]
    fn test_confirm_after_expiry_is_rejected() {
        let (mut db, config, clock, doctor_id) = setup();
        let mut engine = ReservationEngine::new(&mut db, &config, &clock);
        let appt = engine.book(&request(&doctor_id, "09:00")).unwrap();

        clock.advance(chrono::Duration::minutes(3));
        engine.reap_expired().unwrap();

        let err = engine.confirm(&appt.id).unwrap_err();
        assert!(matches!(
            err,
            crate::BookingError::AlreadyFinalized { status: AppointmentStatus::Expired, .. }
        ));
    }
}
