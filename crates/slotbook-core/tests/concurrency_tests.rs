//! Races between bookings, confirmations and the expiry reaper.

use std::sync::{Arc, Barrier};
use std::thread;
use std::time::{Duration as StdDuration, Instant};

use chrono::{Duration, TimeZone, Utc};
use slotbook_core::{
    AppointmentStatus, BookingError, BookingRequest, EngineConfig, ExpiryReaper, ManualClock,
    NewDoctor, PatientDetails, SlotBook,
};

const DATE: &str = "2024-06-01";
const CONTENDERS: usize = 16;

fn doctor_fields() -> NewDoctor {
    NewDoctor {
        name: "Dr. Strange".to_string(),
        specialization: "Neurosurgery".to_string(),
        email: "strange@clinic.test".to_string(),
        phone: "555-0142".to_string(),
        ..NewDoctor::default()
    }
}

fn request(doctor_id: &str, patient: usize) -> BookingRequest {
    BookingRequest::new(
        doctor_id,
        DATE,
        "09:00",
        PatientDetails {
            name: format!("Patient {patient}"),
            email: format!("patient{patient}@example.test"),
            phone: "555-0101".to_string(),
            reason: String::new(),
        },
    )
}

/// Counts (successes, SlotUnavailable) and fails on any other outcome.
fn tally(results: Vec<Result<slotbook_core::Appointment, BookingError>>) -> (usize, usize) {
    let mut won = 0;
    let mut lost = 0;
    for result in results {
        match result {
            Ok(_) => won += 1,
            Err(BookingError::SlotUnavailable { .. }) => lost += 1,
            Err(other) => panic!("unexpected booking error: {other}"),
        }
    }
    (won, lost)
}

#[test]
fn test_no_double_booking_shared_book() {
    let book = Arc::new(SlotBook::open_in_memory(EngineConfig::default()).unwrap());
    let doctor = book.create_doctor(doctor_fields()).unwrap();
    book.create_slot(&doctor.id, DATE, "09:00").unwrap();

    let barrier = Arc::new(Barrier::new(CONTENDERS));
    let handles: Vec<_> = (0..CONTENDERS)
        .map(|i| {
            let book = book.clone();
            let barrier = barrier.clone();
            let doctor_id = doctor.id.clone();
            thread::spawn(move || {
                barrier.wait();
                book.book_appointment(&request(&doctor_id, i))
            })
        })
        .collect();
    let results = handles.into_iter().map(|h| h.join().unwrap()).collect();

    assert_eq!(tally(results), (1, CONTENDERS - 1));
    assert_eq!(book.list_appointments().unwrap().len(), 1);
    assert!(book.list_available_slots(&doctor.id, DATE).unwrap().is_empty());
}

#[test]
fn test_no_double_booking_separate_connections() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("book.db");

    let setup = SlotBook::open(&path, EngineConfig::default()).unwrap();
    let doctor = setup.create_doctor(doctor_fields()).unwrap();
    setup.create_slot(&doctor.id, DATE, "09:00").unwrap();

    // One connection per contender, all opened before the race starts
    let books: Vec<SlotBook> = (0..CONTENDERS)
        .map(|_| SlotBook::open(&path, EngineConfig::default()).unwrap())
        .collect();

    let barrier = Arc::new(Barrier::new(CONTENDERS));
    let handles: Vec<_> = books
        .into_iter()
        .enumerate()
        .map(|(i, book)| {
            let barrier = barrier.clone();
            let doctor_id = doctor.id.clone();
            thread::spawn(move || {
                barrier.wait();
                book.book_appointment(&request(&doctor_id, i))
            })
        })
        .collect();
    let results = handles.into_iter().map(|h| h.join().unwrap()).collect();

    assert_eq!(tally(results), (1, CONTENDERS - 1));
    let stats = setup.stats().unwrap();
    assert_eq!(stats.appointments, 1);
    assert_eq!(stats.pending, 1);
    assert_eq!(stats.available_slots, 0);
}

#[test]
fn test_confirm_races_reaper() {
    for _ in 0..20 {
        let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2024, 5, 30, 10, 0, 0).unwrap()));
        let book = Arc::new(
            SlotBook::open_in_memory(EngineConfig::default())
                .unwrap()
                .with_clock(clock.clone()),
        );
        let doctor = book.create_doctor(doctor_fields()).unwrap();
        book.create_slot(&doctor.id, DATE, "09:00").unwrap();
        let appt = book.book_appointment(&request(&doctor.id, 1)).unwrap();
        clock.advance(Duration::minutes(5));

        let barrier = Arc::new(Barrier::new(2));
        let confirmer = {
            let book = book.clone();
            let barrier = barrier.clone();
            let id = appt.id.clone();
            thread::spawn(move || {
                barrier.wait();
                book.confirm_appointment(&id)
            })
        };
        let reaper = {
            let book = book.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                book.reap_expired()
            })
        };
        let confirmed = confirmer.join().unwrap();
        let report = reaper.join().unwrap().unwrap();

        let final_state = book.get_appointment(&appt.id).unwrap();
        let slot_free = !book.list_available_slots(&doctor.id, DATE).unwrap().is_empty();
        match final_state.status {
            AppointmentStatus::Confirmed => {
                assert!(confirmed.is_ok());
                assert!(report.expired.is_empty());
                assert!(!slot_free, "confirmed appointment lost its slot");
            }
            AppointmentStatus::Expired => {
                assert!(matches!(
                    confirmed,
                    Err(BookingError::AlreadyFinalized { status: AppointmentStatus::Expired, .. })
                ));
                assert_eq!(report.expired, vec![appt.id.clone()]);
                assert!(slot_free, "expired appointment kept its slot");
            }
            other => panic!("unexpected final status {other:?}"),
        }
    }
}

#[test]
fn test_background_reaper_releases_holds() {
    let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2024, 5, 30, 10, 0, 0).unwrap()));
    let book = Arc::new(
        SlotBook::open_in_memory(EngineConfig::default())
            .unwrap()
            .with_clock(clock.clone()),
    );
    let doctor = book.create_doctor(doctor_fields()).unwrap();
    book.create_slot(&doctor.id, DATE, "09:00").unwrap();
    let appt = book.book_appointment(&request(&doctor.id, 1)).unwrap();

    let reaper = ExpiryReaper::with_interval(book.clone(), StdDuration::from_millis(20));
    clock.advance(Duration::minutes(3));

    let deadline = Instant::now() + StdDuration::from_secs(10);
    loop {
        let status = book.get_appointment(&appt.id).unwrap().status;
        if status == AppointmentStatus::Expired {
            break;
        }
        assert!(Instant::now() < deadline, "reaper never expired the hold");
        thread::sleep(StdDuration::from_millis(10));
    }

    reaper.shutdown();
    reaper.join();
    assert_eq!(book.list_available_slots(&doctor.id, DATE).unwrap().len(), 1);
}

#[test]
fn test_reaper_drop_stops_thread() {
    let book = Arc::new(SlotBook::open_in_memory(EngineConfig::default()).unwrap());
    let reaper = ExpiryReaper::with_interval(book.clone(), StdDuration::from_secs(3600));

    let started = Instant::now();
    drop(reaper);
    assert!(started.elapsed() < StdDuration::from_secs(5));
    assert_eq!(Arc::strong_count(&book), 1);
}
