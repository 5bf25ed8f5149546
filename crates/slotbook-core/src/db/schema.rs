//! SQLite schema definition.

/// Complete database schema for slotbook.
pub const SCHEMA: &str = r#"
-- Enable foreign keys
PRAGMA foreign_keys = ON;

-- ============================================================================
-- Doctors (reference data)
-- ============================================================================

CREATE TABLE IF NOT EXISTS doctors (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    specialization TEXT NOT NULL,
    email TEXT NOT NULL,
    phone TEXT NOT NULL,
    experience_years INTEGER NOT NULL DEFAULT 0,
    clinic_name TEXT NOT NULL DEFAULT '',
    created_at TEXT NOT NULL
);

-- ============================================================================
-- Slots
-- ============================================================================

-- doctor_id is checked by the engine rather than by a foreign key, so slot
-- data can be loaded ahead of the directory.
CREATE TABLE IF NOT EXISTS slots (
    id TEXT PRIMARY KEY,
    doctor_id TEXT NOT NULL,
    date TEXT NOT NULL,                          -- YYYY-MM-DD
    start_time TEXT NOT NULL,                    -- HH:MM
    state TEXT NOT NULL DEFAULT 'available'
        CHECK (state IN ('available', 'held', 'booked')),
    created_at TEXT NOT NULL,
    UNIQUE (doctor_id, date, start_time)
);

CREATE INDEX IF NOT EXISTS idx_slots_lookup ON slots(doctor_id, date, state);

-- ============================================================================
-- Appointments
-- ============================================================================

CREATE TABLE IF NOT EXISTS appointments (
    id TEXT PRIMARY KEY,
    doctor_id TEXT NOT NULL,
    slot_id TEXT NOT NULL REFERENCES slots(id),
    patient_name TEXT NOT NULL,
    patient_email TEXT NOT NULL,
    patient_phone TEXT NOT NULL,
    appointment_date TEXT NOT NULL,
    appointment_time TEXT NOT NULL,
    reason TEXT NOT NULL DEFAULT '',
    status TEXT NOT NULL
        CHECK (status IN ('pending', 'confirmed', 'cancelled', 'expired')),
    expires_at TEXT,                             -- set only while pending
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    CHECK ((status = 'pending') = (expires_at IS NOT NULL))
);

-- At most one active appointment per slot
CREATE UNIQUE INDEX IF NOT EXISTS idx_appointments_active_slot
    ON appointments(slot_id) WHERE status IN ('pending', 'confirmed');

CREATE INDEX IF NOT EXISTS idx_appointments_expiry
    ON appointments(expires_at) WHERE status = 'pending';
CREATE INDEX IF NOT EXISTS idx_appointments_created ON appointments(created_at);
"#;
