//! Slot models.

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

/// Reservation state of a slot.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SlotState {
    /// Open for booking
    Available,
    /// Provisionally taken by a pending appointment
    Held,
    /// Taken by a confirmed appointment
    Booked,
}

impl SlotState {
    /// Column representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            SlotState::Available => "available",
            SlotState::Held => "held",
            SlotState::Booked => "booked",
        }
    }

    /// Parse the column representation.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "available" => Some(SlotState::Available),
            "held" => Some(SlotState::Held),
            "booked" => Some(SlotState::Booked),
            _ => None,
        }
    }
}

/// A bookable doctor/date/time unit.
///
/// `(doctor_id, date, start_time)` is the natural key and is unique in the store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Slot {
    pub id: String,
    pub doctor_id: String,
    pub date: NaiveDate,
    #[serde(with = "hhmm")]
    pub start_time: NaiveTime,
    pub state: SlotState,
    pub created_at: String,
}

impl Slot {
    /// Create a new available slot.
    pub fn new(doctor_id: String, date: NaiveDate, start_time: NaiveTime, created_at: String) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            doctor_id,
            date,
            start_time,
            state: SlotState::Available,
            created_at,
        }
    }

    pub fn is_available(&self) -> bool {
        self.state == SlotState::Available
    }
}

/// Canonical `YYYY-MM-DD` form used in the store.
pub fn format_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Canonical `HH:MM` form used in the store.
pub fn format_time(time: NaiveTime) -> String {
    time.format("%H:%M").to_string()
}

/// Parse a calendar date (`2024-06-01`).
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").ok()
}

/// Parse a wall-clock start time. Accepts `9:00`, `09:00` and `09:00:00`.
pub fn parse_time(s: &str) -> Option<NaiveTime> {
    let s = s.trim();
    NaiveTime::parse_from_str(s, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M:%S"))
        .ok()
}

/// Serde adapter writing times as `HH:MM`.
pub mod hhmm {
    use chrono::NaiveTime;
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::format_time(*time))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveTime, D::Error> {
        let s = String::deserialize(deserializer)?;
        super::parse_time(&s).ok_or_else(|| D::Error::custom(format!("invalid time '{s}'")))
    }
}
