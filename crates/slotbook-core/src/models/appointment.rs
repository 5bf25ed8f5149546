//! Appointment models.

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

use super::slot::Slot;

/// Appointment lifecycle status.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AppointmentStatus {
    /// Holding its slot until confirmed or expired
    Pending,
    /// Confirmed by the patient (or booked without confirmation)
    Confirmed,
    /// Cancelled, slot released
    Cancelled,
    /// Hold deadline passed before confirmation, slot released
    Expired,
}

impl AppointmentStatus {
    /// Column representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentStatus::Pending => "pending",
            AppointmentStatus::Confirmed => "confirmed",
            AppointmentStatus::Cancelled => "cancelled",
            AppointmentStatus::Expired => "expired",
        }
    }

    /// Parse the column representation.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(AppointmentStatus::Pending),
            "confirmed" => Some(AppointmentStatus::Confirmed),
            "cancelled" => Some(AppointmentStatus::Cancelled),
            "expired" => Some(AppointmentStatus::Expired),
            _ => None,
        }
    }

    /// Active appointments own their slot.
    pub fn is_active(&self) -> bool {
        matches!(self, AppointmentStatus::Pending | AppointmentStatus::Confirmed)
    }
}

/// Patient-supplied fields of a booking.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct PatientDetails {
    pub name: String,
    pub email: String,
    pub phone: String,
    #[serde(default)]
    pub reason: String,
}

/// A booking request as received from the patient client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BookingRequest {
    pub doctor_id: String,
    /// `YYYY-MM-DD`
    pub appointment_date: String,
    /// `HH:MM`
    pub appointment_time: String,
    pub patient: PatientDetails,
}

impl BookingRequest {
    pub fn new(
        doctor_id: impl Into<String>,
        appointment_date: impl Into<String>,
        appointment_time: impl Into<String>,
        patient: PatientDetails,
    ) -> Self {
        Self {
            doctor_id: doctor_id.into(),
            appointment_date: appointment_date.into(),
            appointment_time: appointment_time.into(),
            patient,
        }
    }

    /// Names of required fields that are blank.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.doctor_id.trim().is_empty() {
            missing.push("doctor_id");
        }
        if self.patient.name.trim().is_empty() {
            missing.push("patient_name");
        }
        if self.patient.email.trim().is_empty() {
            missing.push("patient_email");
        }
        if self.patient.phone.trim().is_empty() {
            missing.push("patient_phone");
        }
        if self.appointment_date.trim().is_empty() {
            missing.push("appointment_date");
        }
        if self.appointment_time.trim().is_empty() {
            missing.push("appointment_time");
        }
        missing
    }
}

/// An appointment bound to exactly one slot.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Appointment {
    pub id: String,
    pub doctor_id: String,
    /// Owning slot; never reassigned
    pub slot_id: String,
    pub patient_name: String,
    pub patient_email: String,
    pub patient_phone: String,
    pub appointment_date: NaiveDate,
    #[serde(with = "super::slot::hhmm")]
    pub appointment_time: NaiveTime,
    pub reason: String,
    pub status: AppointmentStatus,
    /// Hold deadline, present only while pending
    pub expires_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl Appointment {
    /// Create an appointment for a slot the caller has already reserved.
    pub fn new(
        slot: &Slot,
        patient: &PatientDetails,
        status: AppointmentStatus,
        expires_at: Option<String>,
        created_at: String,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            doctor_id: slot.doctor_id.clone(),
            slot_id: slot.id.clone(),
            patient_name: patient.name.clone(),
            patient_email: patient.email.clone(),
            patient_phone: patient.phone.clone(),
            appointment_date: slot.date,
            appointment_time: slot.start_time,
            reason: patient.reason.clone(),
            status,
            expires_at,
            created_at: created_at.clone(),
            updated_at: created_at,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }
}

/// Appointment joined with its doctor, as shown on the admin dashboard.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppointmentSummary {
    #[serde(flatten)]
    pub appointment: Appointment,
    /// `None` if the doctor row is gone
    pub doctor_name: Option<String>,
    pub specialization: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{parse_date, parse_time};

    fn patient() -> PatientDetails {
        PatientDetails {
            name: "Pat One".into(),
            email: "pat@example.test".into(),
            phone: "555-0101".into(),
            reason: "Checkup".into(),
        }
    }

    #[test]
    fn test_active_statuses() {
        assert!(AppointmentStatus::Pending.is_active());
        assert!(AppointmentStatus::Confirmed.is_active());
        assert!(!AppointmentStatus::Cancelled.is_active());
        assert!(!AppointmentStatus::Expired.is_active());
    }

    #[test]
    fn test_new_copies_slot_key() {
        let slot = Slot::new(
            "doc-1".into(),
            parse_date("2024-06-01").unwrap(),
            parse_time("09:00").unwrap(),
            "2024-05-30T10:00:00.000Z".into(),
        );
        let appt = Appointment::new(
            &slot,
            &patient(),
            AppointmentStatus::Pending,
            Some("2024-05-30T10:02:00.000Z".into()),
            "2024-05-30T10:00:00.000Z".into(),
        );
        assert_eq!(appt.slot_id, slot.id);
        assert_eq!(appt.doctor_id, "doc-1");
        assert_eq!(appt.appointment_time, slot.start_time);
        assert_eq!(appt.created_at, appt.updated_at);
    }

    #[test]
    fn test_booking_request_missing_fields() {
        let req = BookingRequest::new("doc-1", "2024-06-01", "09:00", patient());
        assert!(req.missing_fields().is_empty());

        let req = BookingRequest::new("", "2024-06-01", " ", PatientDetails::default());
        assert_eq!(
            req.missing_fields(),
            vec![
                "doctor_id",
                "patient_name",
                "patient_email",
                "patient_phone",
                "appointment_time"
            ]
        );
    }
}
