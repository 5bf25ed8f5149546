//! Doctor directory models.

use serde::{Deserialize, Serialize};

/// A doctor offering bookable slots. Immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Doctor {
    pub id: String,
    pub name: String,
    pub specialization: String,
    pub email: String,
    pub phone: String,
    pub experience_years: u32,
    pub clinic_name: String,
    pub created_at: String,
}

/// Fields supplied by the admin dashboard when registering a doctor.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct NewDoctor {
    pub name: String,
    pub specialization: String,
    pub email: String,
    pub phone: String,
    #[serde(default)]
    pub experience_years: u32,
    #[serde(default)]
    pub clinic_name: String,
}

impl NewDoctor {
    /// Names of required fields that are blank.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.name.trim().is_empty() {
            missing.push("name");
        }
        if self.specialization.trim().is_empty() {
            missing.push("specialization");
        }
        if self.email.trim().is_empty() {
            missing.push("email");
        }
        if self.phone.trim().is_empty() {
            missing.push("phone");
        }
        missing
    }
}

impl Doctor {
    /// Build a doctor record with a fresh id.
    pub fn new(fields: NewDoctor, created_at: String) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: fields.name,
            specialization: fields.specialization,
            email: fields.email,
            phone: fields.phone,
            experience_years: fields.experience_years,
            clinic_name: fields.clinic_name,
            created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> NewDoctor {
        NewDoctor {
            name: "Ada Lovelace".into(),
            specialization: "Cardiology".into(),
            email: "ada@clinic.test".into(),
            phone: "555-0100".into(),
            experience_years: 12,
            clinic_name: "North Clinic".into(),
        }
    }

    #[test]
    fn test_new_doctor() {
        let doctor = Doctor::new(sample(), "2024-06-01T08:00:00.000Z".into());
        assert_eq!(doctor.name, "Ada Lovelace");
        assert_eq!(doctor.experience_years, 12);
        assert_eq!(doctor.id.len(), 36); // UUID format
    }

    #[test]
    fn test_missing_fields() {
        assert!(sample().missing_fields().is_empty());

        let blank = NewDoctor {
            name: "  ".into(),
            ..sample()
        };
        assert_eq!(blank.missing_fields(), vec!["name"]);
        assert_eq!(NewDoctor::default().missing_fields().len(), 4);
    }
}
