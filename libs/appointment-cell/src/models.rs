// libs/appointment-cell/src/models.rs
use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use shared_models::error::AppError;
use shared_models::user::{MedicalProfile, UserProfile};

// ==============================================================================
// CORE APPOINTMENT MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Appointment {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    /// `YYYY-MM-DD`, kept as the client sent it.
    pub date: String,
    pub time_slot: String,
    pub status: AppointmentStatus,
    pub reason_for_visit: Option<String>,
    pub meeting_link: Option<String>,
    #[serde(default)]
    pub prescription: Prescription,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Appointment {
    pub fn slot(&self) -> SlotKey {
        SlotKey {
            doctor_id: self.doctor_id,
            date: self.date.clone(),
            time_slot: self.time_slot.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum AppointmentStatus {
    #[serde(alias = "pending")]
    Pending,
    #[serde(alias = "approved")]
    Approved,
    #[serde(alias = "completed")]
    Completed,
    #[serde(alias = "cancelled")]
    Cancelled,
}

impl AppointmentStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, AppointmentStatus::Completed | AppointmentStatus::Cancelled)
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentStatus::Pending => write!(f, "Pending"),
            AppointmentStatus::Approved => write!(f, "Approved"),
            AppointmentStatus::Completed => write!(f, "Completed"),
            AppointmentStatus::Cancelled => write!(f, "Cancelled"),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Medication {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub dosage: String,
    #[serde(default)]
    pub duration: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Prescription {
    #[serde(default)]
    pub medications: Vec<Medication>,
    #[serde(default)]
    pub notes: String,
}

/// The unit of exclusivity: one appointment per doctor, date and slot.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SlotKey {
    pub doctor_id: Uuid,
    pub date: String,
    pub time_slot: String,
}

impl fmt::Display for SlotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "doctor {} on {} at {}", self.doctor_id, self.date, self.time_slot)
    }
}

/// Insert payload for the slot registry. Records always start `Pending`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewAppointment {
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub date: String,
    pub time_slot: String,
    pub reason_for_visit: Option<String>,
}

impl NewAppointment {
    pub fn slot(&self) -> SlotKey {
        SlotKey {
            doctor_id: self.doctor_id,
            date: self.date.clone(),
            time_slot: self.time_slot.clone(),
        }
    }
}

/// Which appointments a listing may return.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppointmentScope {
    Patient(Uuid),
    Doctor(Uuid),
    All,
}

/// Whether the status table is enforced or only logged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionMode {
    Strict,
    Lenient,
}

impl TransitionMode {
    pub fn from_flag(strict: bool) -> Self {
        if strict {
            TransitionMode::Strict
        } else {
            TransitionMode::Lenient
        }
    }
}

// ==============================================================================
// REQUEST/RESPONSE MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookAppointmentRequest {
    #[serde(alias = "doctorId")]
    pub doctor_id: Uuid,
    pub date: String,
    #[serde(alias = "timeSlot")]
    pub time_slot: String,
    #[serde(default, alias = "reasonForVisit")]
    pub reason_for_visit: Option<String>,
}

impl BookAppointmentRequest {
    pub fn validate(&self) -> Result<(), AppointmentError> {
        NaiveDate::parse_from_str(self.date.trim(), "%Y-%m-%d").map_err(|_| {
            AppointmentError::ValidationError("date must be a YYYY-MM-DD calendar date".to_string())
        })?;

        if self.time_slot.trim().is_empty() {
            return Err(AppointmentError::ValidationError("time_slot is required".to_string()));
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: AppointmentStatus,
    #[serde(default, alias = "meetingLink")]
    pub meeting_link: Option<String>,
    #[serde(default)]
    pub prescription: Option<Prescription>,
}

impl UpdateStatusRequest {
    /// Trimmed meeting link; blank values count as not supplied.
    pub fn normalized_meeting_link(&self) -> Option<String> {
        self.meeting_link
            .as_deref()
            .map(str::trim)
            .filter(|link| !link.is_empty())
            .map(str::to_string)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdatePrescriptionRequest {
    pub prescription: Prescription,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DoctorSummary {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
}

impl From<&UserProfile> for DoctorSummary {
    fn from(profile: &UserProfile) -> Self {
        Self {
            id: profile.id,
            first_name: profile.first_name.clone(),
            last_name: profile.last_name.clone(),
            email: profile.email.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PatientSummary {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub medical_profile: Option<MedicalProfile>,
}

impl PatientSummary {
    pub fn from_profile(profile: &UserProfile, include_medical: bool) -> Self {
        Self {
            id: profile.id,
            first_name: profile.first_name.clone(),
            last_name: profile.last_name.clone(),
            email: profile.email.clone(),
            medical_profile: if include_medical {
                profile.medical_profile.clone()
            } else {
                None
            },
        }
    }
}

/// An appointment as listed to a viewer, with counterpart details filled in.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppointmentView {
    #[serde(flatten)]
    pub appointment: Appointment,
    pub doctor: Option<DoctorSummary>,
    pub patient: Option<PatientSummary>,
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Error, Debug)]
pub enum AppointmentError {
    #[error("Appointment not found")]
    NotFound,

    #[error("Doctor not found")]
    DoctorNotFound,

    #[error("This slot is already booked.")]
    SlotAlreadyBooked,

    #[error("{0}")]
    Forbidden(String),

    #[error("Cannot move appointment from {from} to {to}")]
    InvalidStatusTransition {
        from: AppointmentStatus,
        to: AppointmentStatus,
    },

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl From<AppointmentError> for AppError {
    fn from(e: AppointmentError) -> Self {
        match e {
            AppointmentError::NotFound => AppError::NotFound(e.to_string()),
            AppointmentError::DoctorNotFound => AppError::NotFound(e.to_string()),
            AppointmentError::SlotAlreadyBooked => AppError::Conflict(e.to_string()),
            AppointmentError::Forbidden(msg) => AppError::Forbidden(msg),
            AppointmentError::InvalidStatusTransition { .. } => AppError::BadRequest(e.to_string()),
            AppointmentError::ValidationError(msg) => AppError::ValidationError(msg),
            AppointmentError::DatabaseError(msg) => AppError::Database(msg),
        }
    }
}
