use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Handle of one live socket. A user id may own several at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

/// Push-only appointment lifecycle notifications. Never persisted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum LifecycleEvent {
    NewAppointment {
        message: String,
        appointment_id: Uuid,
    },
    AppointmentStatusUpdated {
        message: String,
        appointment_id: Uuid,
        status: String,
    },
    PrescriptionAdded {
        message: String,
        appointment_id: Uuid,
    },
    PatientProfileUpdated {
        message: String,
        patient_id: Uuid,
    },
}

impl LifecycleEvent {
    pub fn name(&self) -> &'static str {
        match self {
            LifecycleEvent::NewAppointment { .. } => "new_appointment",
            LifecycleEvent::AppointmentStatusUpdated { .. } => "appointment_status_updated",
            LifecycleEvent::PrescriptionAdded { .. } => "prescription_added",
            LifecycleEvent::PatientProfileUpdated { .. } => "patient_profile_updated",
        }
    }
}

/// Messages a client may send over the socket.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ClientMessage {
    Register { user_id: Uuid, token: String },
}

/// Acknowledgements sent back on the socket outside the lifecycle catalogue.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ServerMessage {
    Connected { user_id: Uuid },
    Error { message: String },
}
