// libs/appointment-cell/src/services/policy.rs
//! Authorization rules, one function per operation.

use shared_models::auth::{Actor, Role};
use shared_models::user::UserProfile;

use crate::models::{Appointment, AppointmentError, AppointmentScope, AppointmentStatus};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Forbidden(&'static str),
    NotFound(NotFoundKind),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotFoundKind {
    Appointment,
    Doctor,
}

impl Decision {
    pub fn into_result(self) -> Result<(), AppointmentError> {
        match self {
            Decision::Allow => Ok(()),
            Decision::Forbidden(reason) => Err(AppointmentError::Forbidden(reason.to_string())),
            Decision::NotFound(NotFoundKind::Appointment) => Err(AppointmentError::NotFound),
            Decision::NotFound(NotFoundKind::Doctor) => Err(AppointmentError::DoctorNotFound),
        }
    }
}

/// Role gate for booking, checked before the doctor is looked up.
pub fn may_book(actor: &Actor) -> Decision {
    match actor.role {
        Role::Patient => Decision::Allow,
        Role::Doctor | Role::Admin => Decision::Forbidden("Only patients can book appointments"),
    }
}

/// Only patients book, and only with a user whose role is exactly doctor.
pub fn can_book(actor: &Actor, doctor: Option<&UserProfile>) -> Decision {
    match may_book(actor) {
        Decision::Allow => match doctor {
            Some(profile) if profile.role == Role::Doctor => Decision::Allow,
            _ => Decision::NotFound(NotFoundKind::Doctor),
        },
        denied => denied,
    }
}

/// What "my appointments" means for each role.
pub fn own_scope(actor: &Actor) -> AppointmentScope {
    match actor.role {
        Role::Patient => AppointmentScope::Patient(actor.id),
        Role::Doctor => AppointmentScope::Doctor(actor.id),
        Role::Admin => AppointmentScope::All,
    }
}

/// Listing restricted to one role, as the role-specific endpoints require.
pub fn can_list_as(actor: &Actor, required: Role) -> Decision {
    if actor.role == required {
        Decision::Allow
    } else {
        Decision::Forbidden("Not authorized to access this route")
    }
}

pub fn can_list_all(actor: &Actor) -> Decision {
    match actor.role {
        Role::Admin => Decision::Allow,
        Role::Patient | Role::Doctor => {
            Decision::Forbidden("Only admins can list all appointments")
        }
    }
}

/// Doctors act on their own appointments, admins on any, patients on none.
pub fn can_update_status(actor: &Actor, appointment: Option<&Appointment>) -> Decision {
    match (actor.role, appointment) {
        (Role::Patient, _) => Decision::Forbidden("Patients cannot change appointment status"),
        (_, None) => Decision::NotFound(NotFoundKind::Appointment),
        (Role::Admin, Some(_)) => Decision::Allow,
        (Role::Doctor, Some(a)) if a.doctor_id == actor.id => Decision::Allow,
        (Role::Doctor, Some(_)) => {
            Decision::Forbidden("Not authorized to access this appointment")
        }
    }
}

/// Only the assigned doctor prescribes; admins are not granted this.
pub fn can_update_prescription(actor: &Actor, appointment: Option<&Appointment>) -> Decision {
    match (actor.role, appointment) {
        (Role::Patient | Role::Admin, _) => {
            Decision::Forbidden("Only the assigned doctor can prescribe")
        }
        (Role::Doctor, None) => Decision::NotFound(NotFoundKind::Appointment),
        (Role::Doctor, Some(a)) if a.doctor_id == actor.id => Decision::Allow,
        (Role::Doctor, Some(_)) => {
            Decision::Forbidden("Not authorized to prescribe for this appointment")
        }
    }
}

/// Meeting links come from the assigned doctor, or from anyone allowed to
/// complete the appointment when the move is to `Completed`.
pub fn can_set_meeting_link(
    actor: &Actor,
    appointment: &Appointment,
    target: AppointmentStatus,
) -> Decision {
    match actor.role {
        Role::Doctor if appointment.doctor_id == actor.id => Decision::Allow,
        Role::Admin if target == AppointmentStatus::Completed => Decision::Allow,
        Role::Admin => Decision::Forbidden("Meeting links are set by the doctor or on completion"),
        Role::Doctor | Role::Patient => {
            Decision::Forbidden("Not authorized to set a meeting link for this appointment")
        }
    }
}

/// A patient may see their own active doctors; admins may see anyone's.
pub fn can_view_active_doctors(actor: &Actor, patient_id: uuid::Uuid) -> Decision {
    match actor.role {
        Role::Admin => Decision::Allow,
        Role::Patient if actor.id == patient_id => Decision::Allow,
        _ => Decision::Forbidden("Not authorized to view this patient's care team"),
    }
}
