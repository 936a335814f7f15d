// libs/appointment-cell/src/services/booking.rs
use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info, warn};
use uuid::Uuid;

use notification_cell::{LifecycleEvent, Notifier};
use shared_models::auth::{Actor, Role};
use shared_models::user::UserProfile;

use crate::models::{
    Appointment, AppointmentError, AppointmentScope, AppointmentView, BookAppointmentRequest,
    DoctorSummary, NewAppointment, PatientSummary,
};
use crate::services::directory::UserDirectory;
use crate::services::policy;
use crate::services::registry::{AppointmentStore, StoreError};

/// Creates appointments and serves role-scoped listings.
pub struct AppointmentBookingService {
    store: Arc<dyn AppointmentStore>,
    directory: Arc<dyn UserDirectory>,
    notifier: Arc<dyn Notifier>,
}

impl AppointmentBookingService {
    pub fn new(
        store: Arc<dyn AppointmentStore>,
        directory: Arc<dyn UserDirectory>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self { store, directory, notifier }
    }

    /// Books a slot for the acting patient.
    ///
    /// The reservation is a single atomic insert; when the slot is already
    /// held nothing is written and nobody is notified.
    pub async fn book_appointment(
        &self,
        actor: &Actor,
        request: BookAppointmentRequest,
    ) -> Result<Appointment, AppointmentError> {
        info!("Booking appointment for patient {} with doctor {}", actor.id, request.doctor_id);

        policy::may_book(actor).into_result()?;
        request.validate()?;

        let doctor = self.directory.find_by_id(request.doctor_id).await?;
        policy::can_book(actor, doctor.as_ref()).into_result()?;

        let new_appointment = NewAppointment {
            patient_id: actor.id,
            doctor_id: request.doctor_id,
            date: request.date.trim().to_string(),
            time_slot: request.time_slot.trim().to_string(),
            reason_for_visit: request.reason_for_visit,
        };

        let appointment = self.store.try_reserve(new_appointment).await.map_err(|e| match e {
            StoreError::SlotTaken => {
                warn!("Slot already booked for doctor {}", request.doctor_id);
                AppointmentError::SlotAlreadyBooked
            }
            other => AppointmentError::DatabaseError(other.to_string()),
        })?;

        self.notifier.notify(
            appointment.doctor_id,
            LifecycleEvent::NewAppointment {
                message: format!(
                    "New appointment booked by patient for {} at {}",
                    appointment.date, appointment.time_slot
                ),
                appointment_id: appointment.id,
            },
        );

        info!("Appointment {} booked in Pending", appointment.id);
        Ok(appointment)
    }

    /// Appointments the actor is party to (all of them for admins), newest first.
    pub async fn list_my_appointments(
        &self,
        actor: &Actor,
    ) -> Result<Vec<AppointmentView>, AppointmentError> {
        self.list_scope(actor, policy::own_scope(actor)).await
    }

    /// Same as [`list_my_appointments`](Self::list_my_appointments) but only for `role`.
    pub async fn list_as_role(
        &self,
        actor: &Actor,
        role: Role,
    ) -> Result<Vec<AppointmentView>, AppointmentError> {
        policy::can_list_as(actor, role).into_result()?;
        self.list_scope(actor, policy::own_scope(actor)).await
    }

    pub async fn list_all_appointments(
        &self,
        actor: &Actor,
    ) -> Result<Vec<AppointmentView>, AppointmentError> {
        policy::can_list_all(actor).into_result()?;
        self.list_scope(actor, AppointmentScope::All).await
    }

    async fn list_scope(
        &self,
        viewer: &Actor,
        scope: AppointmentScope,
    ) -> Result<Vec<AppointmentView>, AppointmentError> {
        debug!("Listing appointments in scope {:?} for {}", scope, viewer.id);

        let appointments = self
            .store
            .list(scope)
            .await
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        self.enrich(viewer, appointments).await
    }

    /// Attaches doctor and patient summaries. Medical profiles are shown to
    /// doctors and admins only.
    async fn enrich(
        &self,
        viewer: &Actor,
        appointments: Vec<Appointment>,
    ) -> Result<Vec<AppointmentView>, AppointmentError> {
        let include_medical = matches!(viewer.role, Role::Doctor | Role::Admin);
        let mut profiles: HashMap<Uuid, Option<UserProfile>> = HashMap::new();

        let mut views = Vec::with_capacity(appointments.len());
        for appointment in appointments {
            for user_id in [appointment.doctor_id, appointment.patient_id] {
                if !profiles.contains_key(&user_id) {
                    let profile = self.directory.find_by_id(user_id).await?;
                    profiles.insert(user_id, profile);
                }
            }

            let doctor = profiles
                .get(&appointment.doctor_id)
                .and_then(Option::as_ref)
                .map(DoctorSummary::from);
            let patient = profiles
                .get(&appointment.patient_id)
                .and_then(Option::as_ref)
                .map(|p| PatientSummary::from_profile(p, include_medical));

            views.push(AppointmentView { appointment, doctor, patient });
        }

        Ok(views)
    }
}
