// libs/appointment-cell/src/services/transition.rs
use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::{debug, info};
use uuid::Uuid;

use notification_cell::{LifecycleEvent, Notifier};
use shared_models::auth::{Actor, Role};

use crate::models::{
    Appointment, AppointmentError, AppointmentStatus, Prescription, UpdateStatusRequest,
};
use crate::services::directory::UserDirectory;
use crate::services::lifecycle::AppointmentLifecycleService;
use crate::services::policy;
use crate::services::registry::{AppointmentStore, StoreError};

/// Status changes, prescriptions, and the patient-profile fan-out.
///
/// Writes are plain field assignments with last-write-wins semantics; there
/// is no version check between concurrent writers of the same appointment.
pub struct AppointmentTransitionService {
    store: Arc<dyn AppointmentStore>,
    directory: Arc<dyn UserDirectory>,
    notifier: Arc<dyn Notifier>,
    lifecycle: AppointmentLifecycleService,
}

impl AppointmentTransitionService {
    pub fn new(
        store: Arc<dyn AppointmentStore>,
        directory: Arc<dyn UserDirectory>,
        notifier: Arc<dyn Notifier>,
        lifecycle: AppointmentLifecycleService,
    ) -> Self {
        Self { store, directory, notifier, lifecycle }
    }

    pub async fn set_status(
        &self,
        actor: &Actor,
        appointment_id: Uuid,
        request: UpdateStatusRequest,
    ) -> Result<Appointment, AppointmentError> {
        info!(
            "{} {} setting appointment {} to {}",
            actor.role, actor.id, appointment_id, request.status
        );

        let current = self.load(appointment_id).await?;
        policy::can_update_status(actor, current.as_ref()).into_result()?;
        let mut appointment = current.ok_or(AppointmentError::NotFound)?;

        self.lifecycle.validate_status_transition(appointment.status, request.status)?;

        // Riders on a status change carry their own ownership rules.
        let meeting_link = request.normalized_meeting_link();
        if meeting_link.is_some() {
            policy::can_set_meeting_link(actor, &appointment, request.status).into_result()?;
        }
        if request.prescription.is_some() {
            policy::can_update_prescription(actor, Some(&appointment)).into_result()?;
        }

        appointment.status = request.status;
        if let Some(link) = meeting_link {
            appointment.meeting_link = Some(link);
        }
        if let Some(prescription) = request.prescription {
            appointment.prescription = prescription;
        }

        let saved = self.persist(&appointment).await?;

        self.notifier.notify(
            saved.patient_id,
            LifecycleEvent::AppointmentStatusUpdated {
                message: format!("Your appointment status has been updated to {}", saved.status),
                appointment_id: saved.id,
                status: saved.status.to_string(),
            },
        );

        Ok(saved)
    }

    /// Replaces the whole prescription. Allowed in any status.
    pub async fn set_prescription(
        &self,
        actor: &Actor,
        appointment_id: Uuid,
        prescription: Prescription,
    ) -> Result<Appointment, AppointmentError> {
        info!("{} {} prescribing on appointment {}", actor.role, actor.id, appointment_id);

        let current = self.load(appointment_id).await?;
        policy::can_update_prescription(actor, current.as_ref()).into_result()?;
        let mut appointment = current.ok_or(AppointmentError::NotFound)?;

        appointment.prescription = prescription;
        let saved = self.persist(&appointment).await?;

        self.notifier.notify(
            saved.patient_id,
            LifecycleEvent::PrescriptionAdded {
                message: "Your doctor has added a new prescription.".to_string(),
                appointment_id: saved.id,
            },
        );

        Ok(saved)
    }

    /// Distinct doctors holding a `Pending` appointment with this patient.
    pub async fn find_active_doctors_for_patient(
        &self,
        patient_id: Uuid,
    ) -> Result<BTreeSet<Uuid>, AppointmentError> {
        let pending = self
            .store
            .list_for_patient_with_status(patient_id, AppointmentStatus::Pending)
            .await
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        Ok(pending.into_iter().map(|a| a.doctor_id).collect())
    }

    /// Tells the patient's active doctors that the profile changed. Returns
    /// the doctors addressed.
    pub async fn announce_profile_update(
        &self,
        actor: &Actor,
    ) -> Result<BTreeSet<Uuid>, AppointmentError> {
        if actor.role != Role::Patient {
            return Err(AppointmentError::Forbidden(
                "Only patients can announce profile updates".to_string(),
            ));
        }

        let name = match self.directory.find_by_id(actor.id).await? {
            Some(profile) => profile.full_name(),
            None => "Your patient".to_string(),
        };

        let doctors = self.find_active_doctors_for_patient(actor.id).await?;
        for doctor_id in &doctors {
            self.notifier.notify(
                *doctor_id,
                LifecycleEvent::PatientProfileUpdated {
                    message: format!("{} has updated their medical profile.", name),
                    patient_id: actor.id,
                },
            );
        }

        debug!("Profile update of {} announced to {} doctor(s)", actor.id, doctors.len());
        Ok(doctors)
    }

    async fn load(&self, appointment_id: Uuid) -> Result<Option<Appointment>, AppointmentError> {
        self.store
            .find_by_id(appointment_id)
            .await
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))
    }

    async fn persist(&self, appointment: &Appointment) -> Result<Appointment, AppointmentError> {
        self.store.save(appointment).await.map_err(|e| match e {
            StoreError::Missing(_) => AppointmentError::NotFound,
            other => AppointmentError::DatabaseError(other.to_string()),
        })
    }
}
