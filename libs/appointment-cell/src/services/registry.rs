// libs/appointment-cell/src/services/registry.rs
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Method;
use serde_json::json;
use thiserror::Error;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use shared_database::{DbError, SupabaseClient};

use crate::models::{Appointment, AppointmentScope, AppointmentStatus, NewAppointment, SlotKey};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Slot already reserved")]
    SlotTaken,

    #[error("Appointment {0} does not exist")]
    Missing(Uuid),

    #[error("Storage backend error: {0}")]
    Backend(String),
}

impl From<DbError> for StoreError {
    fn from(e: DbError) -> Self {
        match e {
            DbError::UniqueViolation(_) => StoreError::SlotTaken,
            other => StoreError::Backend(other.to_string()),
        }
    }
}

/// Persistent appointment storage.
///
/// `try_reserve` is the only cross-request serialization point: the backend
/// must reject a second record for the same [`SlotKey`] atomically, whatever
/// the status of the first one.
#[async_trait]
pub trait AppointmentStore: Send + Sync {
    async fn try_reserve(&self, new: NewAppointment) -> Result<Appointment, StoreError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Appointment>, StoreError>;

    /// Newest first.
    async fn list(&self, scope: AppointmentScope) -> Result<Vec<Appointment>, StoreError>;

    async fn list_for_patient_with_status(
        &self,
        patient_id: Uuid,
        status: AppointmentStatus,
    ) -> Result<Vec<Appointment>, StoreError>;

    /// Writes the mutable fields (status, meeting link, prescription). Last write wins.
    async fn save(&self, appointment: &Appointment) -> Result<Appointment, StoreError>;
}

// ==============================================================================
// IN-MEMORY REGISTRY
// ==============================================================================

#[derive(Default)]
struct MemoryTables {
    // Insertion order doubles as creation order.
    records: Vec<Appointment>,
    by_id: HashMap<Uuid, usize>,
    slots: HashSet<SlotKey>,
}

/// Process-local store. One mutex covers records and the slot index, so the
/// uniqueness check and the insert happen in the same critical section.
#[derive(Clone, Default)]
pub struct InMemoryAppointmentStore {
    tables: Arc<Mutex<MemoryTables>>,
}

impl InMemoryAppointmentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.lock().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, MemoryTables> {
        self.tables.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl AppointmentStore for InMemoryAppointmentStore {
    async fn try_reserve(&self, new: NewAppointment) -> Result<Appointment, StoreError> {
        let slot = new.slot();
        let mut tables = self.lock();

        if !tables.slots.insert(slot.clone()) {
            debug!("Slot {} already held", slot);
            return Err(StoreError::SlotTaken);
        }

        let now = Utc::now();
        let appointment = Appointment {
            id: Uuid::new_v4(),
            patient_id: new.patient_id,
            doctor_id: new.doctor_id,
            date: new.date,
            time_slot: new.time_slot,
            status: AppointmentStatus::Pending,
            reason_for_visit: new.reason_for_visit,
            meeting_link: None,
            prescription: Default::default(),
            created_at: now,
            updated_at: now,
        };

        let index = tables.records.len();
        tables.by_id.insert(appointment.id, index);
        tables.records.push(appointment.clone());

        Ok(appointment)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Appointment>, StoreError> {
        let tables = self.lock();
        Ok(tables.by_id.get(&id).map(|&index| tables.records[index].clone()))
    }

    async fn list(&self, scope: AppointmentScope) -> Result<Vec<Appointment>, StoreError> {
        let tables = self.lock();
        let appointments = tables
            .records
            .iter()
            .rev()
            .filter(|a| match scope {
                AppointmentScope::Patient(id) => a.patient_id == id,
                AppointmentScope::Doctor(id) => a.doctor_id == id,
                AppointmentScope::All => true,
            })
            .cloned()
            .collect();

        Ok(appointments)
    }

    async fn list_for_patient_with_status(
        &self,
        patient_id: Uuid,
        status: AppointmentStatus,
    ) -> Result<Vec<Appointment>, StoreError> {
        let tables = self.lock();
        Ok(tables
            .records
            .iter()
            .rev()
            .filter(|a| a.patient_id == patient_id && a.status == status)
            .cloned()
            .collect())
    }

    async fn save(&self, appointment: &Appointment) -> Result<Appointment, StoreError> {
        let mut tables = self.lock();
        let index = *tables
            .by_id
            .get(&appointment.id)
            .ok_or(StoreError::Missing(appointment.id))?;

        let stored = &mut tables.records[index];
        stored.status = appointment.status;
        stored.meeting_link = appointment.meeting_link.clone();
        stored.prescription = appointment.prescription.clone();
        stored.updated_at = Utc::now();

        Ok(stored.clone())
    }
}

// ==============================================================================
// SUPABASE REGISTRY
// ==============================================================================

/// PostgREST-backed store. Uniqueness comes from the `appointments_slot_key`
/// index; a `23505` on insert is the conflict signal.
pub struct SupabaseAppointmentStore {
    supabase: Arc<SupabaseClient>,
}

impl SupabaseAppointmentStore {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }

    async fn select(&self, query: &str) -> Result<Vec<Appointment>, StoreError> {
        let path = format!("/rest/v1/appointments?{}", query);
        let rows: Vec<Appointment> = self
            .supabase
            .request(Method::GET, &path, None, None)
            .await
            .map_err(|e| {
                error!("Failed to query appointments: {}", e);
                StoreError::from(e)
            })?;
        Ok(rows)
    }
}

#[async_trait]
impl AppointmentStore for SupabaseAppointmentStore {
    async fn try_reserve(&self, new: NewAppointment) -> Result<Appointment, StoreError> {
        let body = json!({
            "patient_id": new.patient_id,
            "doctor_id": new.doctor_id,
            "date": new.date,
            "time_slot": new.time_slot,
            "reason_for_visit": new.reason_for_visit,
            "status": AppointmentStatus::Pending,
        });

        let rows: Vec<Appointment> = self
            .supabase
            .request(Method::POST, "/rest/v1/appointments", None, Some(body))
            .await
            .map_err(|e| match e {
                DbError::UniqueViolation(_) => {
                    warn!("Slot {} rejected by unique index", new.slot());
                    StoreError::SlotTaken
                }
                other => {
                    error!("Failed to insert appointment: {}", other);
                    StoreError::from(other)
                }
            })?;

        let appointment = rows
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::Backend("insert returned no row".to_string()))?;

        info!("Reserved slot {} as appointment {}", appointment.slot(), appointment.id);
        Ok(appointment)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Appointment>, StoreError> {
        let rows = self.select(&format!("id=eq.{}&limit=1", id)).await?;
        Ok(rows.into_iter().next())
    }

    async fn list(&self, scope: AppointmentScope) -> Result<Vec<Appointment>, StoreError> {
        let filter = match scope {
            AppointmentScope::Patient(id) => format!("patient_id=eq.{}&", id),
            AppointmentScope::Doctor(id) => format!("doctor_id=eq.{}&", id),
            AppointmentScope::All => String::new(),
        };

        self.select(&format!("{}order=created_at.desc,id.desc", filter)).await
    }

    async fn list_for_patient_with_status(
        &self,
        patient_id: Uuid,
        status: AppointmentStatus,
    ) -> Result<Vec<Appointment>, StoreError> {
        self.select(&format!(
            "patient_id=eq.{}&status=eq.{}&order=created_at.desc",
            patient_id, status
        ))
        .await
    }

    async fn save(&self, appointment: &Appointment) -> Result<Appointment, StoreError> {
        let path = format!("/rest/v1/appointments?id=eq.{}", appointment.id);
        let body = json!({
            "status": appointment.status,
            "meeting_link": appointment.meeting_link,
            "prescription": appointment.prescription,
            "updated_at": Utc::now().to_rfc3339(),
        });

        let rows: Vec<Appointment> = self
            .supabase
            .request(Method::PATCH, &path, None, Some(body))
            .await
            .map_err(|e| {
                error!("Failed to update appointment {}: {}", appointment.id, e);
                StoreError::from(e)
            })?;

        rows.into_iter().next().ok_or(StoreError::Missing(appointment.id))
    }
}
