// libs/appointment-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    Json,
};
use axum_extra::extract::WithRejection;
use serde_json::{json, Value};
use uuid::Uuid;

use notification_cell::Notifier;
use shared_config::AppConfig;
use shared_models::auth::{Actor, Role, User};
use shared_models::error::AppError;

use crate::models::{
    AppointmentView, BookAppointmentRequest, TransitionMode, UpdatePrescriptionRequest,
    UpdateStatusRequest,
};
use crate::services::booking::AppointmentBookingService;
use crate::services::directory::UserDirectory;
use crate::services::lifecycle::AppointmentLifecycleService;
use crate::services::policy;
use crate::services::registry::AppointmentStore;
use crate::services::transition::AppointmentTransitionService;

/// Everything the appointment routes need, built once at startup.
pub struct AppointmentState {
    pub config: Arc<AppConfig>,
    pub booking: AppointmentBookingService,
    pub transitions: AppointmentTransitionService,
}

impl AppointmentState {
    pub fn new(
        config: Arc<AppConfig>,
        store: Arc<dyn AppointmentStore>,
        directory: Arc<dyn UserDirectory>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let mode = TransitionMode::from_flag(config.strict_status_transitions);

        Self {
            booking: AppointmentBookingService::new(
                Arc::clone(&store),
                Arc::clone(&directory),
                Arc::clone(&notifier),
            ),
            transitions: AppointmentTransitionService::new(
                store,
                directory,
                notifier,
                AppointmentLifecycleService::new(mode),
            ),
            config,
        }
    }
}

fn listing(appointments: Vec<AppointmentView>) -> Json<Value> {
    Json(json!({
        "success": true,
        "count": appointments.len(),
        "appointments": appointments
    }))
}

// ==============================================================================
// BOOKING AND LISTING HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn book_appointment(
    State(state): State<Arc<AppointmentState>>,
    Extension(user): Extension<User>,
    WithRejection(Json(request), _): WithRejection<Json<BookAppointmentRequest>, AppError>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let actor = Actor::try_from(&user)?;
    let appointment = state.booking.book_appointment(&actor, request).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "appointment": appointment
        })),
    ))
}

#[axum::debug_handler]
pub async fn get_my_appointments(
    State(state): State<Arc<AppointmentState>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let actor = Actor::try_from(&user)?;
    Ok(listing(state.booking.list_my_appointments(&actor).await?))
}

#[axum::debug_handler]
pub async fn get_patient_appointments(
    State(state): State<Arc<AppointmentState>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let actor = Actor::try_from(&user)?;
    Ok(listing(state.booking.list_as_role(&actor, Role::Patient).await?))
}

#[axum::debug_handler]
pub async fn get_doctor_appointments(
    State(state): State<Arc<AppointmentState>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let actor = Actor::try_from(&user)?;
    Ok(listing(state.booking.list_as_role(&actor, Role::Doctor).await?))
}

#[axum::debug_handler]
pub async fn get_all_appointments(
    State(state): State<Arc<AppointmentState>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let actor = Actor::try_from(&user)?;
    Ok(listing(state.booking.list_all_appointments(&actor).await?))
}

// ==============================================================================
// LIFECYCLE HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn update_appointment_status(
    State(state): State<Arc<AppointmentState>>,
    WithRejection(Path(appointment_id), _): WithRejection<Path<Uuid>, AppError>,
    Extension(user): Extension<User>,
    WithRejection(Json(request), _): WithRejection<Json<UpdateStatusRequest>, AppError>,
) -> Result<Json<Value>, AppError> {
    let actor = Actor::try_from(&user)?;
    let appointment = state.transitions.set_status(&actor, appointment_id, request).await?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment
    })))
}

#[axum::debug_handler]
pub async fn update_prescription(
    State(state): State<Arc<AppointmentState>>,
    WithRejection(Path(appointment_id), _): WithRejection<Path<Uuid>, AppError>,
    Extension(user): Extension<User>,
    WithRejection(Json(request), _): WithRejection<Json<UpdatePrescriptionRequest>, AppError>,
) -> Result<Json<Value>, AppError> {
    let actor = Actor::try_from(&user)?;
    let appointment = state
        .transitions
        .set_prescription(&actor, appointment_id, request.prescription)
        .await?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment
    })))
}

// ==============================================================================
// CARE-TEAM HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn announce_profile_update(
    State(state): State<Arc<AppointmentState>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let actor = Actor::try_from(&user)?;
    let doctors = state.transitions.announce_profile_update(&actor).await?;

    Ok(Json(json!({
        "success": true,
        "notified_doctors": doctors.len()
    })))
}

#[axum::debug_handler]
pub async fn get_active_doctors(
    State(state): State<Arc<AppointmentState>>,
    WithRejection(Path(patient_id), _): WithRejection<Path<Uuid>, AppError>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let actor = Actor::try_from(&user)?;
    policy::can_view_active_doctors(&actor, patient_id).into_result()?;

    let doctors = state.transitions.find_active_doctors_for_patient(patient_id).await?;

    Ok(Json(json!({
        "success": true,
        "count": doctors.len(),
        "doctor_ids": doctors
    })))
}
