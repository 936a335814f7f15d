// libs/appointment-cell/src/router.rs
use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};

use shared_utils::extractor::auth_middleware;

use crate::handlers::{self, AppointmentState};

pub fn appointment_routes(state: Arc<AppointmentState>) -> Router {
    // All appointment operations require authentication
    let protected_routes = Router::new()
        .route("/", post(handlers::book_appointment).get(handlers::get_all_appointments))
        .route("/me", get(handlers::get_my_appointments))
        .route("/my-appointments", get(handlers::get_patient_appointments))
        .route("/doctor-appointments", get(handlers::get_doctor_appointments))
        .route("/{appointment_id}/status", put(handlers::update_appointment_status))
        .route("/{appointment_id}/prescription", put(handlers::update_prescription))
        .route("/profile-updated", post(handlers::announce_profile_update))
        .route("/patients/{patient_id}/active-doctors", get(handlers::get_active_doctors))
        .layer(middleware::from_fn_with_state(state.config.clone(), auth_middleware));

    Router::new()
        .merge(protected_routes)
        .with_state(state)
}
