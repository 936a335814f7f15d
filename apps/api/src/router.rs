use std::sync::Arc;

use anyhow::Context;
use axum::{routing::get, Json, Router};
use serde_json::json;
use tracing::info;

use appointment_cell::services::directory::{
    InMemoryUserDirectory, SupabaseUserDirectory, UserDirectory,
};
use appointment_cell::services::registry::{
    AppointmentStore, InMemoryAppointmentStore, SupabaseAppointmentStore,
};
use appointment_cell::{appointment_routes, AppointmentState};
use notification_cell::handlers::RealtimeState;
use notification_cell::{create_realtime_router, NotificationHub};
use shared_config::{AppConfig, StorageBackend};
use shared_database::SupabaseClient;

pub struct Services {
    pub appointments: Arc<AppointmentState>,
    pub realtime: Arc<RealtimeState>,
}

/// Wires storage, directory and the notification hub according to config.
pub fn build_services(config: Arc<AppConfig>) -> anyhow::Result<Services> {
    let store: Arc<dyn AppointmentStore>;
    let directory: Arc<dyn UserDirectory>;

    match config.storage_backend {
        StorageBackend::Supabase => {
            let supabase = Arc::new(SupabaseClient::new(&config));
            store = Arc::new(SupabaseAppointmentStore::new(Arc::clone(&supabase)));
            directory = Arc::new(SupabaseUserDirectory::new(supabase));
        }
        StorageBackend::Memory => {
            let seeded = match &config.user_directory_seed {
                Some(path) => InMemoryUserDirectory::from_json_file(path)
                    .context("failed to load user directory seed")?,
                None => InMemoryUserDirectory::new(),
            };
            store = Arc::new(InMemoryAppointmentStore::new());
            directory = Arc::new(seeded);
        }
    }

    info!("Using {:?} storage backend", config.storage_backend);

    let hub = NotificationHub::new();

    Ok(Services {
        appointments: Arc::new(AppointmentState::new(
            Arc::clone(&config),
            store,
            directory,
            Arc::new(hub.clone()),
        )),
        realtime: Arc::new(RealtimeState { config, hub }),
    })
}

pub fn create_router(services: Services) -> Router {
    Router::new()
        .route("/", get(|| async { "Clinic booking API is running!" }))
        .route("/api/health", get(|| async {
            Json(json!({ "status": "success", "message": "API is running" }))
        }))
        .nest("/api/appointments", appointment_routes(services.appointments))
        .merge(create_realtime_router(services.realtime))
}
