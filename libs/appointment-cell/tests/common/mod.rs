#![allow(dead_code)]

use std::sync::Arc;

use uuid::Uuid;

use appointment_cell::models::TransitionMode;
use appointment_cell::services::booking::AppointmentBookingService;
use appointment_cell::services::directory::InMemoryUserDirectory;
use appointment_cell::services::lifecycle::AppointmentLifecycleService;
use appointment_cell::services::registry::InMemoryAppointmentStore;
use appointment_cell::services::transition::AppointmentTransitionService;
use notification_cell::{ConnectionId, ConnectionReceiver, LifecycleEvent, NotificationHub};
use shared_utils::test_utils::TestUser;

/// In-memory wiring of both services around one store and one hub.
pub struct Harness {
    pub store: InMemoryAppointmentStore,
    pub directory: InMemoryUserDirectory,
    pub hub: NotificationHub,
    pub booking: Arc<AppointmentBookingService>,
    pub transitions: Arc<AppointmentTransitionService>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_mode(TransitionMode::Strict)
    }

    pub fn with_mode(mode: TransitionMode) -> Self {
        let store = InMemoryAppointmentStore::new();
        let directory = InMemoryUserDirectory::new();
        let hub = NotificationHub::new();

        let booking = AppointmentBookingService::new(
            Arc::new(store.clone()),
            Arc::new(directory.clone()),
            Arc::new(hub.clone()),
        );
        let transitions = AppointmentTransitionService::new(
            Arc::new(store.clone()),
            Arc::new(directory.clone()),
            Arc::new(hub.clone()),
            AppointmentLifecycleService::new(mode),
        );

        Self {
            store,
            directory,
            hub,
            booking: Arc::new(booking),
            transitions: Arc::new(transitions),
        }
    }

    /// Creates a user, adds them to the directory and returns them.
    pub fn user(&self, email: &str, role: &str) -> TestUser {
        let user = TestUser::new(email, role);
        self.directory.insert(user.to_profile());
        user
    }

    /// Opens a live connection for the user, as a browser tab would.
    pub fn listen(&self, user_id: Uuid) -> ConnectionReceiver {
        let (tx, rx) = NotificationHub::open_channel();
        self.hub.register(user_id, ConnectionId::new(), tx);
        rx
    }
}

/// Everything currently queued on a connection.
pub fn drain(rx: &mut ConnectionReceiver) -> Vec<LifecycleEvent> {
    let mut events = Vec::new();
    while let Ok(payload) = rx.try_recv() {
        events.push(serde_json::from_str(&payload).expect("hub sends lifecycle events"));
    }
    events
}
