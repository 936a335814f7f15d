use std::sync::Arc;

use axum::{routing::get, Router};

use crate::handlers::{ws_upgrade, RealtimeState};

pub fn create_realtime_router(state: Arc<RealtimeState>) -> Router {
    Router::new()
        .route("/ws", get(ws_upgrade))
        .with_state(state)
}
