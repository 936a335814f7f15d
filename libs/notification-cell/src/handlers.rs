use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use futures::{SinkExt, StreamExt};
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_utils::jwt::validate_token;

use crate::{ClientMessage, ConnectionId, NotificationError, NotificationHub, ServerMessage};

#[derive(Clone)]
pub struct RealtimeState {
    pub config: Arc<AppConfig>,
    pub hub: NotificationHub,
}

pub async fn ws_upgrade(
    ws: WebSocketUpgrade,
    State(state): State<Arc<RealtimeState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Pumps hub messages out to the socket and handles `register` messages coming in.
async fn handle_socket(socket: WebSocket, state: Arc<RealtimeState>) {
    let connection_id = ConnectionId::new();
    let (mut sink, mut stream) = socket.split();
    let (tx, mut rx) = NotificationHub::open_channel();

    debug!("Socket {:?} connected", connection_id);

    let sender_task = tokio::spawn(async move {
        while let Some(payload) = rx.recv().await {
            if sink.send(Message::Text(payload.into())).await.is_err() {
                break;
            }
        }
        let _ = sink.close().await;
    });

    let mut registered_as: Option<Uuid> = None;

    while let Some(Ok(message)) = stream.next().await {
        match message {
            Message::Text(text) => {
                let reply = match authorize_registration(&state.config, text.as_str()) {
                    Ok(user_id) => {
                        if let Some(previous) = registered_as.replace(user_id) {
                            state.hub.deregister(previous, connection_id);
                        }
                        state.hub.register(user_id, connection_id, tx.clone());
                        ServerMessage::Connected { user_id }
                    }
                    Err(e) => {
                        warn!("Socket {:?}: {:?}", connection_id, e);
                        ServerMessage::Error { message: e.to_string() }
                    }
                };

                if let Ok(payload) = serde_json::to_string(&reply) {
                    let _ = tx.send(payload);
                }
            }
            Message::Close(_) => break,
            _ => {}
        }
    }

    if let Some(user_id) = registered_as {
        state.hub.deregister(user_id, connection_id);
    }
    drop(tx);
    sender_task.abort();

    info!("Socket {:?} disconnected", connection_id);
}

/// Parses a client message and checks that its token asserts the announced user id.
pub fn authorize_registration(config: &AppConfig, raw: &str) -> Result<Uuid, NotificationError> {
    let message: ClientMessage = serde_json::from_str(raw)?;
    let ClientMessage::Register { user_id, token } = message;

    let user = validate_token(&token, &config.supabase_jwt_secret)
        .map_err(|e| NotificationError::RegistrationRejected(e.to_string()))?;

    let asserted = Uuid::parse_str(&user.id).map_err(|_| {
        NotificationError::RegistrationRejected("token subject is not a user id".to_string())
    })?;
    if asserted != user_id {
        return Err(NotificationError::RegistrationRejected(
            "token does not belong to the announced user".to_string(),
        ));
    }

    Ok(user_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;
    use shared_utils::test_utils::{JwtTestUtils, TestConfig, TestUser};

    fn register(user_id: &str, token: &str) -> String {
        json!({ "event": "register", "data": { "user_id": user_id, "token": token } }).to_string()
    }

    #[test]
    fn registration_with_matching_token_succeeds() {
        let config = TestConfig::default();
        let user = TestUser::patient("p@example.com");
        let token = JwtTestUtils::create_test_token(&user, &config.jwt_secret, None);

        let user_id = authorize_registration(&config.to_app_config(), &register(&user.id, &token));
        assert_eq!(user_id.unwrap(), user.uuid());
    }

    #[test]
    fn registration_for_someone_else_is_rejected() {
        let config = TestConfig::default();
        let user = TestUser::patient("p@example.com");
        let other = TestUser::doctor("d@example.com");
        let token = JwtTestUtils::create_test_token(&user, &config.jwt_secret, None);

        let result = authorize_registration(&config.to_app_config(), &register(&other.id, &token));
        assert_matches!(result, Err(NotificationError::RegistrationRejected(_)));
    }

    #[test]
    fn garbage_is_an_invalid_message() {
        let config = TestConfig::default();
        let result = authorize_registration(&config.to_app_config(), "hello");
        assert_matches!(result, Err(NotificationError::InvalidMessage(_)));
        assert_eq!(result.unwrap_err().to_string(), "Malformed message");
    }

    #[test]
    fn subject_case_does_not_matter() {
        let config = TestConfig::default();
        let mut user = TestUser::doctor("d@example.com");
        let user_id = user.uuid();
        user.id = user.id.to_uppercase();
        let token = JwtTestUtils::create_test_token(&user, &config.jwt_secret, None);

        let result = authorize_registration(
            &config.to_app_config(),
            &register(&user_id.to_string(), &token),
        );
        assert_eq!(result.unwrap(), user_id);
    }
}
