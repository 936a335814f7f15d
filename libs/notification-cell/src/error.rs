use thiserror::Error;

#[derive(Error, Debug)]
pub enum NotificationError {
    #[error("Registration rejected: {0}")]
    RegistrationRejected(String),

    #[error("Malformed message")]
    InvalidMessage(#[from] serde_json::Error),
}
