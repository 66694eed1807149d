//! Event bus error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum EventBusError {
    #[error("Invalid event channel URL: {0}")]
    InvalidUrl(String),

    #[error("Event channel connection failed: {0}")]
    Connect(String),

    #[error("Event channel transport error: {0}")]
    Transport(String),

    #[error("Malformed notification: {0}")]
    Malformed(#[from] serde_json::Error),
}
