//! Session error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SessionError {
    /// Referenced an id that is unknown or mid-closure. Never reaches the
    /// backend.
    #[error("Invalid session {id}: {reason}")]
    InvalidSession { id: String, reason: &'static str },

    #[error("Close already pending for session {0}")]
    ClosePending(String),

    #[error("Session {0} is busy with another operation")]
    SessionBusy(String),

    #[error("Invalid state transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error(transparent)]
    Api(#[from] vantage_api::ApiError),
}

impl SessionError {
    pub(crate) fn not_found(id: &str) -> Self {
        SessionError::InvalidSession {
            id: id.to_string(),
            reason: "not found",
        }
    }

    pub(crate) fn closing(id: &str) -> Self {
        SessionError::InvalidSession {
            id: id.to_string(),
            reason: "close in progress",
        }
    }
}
