//! Core error types

use thiserror::Error;
use vantage_api::ApiError;
use vantage_display::DisplayError;
use vantage_events::EventBusError;
use vantage_input::InputError;
use vantage_session::SessionError;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    #[error("Backend error: {0}")]
    Api(#[from] ApiError),

    #[error("Display error: {0}")]
    Display(#[from] DisplayError),

    #[error("Input error: {0}")]
    Input(#[from] InputError),

    #[error("Event bus error: {0}")]
    Events(#[from] EventBusError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// The user-facing failure classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Rejected locally: unknown, closing or busy session, or bad input
    InvalidSession,
    BackendUnavailable,
    ActionFailed,
    StreamUnclean,
    StreamAuthFailed,
    /// Local setup problem (config file, URLs)
    Configuration,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::InvalidSession => "invalid_session",
            ErrorKind::BackendUnavailable => "backend_unavailable",
            ErrorKind::ActionFailed => "action_failed",
            ErrorKind::StreamUnclean => "stream_unclean",
            ErrorKind::StreamAuthFailed => "stream_auth_failed",
            ErrorKind::Configuration => "configuration",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl CoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::Session(SessionError::Api(e)) => api_kind(e),
            CoreError::Session(_) => ErrorKind::InvalidSession,
            CoreError::Api(e) => api_kind(e),
            CoreError::Display(DisplayError::Api(e)) => api_kind(e),
            CoreError::Display(DisplayError::Stream(failure)) if failure.is_auth() => {
                ErrorKind::StreamAuthFailed
            }
            CoreError::Display(DisplayError::Stream(_)) => ErrorKind::StreamUnclean,
            CoreError::Display(DisplayError::InvalidUrl(_)) => ErrorKind::Configuration,
            CoreError::Display(DisplayError::Unsupported(_)) => ErrorKind::ActionFailed,
            CoreError::Input(InputError::Api(e)) => api_kind(e),
            CoreError::Events(EventBusError::InvalidUrl(_)) => ErrorKind::Configuration,
            CoreError::Events(_) => ErrorKind::BackendUnavailable,
            CoreError::Config(_) | CoreError::Io(_) | CoreError::Serialization(_) => {
                ErrorKind::Configuration
            }
        }
    }
}

fn api_kind(error: &ApiError) -> ErrorKind {
    match error {
        ApiError::Unavailable(_) | ApiError::InvalidResponse(_) => ErrorKind::BackendUnavailable,
        ApiError::ActionFailed { .. } => ErrorKind::ActionFailed,
        ApiError::InvalidUrl(_) => ErrorKind::Configuration,
    }
}
