//! Remote API error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    /// Transport-level failure: connection refused, timeout, broken body.
    #[error("Backend unavailable: {0}")]
    Unavailable(String),

    /// The backend answered, but refused the action.
    #[error("Backend rejected {action} (HTTP {status}): {message}")]
    ActionFailed {
        action: &'static str,
        status: u16,
        message: String,
    },

    #[error("Invalid backend response: {0}")]
    InvalidResponse(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

impl ApiError {
    /// True when the failure is a network/transport problem rather than a
    /// refusal by the backend.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, ApiError::Unavailable(_))
    }

    /// HTTP status returned by the backend, if it got that far.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::ActionFailed { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            ApiError::InvalidResponse(e.to_string())
        } else {
            ApiError::Unavailable(e.to_string())
        }
    }
}
