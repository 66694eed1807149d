//! Display error types

use thiserror::Error;

/// Why a framebuffer stream stopped.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamFailure {
    /// Remote-initiated close, network error or protocol violation
    #[error("Connection lost")]
    Unclean,

    #[error("Stream authentication failed")]
    AuthFailed,

    #[error("Stream security negotiation failed")]
    SecurityNegotiation,

    /// The automatic reconnect also failed
    #[error("Connection lost and reconnect failed")]
    RetryExhausted,
}

impl StreamFailure {
    /// Terminal failures are never retried automatically.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, StreamFailure::Unclean)
    }

    /// Needs operator intervention rather than another attempt.
    pub fn is_auth(&self) -> bool {
        matches!(
            self,
            StreamFailure::AuthFailed | StreamFailure::SecurityNegotiation
        )
    }
}

#[derive(Error, Debug)]
pub enum DisplayError {
    #[error(transparent)]
    Api(#[from] vantage_api::ApiError),

    #[error("Stream failure: {0}")]
    Stream(#[from] StreamFailure),

    #[error("Invalid stream URL: {0}")]
    InvalidUrl(String),

    #[error("Operation not supported by the {0} strategy")]
    Unsupported(&'static str),
}
