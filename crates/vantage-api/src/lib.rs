//! Vantage Remote API Client
//!
//! Request/response calls against the automation backend that hosts the
//! remote browser sessions: create, list, close, navigate, screenshot and
//! the input calls. The client keeps no state of its own.

mod client;
mod error;
#[cfg(any(test, feature = "test-util"))]
mod mock;
mod types;

pub use client::{HttpApiClient, RemoteApi};
pub use error::ApiError;
#[cfg(any(test, feature = "test-util"))]
pub use mock::{ApiCall, MockApi};
pub use types::{
    BackendStatus, ClickRequest, MouseButton, NavigateOutcome, RemoteSession, ScrollRequest,
    TypeRequest,
};

pub type Result<T> = std::result::Result<T, ApiError>;
