//! Vantage Core
//!
//! Coordination layer for a thin client that observes and drives remote
//! browser sessions. Wires the backend client, lifecycle event bus, session
//! registry, visual sync and input relay together behind one handle.

mod config;
mod error;
mod vantage;

pub use config::Config;
pub use error::{CoreError, ErrorKind};
pub use vantage::Vantage;

// Re-export component types callers work with
pub use vantage_api::{BackendStatus, HttpApiClient, MouseButton, RemoteApi, RemoteSession};
pub use vantage_display::{
    ConnectionState, DisplayStrategy, Frame, StillFrame, StreamFailure, StreamHandle, SyncStatus,
    Viewport,
};
pub use vantage_events::{BusMessage, EventBus, LifecycleEvent, LifecycleKind};
pub use vantage_input::{
    AddressResolver, Dispatched, IgnoreReason, InputEvent, InputOrigin, LocalEvent, Resolution,
    SurfaceRect,
};
pub use vantage_session::{RegistrySnapshot, Session, SessionState};

pub type Result<T> = std::result::Result<T, CoreError>;

/// Initialize logging
pub fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    fmt().with_env_filter(filter).with_target(true).init();
}
