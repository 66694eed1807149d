//! Vantage Session Registry
//!
//! The client's authoritative view of the remote browser sessions:
//! display order, which one is active, and which are mid-creation or
//! mid-closure. Every lifecycle notification triggers a full reload from the
//! backend rather than an incremental patch, so the view converges even when
//! notifications are duplicated or reordered.

mod error;
mod reconcile;
mod registry;
mod session;
mod state;

pub use error::SessionError;
pub use reconcile::spawn_reconciler;
pub use registry::{RegistrySnapshot, SessionRegistry};
pub use session::Session;
pub use state::SessionState;

pub type Result<T> = std::result::Result<T, SessionError>;
