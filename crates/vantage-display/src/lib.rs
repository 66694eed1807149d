//! Vantage Visual Sync
//!
//! Keeps a visual representation of the active session up to date, either
//! by polling still screenshots or by relaying a live framebuffer stream.
//! Both strategies expose the same contract: frames for the active session
//! only, nothing when no session is active, and all buffered state dropped
//! on a session switch.

mod error;
mod frame;
mod polling;
mod streaming;
mod supervisor;
mod sync;
mod transport;
mod viewport;

pub use error::{DisplayError, StreamFailure};
pub use frame::{Frame, StillFrame, StreamHandle, SyncStatus};
pub use polling::PollingSync;
pub use streaming::StreamingSync;
pub use supervisor::{ConnectionState, ReconnectSupervisor, SupervisorConfig};
pub use sync::{follow_active, DisplayStrategy, VisualSync};
pub use transport::{FramebufferConnector, FramebufferStream, WsFramebufferConnector};
pub use viewport::Viewport;

pub type Result<T> = std::result::Result<T, DisplayError>;
