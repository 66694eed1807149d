//! Vantage Input Relay
//!
//! Turns local pointer, keyboard and wheel events into input calls on the
//! active remote session, and resolves address bar text into URLs.

mod address;
mod coords;
mod error;
mod event;
mod relay;

pub use address::{AddressResolver, Resolution, DEFAULT_SEARCH_ENGINE};
pub use coords::{to_remote, SurfaceRect};
pub use error::InputError;
pub use event::{InputEvent, InputOrigin, LocalEvent};
pub use relay::{Dispatched, IgnoreReason, InputRelay, RelayConfig};

pub type Result<T> = std::result::Result<T, InputError>;
