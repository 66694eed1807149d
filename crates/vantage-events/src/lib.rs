//! Vantage Lifecycle Event Bus
//!
//! One long-lived WebSocket subscription to the backend. Out-of-band
//! notifications (`session_created`, `session_closed`, `session_navigated`)
//! are delivered to every subscriber in arrival order. The connection is
//! re-established transparently; subscribers are told when that happens
//! because notifications may have been missed in between.

mod bus;
mod error;
mod event;

pub use bus::{BusConfig, EventBus};
pub use error::EventBusError;
pub use event::{decode, BusMessage, LifecycleEvent, LifecycleKind};

pub type Result<T> = std::result::Result<T, EventBusError>;
