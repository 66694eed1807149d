//! Strategy selection and active-session tracking

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use vantage_session::RegistrySnapshot;

use crate::error::DisplayError;
use crate::frame::{Frame, SyncStatus};
use crate::polling::PollingSync;
use crate::streaming::StreamingSync;
use crate::viewport::Viewport;
use crate::Result;

/// Chosen once per deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisplayStrategy {
    #[default]
    Polling,
    Streaming,
}

impl DisplayStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            DisplayStrategy::Polling => "polling",
            DisplayStrategy::Streaming => "streaming",
        }
    }
}

impl std::fmt::Display for DisplayStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for DisplayStrategy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "polling" => Ok(DisplayStrategy::Polling),
            "streaming" => Ok(DisplayStrategy::Streaming),
            other => Err(format!("unknown display strategy: {}", other)),
        }
    }
}

/// The active strategy. Callers never need to know which one it is, except
/// to decide whether input needs a follow-up refresh.
pub enum VisualSync {
    Polling(PollingSync),
    Streaming(StreamingSync),
}

impl VisualSync {
    pub fn strategy(&self) -> DisplayStrategy {
        match self {
            VisualSync::Polling(_) => DisplayStrategy::Polling,
            VisualSync::Streaming(_) => DisplayStrategy::Streaming,
        }
    }

    pub fn activate(&self, session_id: Option<&str>) {
        match self {
            VisualSync::Polling(polling) => polling.activate(session_id),
            VisualSync::Streaming(streaming) => streaming.activate(session_id),
        }
    }

    pub fn session_id(&self) -> Option<String> {
        match self {
            VisualSync::Polling(polling) => polling.session_id(),
            VisualSync::Streaming(streaming) => streaming.session_id(),
        }
    }

    pub fn current_frame(&self) -> Option<Frame> {
        match self {
            VisualSync::Polling(polling) => polling.current_frame(),
            VisualSync::Streaming(streaming) => streaming.current_frame(),
        }
    }

    pub fn watch_frame(&self) -> watch::Receiver<Option<Frame>> {
        match self {
            VisualSync::Polling(polling) => polling.watch_frame(),
            VisualSync::Streaming(streaming) => streaming.watch_frame(),
        }
    }

    pub fn status(&self) -> SyncStatus {
        match self {
            VisualSync::Polling(polling) => polling.status(),
            VisualSync::Streaming(streaming) => streaming.status(),
        }
    }

    pub fn viewport(&self) -> Viewport {
        match self {
            VisualSync::Polling(polling) => polling.viewport(),
            VisualSync::Streaming(streaming) => streaming.viewport(),
        }
    }

    /// Whether forwarded input should be followed by an early refresh. A
    /// stream already reflects remote changes.
    pub fn needs_resync(&self) -> bool {
        matches!(self, VisualSync::Polling(_))
    }

    pub fn request_refresh(&self, delay: Duration) {
        if let VisualSync::Polling(polling) = self {
            polling.refresh_after(delay);
        }
    }

    pub fn retry_stream(&self) -> Result<bool> {
        match self {
            VisualSync::Streaming(streaming) => Ok(streaming.retry()),
            VisualSync::Polling(_) => Err(DisplayError::Unsupported("polling")),
        }
    }

    pub async fn shutdown(&self) {
        match self {
            VisualSync::Polling(polling) => polling.activate(None),
            VisualSync::Streaming(streaming) => streaming.shutdown().await,
        }
    }
}

/// Keep `sync` pointed at the registry's active session until the registry
/// goes away.
pub fn follow_active(
    sync: Arc<VisualSync>,
    mut changes: watch::Receiver<RegistrySnapshot>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let active = changes.borrow_and_update().active_id.clone();
            sync.activate(active.as_deref());

            if changes.changed().await.is_err() {
                break;
            }
        }
        sync.activate(None);
    })
}
