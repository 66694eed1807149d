//! What the display layer renders

use bytes::Bytes;
use chrono::{DateTime, Utc};
use tokio::sync::{broadcast, watch};

use crate::error::StreamFailure;
use crate::supervisor::ConnectionState;
use crate::viewport::Viewport;

/// One still screenshot of a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StillFrame {
    pub session_id: String,
    /// Cache-busted image reference
    pub url: String,
    pub token: u64,
    pub image: Bytes,
    pub captured_at: DateTime<Utc>,
}

/// Live framebuffer stream of a session. Cheap to clone; every clone sees
/// the same connection.
#[derive(Debug, Clone)]
pub struct StreamHandle {
    pub session_id: String,
    pub viewport: Viewport,
    pub(crate) chunks: broadcast::Sender<Bytes>,
    pub(crate) state: watch::Receiver<ConnectionState>,
}

impl StreamHandle {
    /// Raw framebuffer bytes, in arrival order, from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<Bytes> {
        self.chunks.subscribe()
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.clone()
    }
}

#[derive(Debug, Clone)]
pub enum Frame {
    Still(StillFrame),
    Stream(StreamHandle),
}

impl Frame {
    pub fn session_id(&self) -> &str {
        match self {
            Frame::Still(still) => &still.session_id,
            Frame::Stream(stream) => &stream.session_id,
        }
    }

    pub fn as_still(&self) -> Option<&StillFrame> {
        match self {
            Frame::Still(still) => Some(still),
            Frame::Stream(_) => None,
        }
    }

    pub fn as_stream(&self) -> Option<&StreamHandle> {
        match self {
            Frame::Stream(stream) => Some(stream),
            Frame::Still(_) => None,
        }
    }
}

/// Freshness of what is on screen.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SyncStatus {
    /// No active session
    #[default]
    Idle,
    /// Latest still image fetched successfully
    Fresh,
    /// Showing an older image because the last fetch failed
    Stale(String),
    Connecting,
    Live,
    Failed(StreamFailure),
}

impl SyncStatus {
    pub fn is_stale(&self) -> bool {
        matches!(self, SyncStatus::Stale(_) | SyncStatus::Failed(_))
    }

    pub(crate) fn from_connection(state: ConnectionState) -> Self {
        match state {
            ConnectionState::Disconnected => SyncStatus::Idle,
            ConnectionState::Connecting => SyncStatus::Connecting,
            ConnectionState::Connected => SyncStatus::Live,
            ConnectionState::Failed(failure) => SyncStatus::Failed(failure),
        }
    }
}

impl std::fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncStatus::Idle => write!(f, "No active session"),
            SyncStatus::Fresh => write!(f, "Up to date"),
            SyncStatus::Stale(reason) => write!(f, "Stale: {}", reason),
            SyncStatus::Connecting => write!(f, "Connecting"),
            SyncStatus::Live => write!(f, "Live"),
            SyncStatus::Failed(failure) => write!(f, "{}", failure),
        }
    }
}
