//! Reconnect supervisor for the framebuffer stream
//!
//! ```text
//! Disconnected -> Connecting -> Connected -> Disconnected   (local teardown)
//!                                Connected -> Failed        (unclean close)
//!                                   Failed -> Connecting    (retry delay elapsed)
//! ```
//! An unclean failure is retried once. If the retry fails before delivering
//! any data, the supervisor stops in `Failed(RetryExhausted)` and waits for
//! the caller. Authentication and security failures are never retried.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;

use crate::error::StreamFailure;
use crate::frame::StreamHandle;
use crate::transport::FramebufferConnector;
use crate::viewport::Viewport;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Failed(StreamFailure),
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Failed(_) => "failed",
        }
    }

    /// Stopped and waiting for the caller.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ConnectionState::Failed(f) if f.is_terminal())
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    /// Fixed delay before the single automatic retry
    pub retry_delay: Duration,
    /// Chunks buffered per subscriber
    pub chunk_capacity: usize,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            retry_delay: Duration::from_secs(2),
            chunk_capacity: 64,
        }
    }
}

enum Ended {
    Shutdown,
    Failed {
        failure: StreamFailure,
        delivered: bool,
    },
}

/// Owns one session's stream connection. Dropping it tears the connection
/// down.
pub struct ReconnectSupervisor {
    session_id: String,
    state: watch::Receiver<ConnectionState>,
    chunks: broadcast::Sender<Bytes>,
    retry: mpsc::UnboundedSender<()>,
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl ReconnectSupervisor {
    /// Start connecting. Must be called from within a Tokio runtime.
    pub fn spawn(
        connector: Arc<dyn FramebufferConnector>,
        session_id: impl Into<String>,
        config: SupervisorConfig,
    ) -> Self {
        let session_id = session_id.into();
        let (state_tx, state) = watch::channel(ConnectionState::Disconnected);
        let (chunks, _) = broadcast::channel(config.chunk_capacity.max(1));
        let (retry, retry_rx) = mpsc::unbounded_channel();
        let (shutdown, shutdown_rx) = oneshot::channel();

        let task = tokio::spawn(supervise(
            connector,
            session_id.clone(),
            config,
            state_tx,
            chunks.clone(),
            retry_rx,
            shutdown_rx,
        ));

        Self {
            session_id,
            state,
            chunks,
            retry,
            shutdown: Some(shutdown),
            task: Some(task),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Bytes> {
        self.chunks.subscribe()
    }

    pub fn handle(&self, viewport: Viewport) -> StreamHandle {
        StreamHandle {
            session_id: self.session_id.clone(),
            viewport,
            chunks: self.chunks.clone(),
            state: self.state.clone(),
        }
    }

    /// Reconnect after a terminal failure. Returns false when the supervisor
    /// is not stopped in a failed state.
    pub fn retry(&self) -> bool {
        if !self.state().is_terminal() {
            return false;
        }
        tracing::info!(session_id = %self.session_id, "Manual stream retry requested");
        self.retry.send(()).is_ok()
    }

    /// Clean teardown; resolves once the connection is closed.
    pub async fn shutdown(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

async fn supervise(
    connector: Arc<dyn FramebufferConnector>,
    session_id: String,
    config: SupervisorConfig,
    state: watch::Sender<ConnectionState>,
    chunks: broadcast::Sender<Bytes>,
    mut retry: mpsc::UnboundedReceiver<()>,
    mut shutdown: oneshot::Receiver<()>,
) {
    let mut retry_used = false;

    loop {
        state.send_replace(ConnectionState::Connecting);

        let (failure, delivered) = match run_connection(
            connector.as_ref(),
            &session_id,
            &state,
            &chunks,
            &mut shutdown,
        )
        .await
        {
            Ended::Shutdown => break,
            Ended::Failed { failure, delivered } => (failure, delivered),
        };

        // A reconnect only counts as recovered once data flowed again
        if delivered {
            retry_used = false;
        }

        let failure = match failure {
            StreamFailure::Unclean if retry_used => StreamFailure::RetryExhausted,
            other => other,
        };
        state.send_replace(ConnectionState::Failed(failure));

        if failure.is_terminal() {
            tracing::error!(session_id = %session_id, failure = %failure, "Stream failed");

            tokio::select! {
                request = retry.recv() => match request {
                    Some(()) => retry_used = false,
                    None => break,
                },
                _ = &mut shutdown => break,
            }
        } else {
            tracing::warn!(
                session_id = %session_id,
                delay_ms = config.retry_delay.as_millis() as u64,
                "Stream connection lost, retrying once"
            );
            retry_used = true;

            tokio::select! {
                _ = tokio::time::sleep(config.retry_delay) => {}
                _ = &mut shutdown => break,
            }
        }
    }

    state.send_replace(ConnectionState::Disconnected);
    tracing::info!(session_id = %session_id, "Stream disconnected");
}

async fn run_connection(
    connector: &dyn FramebufferConnector,
    session_id: &str,
    state: &watch::Sender<ConnectionState>,
    chunks: &broadcast::Sender<Bytes>,
    shutdown: &mut oneshot::Receiver<()>,
) -> Ended {
    let mut stream = tokio::select! {
        result = connector.connect(session_id) => match result {
            Ok(stream) => stream,
            Err(failure) => return Ended::Failed { failure, delivered: false },
        },
        _ = &mut *shutdown => return Ended::Shutdown,
    };

    state.send_replace(ConnectionState::Connected);
    tracing::info!(session_id, "Stream connected");

    let mut delivered = false;
    loop {
        tokio::select! {
            chunk = stream.next_chunk() => match chunk {
                Ok(chunk) => {
                    delivered = true;
                    // No subscribers yet is fine; the stream is lazy
                    let _ = chunks.send(chunk);
                }
                Err(failure) => return Ended::Failed { failure, delivered },
            },
            _ = &mut *shutdown => {
                stream.close().await;
                return Ended::Shutdown;
            }
        }
    }
}
