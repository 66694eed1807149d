//! Streaming strategy
//!
//! One supervised framebuffer connection for the active session. Switching
//! sessions closes the old connection cleanly and opens a new one.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::watch;

use crate::frame::{Frame, SyncStatus};
use crate::supervisor::{ReconnectSupervisor, SupervisorConfig};
use crate::transport::FramebufferConnector;
use crate::viewport::Viewport;

pub struct StreamingSync {
    connector: Arc<dyn FramebufferConnector>,
    viewport: Viewport,
    config: SupervisorConfig,
    current: Mutex<Option<ReconnectSupervisor>>,
    frame: watch::Sender<Option<Frame>>,
}

impl StreamingSync {
    pub fn new(
        connector: Arc<dyn FramebufferConnector>,
        viewport: Viewport,
        config: SupervisorConfig,
    ) -> Self {
        let (frame, _) = watch::channel(None);

        Self {
            connector,
            viewport,
            config,
            current: Mutex::new(None),
            frame,
        }
    }

    /// Must be called from within a Tokio runtime.
    pub fn activate(&self, session_id: Option<&str>) {
        let mut current = self.current.lock();
        if current.as_ref().map(|s| s.session_id()) == session_id {
            return;
        }

        if let Some(mut previous) = current.take() {
            tracing::debug!(session_id = %previous.session_id(), "Tearing down stream");
            tokio::spawn(async move { previous.shutdown().await });
        }
        self.frame.send_replace(None);

        if let Some(session_id) = session_id {
            tracing::info!(session_id, viewport = %self.viewport, "Opening stream");
            let supervisor = ReconnectSupervisor::spawn(
                Arc::clone(&self.connector),
                session_id,
                self.config.clone(),
            );
            self.frame
                .send_replace(Some(Frame::Stream(supervisor.handle(self.viewport))));
            *current = Some(supervisor);
        }
    }

    /// Manual reconnect after a terminal failure.
    pub fn retry(&self) -> bool {
        self.current
            .lock()
            .as_ref()
            .is_some_and(|supervisor| supervisor.retry())
    }

    pub fn session_id(&self) -> Option<String> {
        self.current
            .lock()
            .as_ref()
            .map(|s| s.session_id().to_string())
    }

    pub fn current_frame(&self) -> Option<Frame> {
        self.frame.borrow().clone()
    }

    pub fn watch_frame(&self) -> watch::Receiver<Option<Frame>> {
        self.frame.subscribe()
    }

    pub fn status(&self) -> SyncStatus {
        self.current
            .lock()
            .as_ref()
            .map_or(SyncStatus::Idle, |s| SyncStatus::from_connection(s.state()))
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    /// Close the connection and wait for it.
    pub async fn shutdown(&self) {
        let previous = self.current.lock().take();
        self.frame.send_replace(None);
        if let Some(mut previous) = previous {
            previous.shutdown().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StreamFailure;
    use crate::supervisor::ConnectionState;
    use crate::transport::FramebufferStream;
    use async_trait::async_trait;
    use bytes::Bytes;
    use std::time::Duration;

    /// Every connection stays open until closed locally.
    #[derive(Default)]
    struct RecordingConnector {
        opened: Mutex<Vec<String>>,
        closed: Arc<Mutex<Vec<String>>>,
    }

    struct OpenStream {
        session_id: String,
        closed: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl FramebufferConnector for RecordingConnector {
        async fn connect(
            &self,
            session_id: &str,
        ) -> std::result::Result<Box<dyn FramebufferStream>, StreamFailure> {
            self.opened.lock().push(session_id.to_string());
            Ok(Box::new(OpenStream {
                session_id: session_id.to_string(),
                closed: Arc::clone(&self.closed),
            }))
        }
    }

    #[async_trait]
    impl FramebufferStream for OpenStream {
        async fn next_chunk(&mut self) -> std::result::Result<Bytes, StreamFailure> {
            std::future::pending().await
        }

        async fn close(&mut self) {
            self.closed.lock().push(self.session_id.clone());
        }
    }

    async fn settle() {
        for _ in 0..20 {
            tokio::task::yield_now().await;
        }
    }

    fn streaming(connector: &Arc<RecordingConnector>) -> StreamingSync {
        StreamingSync::new(
            connector.clone(),
            Viewport::default(),
            SupervisorConfig {
                retry_delay: Duration::from_secs(2),
                chunk_capacity: 8,
            },
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_switch_replaces_connection() {
        let connector = Arc::new(RecordingConnector::default());
        let sync = streaming(&connector);

        sync.activate(Some("t1"));
        let handle = sync.current_frame().unwrap().as_stream().unwrap().clone();
        assert_eq!(handle.session_id, "t1");
        assert_eq!(handle.viewport, Viewport::new(1920, 1080));
        settle().await;
        assert_eq!(handle.state(), ConnectionState::Connected);
        assert_eq!(sync.status(), SyncStatus::Live);

        sync.activate(Some("t1"));
        sync.activate(Some("t2"));
        settle().await;

        assert_eq!(*connector.opened.lock(), vec!["t1", "t2"]);
        assert_eq!(*connector.closed.lock(), vec!["t1"]);
        assert_eq!(handle.state(), ConnectionState::Disconnected);
        assert_eq!(sync.current_frame().unwrap().session_id(), "t2");

        sync.activate(None);
        assert!(sync.current_frame().is_none());
        assert_eq!(sync.status(), SyncStatus::Idle);
        settle().await;
        assert_eq!(*connector.closed.lock(), vec!["t1", "t2"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_closes_stream() {
        let connector = Arc::new(RecordingConnector::default());
        let sync = streaming(&connector);

        sync.activate(Some("t1"));
        settle().await;
        sync.shutdown().await;

        assert_eq!(*connector.closed.lock(), vec!["t1"]);
        assert!(sync.session_id().is_none());
        assert!(!sync.retry());
    }
}
