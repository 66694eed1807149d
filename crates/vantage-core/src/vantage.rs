//! Main client state container
//!
//! The registry owns all session state. Everything else reads the active
//! session from it: the display follows it, and input is gated on it.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use vantage_api::{BackendStatus, HttpApiClient, RemoteApi};
use vantage_display::{
    follow_active, DisplayStrategy, Frame, FramebufferConnector, PollingSync, StreamingSync,
    SyncStatus, Viewport, VisualSync, WsFramebufferConnector,
};
use vantage_events::EventBus;
use vantage_input::{AddressResolver, Dispatched, InputRelay, LocalEvent, Resolution};
use vantage_session::{spawn_reconciler, RegistrySnapshot, Session, SessionRegistry};

use crate::config::Config;
use crate::Result;

pub struct Vantage {
    config: Config,
    api: Arc<dyn RemoteApi>,
    registry: SessionRegistry,
    display: Arc<VisualSync>,
    relay: InputRelay,
    resolver: AddressResolver,
    bus: Mutex<Option<Arc<EventBus>>>,
    /// Reconciler and display follower
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl Vantage {
    /// Build a client against the configured backend. Nothing is contacted
    /// until [`Vantage::start`].
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;

        let api: Arc<dyn RemoteApi> = Arc::new(HttpApiClient::new(
            &config.backend_url,
            config.request_timeout(),
        )?);
        let connector: Arc<dyn FramebufferConnector> = Arc::new(WsFramebufferConnector::new(
            config.stream_url.clone(),
            config.stream_quality,
            config.stream_compression,
        )?);

        Ok(Self::from_parts(config, api, connector))
    }

    pub fn from_parts(
        config: Config,
        api: Arc<dyn RemoteApi>,
        connector: Arc<dyn FramebufferConnector>,
    ) -> Self {
        let registry = SessionRegistry::new(Arc::clone(&api));

        let display = Arc::new(match config.display {
            DisplayStrategy::Polling => VisualSync::Polling(PollingSync::new(
                Arc::clone(&api),
                config.poll_interval(),
                config.viewport,
            )),
            DisplayStrategy::Streaming => VisualSync::Streaming(StreamingSync::new(
                connector,
                config.viewport,
                config.supervisor_config(),
            )),
        });

        let relay = InputRelay::new(
            Arc::clone(&api),
            registry.clone(),
            Arc::clone(&display),
            config.relay_config(),
        );
        let resolver = AddressResolver::new(config.search_engine.clone());

        Self {
            config,
            api,
            registry,
            display,
            relay,
            resolver,
            bus: Mutex::new(None),
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// Subscribe to lifecycle notifications and load the initial session
    /// list. Call once, from within a Tokio runtime.
    pub async fn start(&self) -> Result<()> {
        let bus = EventBus::connect(self.config.bus_config())?;
        self.start_with_bus(Arc::new(bus)).await
    }

    pub async fn start_with_bus(&self, bus: Arc<EventBus>) -> Result<()> {
        let reconciler = spawn_reconciler(
            self.registry.clone(),
            bus.subscribe(),
            self.config.reload_attempts,
        );
        let follower = follow_active(Arc::clone(&self.display), self.registry.subscribe());

        self.tasks.lock().extend([reconciler, follower]);
        *self.bus.lock() = Some(bus);

        if let Err(e) = self
            .registry
            .reload_with_retry(self.config.reload_attempts)
            .await
        {
            tracing::warn!(error = %e, "Initial session load failed");
            return Err(e.into());
        }

        tracing::info!(
            sessions = self.registry.len(),
            strategy = %self.display.strategy(),
            "Vantage started"
        );

        Ok(())
    }

    fn sync_display(&self) {
        self.display.activate(self.registry.active_id().as_deref());
    }

    // === Sessions ===

    pub fn active_session(&self) -> Option<Session> {
        self.registry.active_session()
    }

    pub fn list_sessions(&self) -> Vec<Session> {
        self.registry.list()
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    /// Registry change feed for a rendering layer.
    pub fn subscribe(&self) -> watch::Receiver<RegistrySnapshot> {
        self.registry.subscribe()
    }

    /// Create a session from address bar text, or at the configured start
    /// page when `input` is `None` or blank.
    pub async fn create_session(&self, input: Option<&str>) -> Result<Session> {
        let url = match input.map(str::trim).filter(|s| !s.is_empty()) {
            Some(raw) => self.resolver.resolve(raw).into_url(),
            None => self.config.new_session_url.clone(),
        };

        let session = self.registry.create(&url).await?;
        self.sync_display();
        Ok(session)
    }

    pub fn select_session(&self, id: &str) -> Result<Session> {
        let session = self.registry.select(id)?;
        self.sync_display();
        Ok(session)
    }

    pub async fn close_session(&self, id: &str) -> Result<()> {
        let result = self.registry.close(id).await;
        self.sync_display();
        Ok(result?)
    }

    /// Navigate using address bar text.
    pub async fn navigate(&self, id: &str, input: &str) -> Result<Session> {
        let url = self.resolver.resolve(input).into_url();
        let session = self.registry.navigate(id, &url).await?;
        self.refresh_display_for(id);
        Ok(session)
    }

    pub async fn refresh(&self, id: &str) -> Result<Session> {
        let session = self.registry.refresh(id).await?;
        self.refresh_display_for(id);
        Ok(session)
    }

    pub fn resolve_address(&self, input: &str) -> Resolution {
        self.resolver.resolve(input)
    }

    fn refresh_display_for(&self, id: &str) {
        if self.registry.active_id().as_deref() == Some(id) {
            self.display.request_refresh(Duration::ZERO);
        }
    }

    // === Display ===

    pub fn current_frame(&self) -> Option<Frame> {
        self.display.current_frame()
    }

    pub fn watch_frame(&self) -> watch::Receiver<Option<Frame>> {
        self.display.watch_frame()
    }

    pub fn display_status(&self) -> SyncStatus {
        self.display.status()
    }

    pub fn viewport(&self) -> Viewport {
        self.display.viewport()
    }

    /// Reconnect the stream after a terminal failure.
    pub fn retry_stream(&self) -> Result<bool> {
        Ok(self.display.retry_stream()?)
    }

    // === Input ===

    pub async fn dispatch_input(&self, event: LocalEvent) -> Result<Dispatched> {
        Ok(self.relay.dispatch(event).await?)
    }

    // === Backend ===

    pub async fn backend_status(&self) -> Result<BackendStatus> {
        Ok(self.api.status().await?)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Stop following the backend and release the display.
    pub async fn shutdown(&self) {
        let bus = self.bus.lock().take();
        if let Some(bus) = bus {
            bus.shutdown().await;
        }

        for task in self.tasks.lock().drain(..) {
            task.abort();
        }

        self.display.shutdown().await;
        tracing::info!("Vantage stopped");
    }
}

impl Drop for Vantage {
    fn drop(&mut self) {
        for task in self.tasks.lock().drain(..) {
            task.abort();
        }
    }
}
