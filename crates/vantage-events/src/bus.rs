//! The long-lived event channel

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use url::Url;

use crate::error::EventBusError;
use crate::event::{decode, BusMessage};
use crate::Result;

const PING: &str = r#"{"type":"ping"}"#;

#[derive(Debug, Clone)]
pub struct BusConfig {
    /// `ws://` or `wss://` endpoint of the backend's event channel
    pub url: String,
    /// Pause between a lost connection and the next attempt
    pub reconnect_delay: Duration,
    /// Application-level keepalive cadence
    pub ping_interval: Duration,
    /// Per-subscriber buffer; a subscriber that falls further behind is told
    /// it lagged
    pub capacity: usize,
}

impl BusConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            reconnect_delay: Duration::from_secs(1),
            ping_interval: Duration::from_secs(25),
            capacity: 256,
        }
    }
}

pub struct EventBus {
    tx: broadcast::Sender<BusMessage>,
    connected: watch::Receiver<bool>,
    shutdown: watch::Sender<bool>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl EventBus {
    /// Start the subscription. Must be called from within a Tokio runtime.
    pub fn connect(config: BusConfig) -> Result<Self> {
        let url = Url::parse(&config.url)
            .map_err(|e| EventBusError::InvalidUrl(format!("{}: {}", config.url, e)))?;
        if !matches!(url.scheme(), "ws" | "wss") {
            return Err(EventBusError::InvalidUrl(config.url.clone()));
        }

        let (tx, _) = broadcast::channel(config.capacity.max(1));
        let (connected_tx, connected) = watch::channel(false);
        let (shutdown, shutdown_rx) = watch::channel(false);

        let task = tokio::spawn(run(config, tx.clone(), connected_tx, shutdown_rx));

        Ok(Self {
            tx,
            connected,
            shutdown,
            task: Mutex::new(Some(task)),
        })
    }

    /// A bus with no backing connection. Messages only arrive through
    /// [`EventBus::publish`].
    pub fn detached(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        let (_, connected) = watch::channel(false);
        let (shutdown, _) = watch::channel(false);

        Self {
            tx,
            connected,
            shutdown,
            task: Mutex::new(None),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BusMessage> {
        self.tx.subscribe()
    }

    /// Inject a message as if it had arrived on the channel.
    pub fn publish(&self, message: BusMessage) {
        let _ = self.tx.send(message);
    }

    pub fn is_connected(&self) -> bool {
        *self.connected.borrow()
    }

    pub fn watch_connected(&self) -> watch::Receiver<bool> {
        self.connected.clone()
    }

    /// Stop reconnecting and close the channel.
    pub async fn shutdown(&self) {
        let _ = self.shutdown.send(true);
        let task = self.task.lock().take();
        if let Some(task) = task {
            let _ = task.await;
        }
    }
}

impl Drop for EventBus {
    fn drop(&mut self) {
        if let Some(task) = self.task.lock().take() {
            task.abort();
        }
    }
}

async fn run(
    config: BusConfig,
    tx: broadcast::Sender<BusMessage>,
    connected: watch::Sender<bool>,
    mut shutdown: watch::Receiver<bool>,
) {
    tracing::info!(url = %config.url, "Lifecycle event bus starting");

    let mut ever_connected = false;

    loop {
        tokio::select! {
            result = connect_and_read(&config, &tx, &connected, &mut ever_connected) => {
                match result {
                    Ok(()) => tracing::info!("Lifecycle event bus closed by backend"),
                    Err(e) => tracing::warn!(error = %e, "Lifecycle event bus disconnected"),
                }
            }
            _ = shutdown.changed() => break,
        }

        connected.send_replace(false);

        tokio::select! {
            _ = tokio::time::sleep(config.reconnect_delay) => {}
            _ = shutdown.changed() => break,
        }
    }

    connected.send_replace(false);
    tracing::info!("Lifecycle event bus stopped");
}

async fn connect_and_read(
    config: &BusConfig,
    tx: &broadcast::Sender<BusMessage>,
    connected: &watch::Sender<bool>,
    ever_connected: &mut bool,
) -> Result<()> {
    let (ws, _) = connect_async(config.url.as_str())
        .await
        .map_err(|e| EventBusError::Connect(e.to_string()))?;

    tracing::info!(url = %config.url, "Lifecycle event bus connected");
    connected.send_replace(true);

    if *ever_connected {
        let _ = tx.send(BusMessage::Reconnected);
    }
    *ever_connected = true;

    let (mut write, mut read) = ws.split();

    let mut keepalive = tokio::time::interval(config.ping_interval);
    keepalive.tick().await;

    loop {
        tokio::select! {
            frame = read.next() => match frame {
                Some(Ok(Message::Text(text))) => match decode(&text) {
                    Ok(Some(event)) => {
                        tracing::debug!(
                            kind = %event.kind,
                            session_id = %event.session_id,
                            "Lifecycle notification"
                        );
                        let _ = tx.send(BusMessage::Lifecycle(event));
                    }
                    Ok(None) => {}
                    Err(e) => tracing::warn!(error = %e, "Dropping malformed notification"),
                },
                Some(Ok(Message::Ping(data))) => {
                    write
                        .send(Message::Pong(data))
                        .await
                        .map_err(|e| EventBusError::Transport(e.to_string()))?;
                }
                Some(Ok(Message::Close(_))) | None => return Ok(()),
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(EventBusError::Transport(e.to_string())),
            },
            _ = keepalive.tick() => {
                write
                    .send(Message::Text(PING.to_string()))
                    .await
                    .map_err(|e| EventBusError::Transport(e.to_string()))?;
            }
        }
    }
}
