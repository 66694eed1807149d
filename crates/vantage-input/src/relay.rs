//! Input relay
//!
//! Forwards input only to the active session, and only when that session is
//! not closing. Keystrokes from the address bar stay local. Under the
//! polling strategy each forwarded event schedules one early screenshot so
//! the display catches up before the next steady tick.

use std::sync::Arc;
use std::time::Duration;

use vantage_api::{ClickRequest, RemoteApi, ScrollRequest, TypeRequest};
use vantage_display::VisualSync;
use vantage_session::SessionRegistry;

use crate::coords::to_remote;
use crate::event::{key_event, InputEvent, InputOrigin, LocalEvent};
use crate::Result;

#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Per-character typing delay sent with each character
    pub key_delay_ms: u64,
    pub click_resync: Duration,
    pub key_resync: Duration,
    pub scroll_resync: Duration,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            key_delay_ms: 50,
            click_resync: Duration::from_millis(500),
            key_resync: Duration::from_millis(300),
            scroll_resync: Duration::from_millis(200),
        }
    }
}

impl RelayConfig {
    pub fn resync_delay(&self, event: &InputEvent) -> Duration {
        match event {
            InputEvent::Click { .. } => self.click_resync,
            InputEvent::KeyChar { .. } | InputEvent::KeySpecial { .. } => self.key_resync,
            InputEvent::Scroll { .. } => self.scroll_resync,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    /// Also covers a session mid-close, which the registry never keeps active
    NoActiveSession,
    /// Typed into a local text field
    LocalTextEntry,
    OutsideSurface,
    UnmappedKey,
}

impl std::fmt::Display for IgnoreReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let reason = match self {
            IgnoreReason::NoActiveSession => "no active session",
            IgnoreReason::LocalTextEntry => "local text entry",
            IgnoreReason::OutsideSurface => "outside the session surface",
            IgnoreReason::UnmappedKey => "key has no remote equivalent",
        };
        write!(f, "{}", reason)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatched {
    Forwarded {
        session_id: String,
        event: InputEvent,
        /// The local default action (page scroll) must not run
        suppress_default: bool,
    },
    Ignored(IgnoreReason),
}

pub struct InputRelay {
    api: Arc<dyn RemoteApi>,
    registry: SessionRegistry,
    display: Arc<VisualSync>,
    config: RelayConfig,
}

impl InputRelay {
    pub fn new(
        api: Arc<dyn RemoteApi>,
        registry: SessionRegistry,
        display: Arc<VisualSync>,
        config: RelayConfig,
    ) -> Self {
        Self {
            api,
            registry,
            display,
            config,
        }
    }

    /// Translate a local event into remote terms without sending anything.
    pub fn translate(&self, event: &LocalEvent) -> std::result::Result<InputEvent, IgnoreReason> {
        match event {
            LocalEvent::Pointer {
                x,
                y,
                surface,
                button,
                count,
            } => {
                let (x, y) = to_remote(*x, *y, surface, self.display.viewport())
                    .ok_or(IgnoreReason::OutsideSurface)?;
                Ok(InputEvent::Click {
                    x,
                    y,
                    button: *button,
                    count: (*count).max(1),
                })
            }
            LocalEvent::Key { origin, .. } if *origin == InputOrigin::AddressBar => {
                Err(IgnoreReason::LocalTextEntry)
            }
            LocalEvent::Key { key, .. } => {
                key_event(key, self.config.key_delay_ms).ok_or(IgnoreReason::UnmappedKey)
            }
            LocalEvent::Wheel { dx, dy } => Ok(InputEvent::Scroll {
                dx: dx.round() as i32,
                dy: dy.round() as i32,
            }),
        }
    }

    pub async fn dispatch(&self, event: LocalEvent) -> Result<Dispatched> {
        match self.translate(&event) {
            Ok(input) => self.relay(input).await,
            Err(reason) => {
                tracing::trace!(reason = %reason, "Local event not forwarded");
                Ok(Dispatched::Ignored(reason))
            }
        }
    }

    /// Forward an already translated event to the active session.
    pub async fn relay(&self, event: InputEvent) -> Result<Dispatched> {
        let session_id = match self.target() {
            Ok(id) => id,
            Err(reason) => {
                tracing::debug!(kind = event.kind(), reason = %reason, "Input dropped");
                return Ok(Dispatched::Ignored(reason));
            }
        };

        if let Err(e) = self.forward(&session_id, &event).await {
            tracing::warn!(session_id = %session_id, kind = event.kind(), error = %e, "Input call failed");
            return Err(e.into());
        }

        if self.display.needs_resync() {
            self.display.request_refresh(self.config.resync_delay(&event));
        }

        let suppress_default = matches!(event, InputEvent::Scroll { .. });
        Ok(Dispatched::Forwarded {
            session_id,
            event,
            suppress_default,
        })
    }

    fn target(&self) -> std::result::Result<String, IgnoreReason> {
        self.registry
            .active_id()
            .ok_or(IgnoreReason::NoActiveSession)
    }

    async fn forward(&self, session_id: &str, event: &InputEvent) -> vantage_api::Result<()> {
        tracing::debug!(session_id, kind = event.kind(), "Forwarding input");

        match event {
            InputEvent::Click {
                x,
                y,
                button,
                count,
            } => {
                let click = ClickRequest {
                    x: *x,
                    y: *y,
                    button: *button,
                    click_count: *count,
                };
                self.api.click(session_id, &click).await
            }
            InputEvent::KeyChar { ch, delay_ms } => {
                let input = TypeRequest {
                    text: ch.to_string(),
                    delay: *delay_ms,
                };
                self.api.type_text(session_id, &input).await
            }
            InputEvent::KeySpecial { name } => self.api.keypress(session_id, name).await,
            InputEvent::Scroll { dx, dy } => {
                let scroll = ScrollRequest {
                    delta_x: *dx,
                    delta_y: *dy,
                };
                self.api.scroll(session_id, &scroll).await
            }
        }
    }
}
