//! Client configuration

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;
use vantage_display::{DisplayStrategy, SupervisorConfig, Viewport};
use vantage_events::BusConfig;
use vantage_input::RelayConfig;

use crate::error::CoreError;
use crate::Result;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Base URL of the automation backend's REST API
    pub backend_url: String,
    /// Lifecycle event channel
    pub events_url: String,
    /// Framebuffer proxy; `{session}` is replaced by the session id
    pub stream_url: String,
    pub display: DisplayStrategy,
    pub poll_interval_ms: u64,
    pub viewport: Viewport,
    /// Applied once per stream connection
    pub stream_quality: u8,
    pub stream_compression: u8,
    pub stream_retry_delay_ms: u64,
    pub request_timeout_ms: u64,
    pub key_delay_ms: u64,
    pub click_resync_ms: u64,
    pub key_resync_ms: u64,
    pub scroll_resync_ms: u64,
    pub bus_reconnect_delay_ms: u64,
    pub bus_ping_interval_ms: u64,
    /// Attempts per registry reload
    pub reload_attempts: u32,
    /// Search engine URL template (`%s` replaced with the query)
    pub search_engine: String,
    /// Where sessions created without an address start
    pub new_session_url: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend_url: "http://localhost:8001/api".to_string(),
            events_url: "ws://localhost:8001/ws".to_string(),
            stream_url: "ws://localhost:6080/websockify?session={session}".to_string(),
            display: DisplayStrategy::Polling,
            poll_interval_ms: 2000,
            viewport: Viewport::default(),
            stream_quality: 6,
            stream_compression: 2,
            stream_retry_delay_ms: 2000,
            request_timeout_ms: 30_000,
            key_delay_ms: 50,
            click_resync_ms: 500,
            key_resync_ms: 300,
            scroll_resync_ms: 200,
            bus_reconnect_delay_ms: 1000,
            bus_ping_interval_ms: 25_000,
            reload_attempts: 3,
            search_engine: vantage_input::DEFAULT_SEARCH_ENGINE.to_string(),
            new_session_url: "https://www.google.com".to_string(),
        }
    }
}

impl Config {
    /// Load a JSON config file; missing fields take their defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let config: Config = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults with `VANTAGE_*` environment overrides applied.
    pub fn from_env() -> Result<Self> {
        let mut config = Config::default();
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(url) = lookup("VANTAGE_BACKEND_URL") {
            self.backend_url = url;
        }
        if let Some(url) = lookup("VANTAGE_EVENTS_URL") {
            self.events_url = url;
        }
        if let Some(url) = lookup("VANTAGE_STREAM_URL") {
            self.stream_url = url;
        }
        if let Some(display) = lookup("VANTAGE_DISPLAY") {
            self.display = display.parse().map_err(CoreError::Config)?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        check_url("backend_url", &self.backend_url, &["http", "https"])?;
        check_url("events_url", &self.events_url, &["ws", "wss"])?;
        check_url(
            "stream_url",
            &self.stream_url.replace("{session}", "check"),
            &["ws", "wss"],
        )?;

        if self.poll_interval_ms == 0 {
            return Err(CoreError::Config("poll_interval_ms must be positive".to_string()));
        }
        if self.request_timeout_ms == 0 {
            return Err(CoreError::Config("request_timeout_ms must be positive".to_string()));
        }
        if self.viewport.is_empty() {
            return Err(CoreError::Config(format!("viewport {} is empty", self.viewport)));
        }
        if self.reload_attempts == 0 {
            return Err(CoreError::Config("reload_attempts must be at least 1".to_string()));
        }
        if !self.search_engine.contains("%s") {
            return Err(CoreError::Config(
                "search_engine must contain %s for the query".to_string(),
            ));
        }
        if self.new_session_url.trim().is_empty() {
            return Err(CoreError::Config("new_session_url is empty".to_string()));
        }

        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn bus_config(&self) -> BusConfig {
        BusConfig {
            reconnect_delay: Duration::from_millis(self.bus_reconnect_delay_ms),
            ping_interval: Duration::from_millis(self.bus_ping_interval_ms),
            ..BusConfig::new(self.events_url.clone())
        }
    }

    pub fn supervisor_config(&self) -> SupervisorConfig {
        SupervisorConfig {
            retry_delay: Duration::from_millis(self.stream_retry_delay_ms),
            ..SupervisorConfig::default()
        }
    }

    pub fn relay_config(&self) -> RelayConfig {
        RelayConfig {
            key_delay_ms: self.key_delay_ms,
            click_resync: Duration::from_millis(self.click_resync_ms),
            key_resync: Duration::from_millis(self.key_resync_ms),
            scroll_resync: Duration::from_millis(self.scroll_resync_ms),
        }
    }
}

fn check_url(field: &str, value: &str, schemes: &[&str]) -> Result<()> {
    let url = Url::parse(value).map_err(|e| CoreError::Config(format!("{}: {}", field, e)))?;
    if !schemes.contains(&url.scheme()) {
        return Err(CoreError::Config(format!(
            "{}: expected {} URL, got {}",
            field,
            schemes.join("/"),
            value
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        config.validate().unwrap();
        assert_eq!(config.poll_interval(), Duration::from_millis(2000));
        assert_eq!(config.viewport, Viewport::new(1920, 1080));
        assert_eq!(config.display, DisplayStrategy::Polling);
        assert_eq!(config.supervisor_config().retry_delay, Duration::from_secs(2));
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config: Config = serde_json::from_str(
            r#"{"display": "streaming", "viewport": {"width": 1280, "height": 720}}"#,
        )
        .unwrap();
        assert_eq!(config.display, DisplayStrategy::Streaming);
        assert_eq!(config.viewport, Viewport::new(1280, 720));
        assert_eq!(config.backend_url, "http://localhost:8001/api");
        assert_eq!(config.key_delay_ms, 50);
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("VANTAGE_BACKEND_URL", "https://automation.internal/api"),
            ("VANTAGE_DISPLAY", "streaming"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config
            .apply_env(|key| env.get(key).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.backend_url, "https://automation.internal/api");
        assert_eq!(config.display, DisplayStrategy::Streaming);
        assert_eq!(config.events_url, "ws://localhost:8001/ws");

        let mut config = Config::default();
        let bad = config.apply_env(|key| (key == "VANTAGE_DISPLAY").then(|| "vnc".to_string()));
        assert!(matches!(bad, Err(CoreError::Config(_))));
    }

    #[test]
    fn test_validation() {
        let mut config = Config {
            events_url: "http://localhost:8001/ws".to_string(),
            ..Config::default()
        };
        assert!(config.validate().is_err());

        config.events_url = "ws://localhost:8001/ws".to_string();
        config.poll_interval_ms = 0;
        assert!(config.validate().is_err());

        config.poll_interval_ms = 2000;
        config.viewport = Viewport::new(0, 1080);
        assert!(config.validate().is_err());

        config.viewport = Viewport::default();
        config.search_engine = "https://search.test/".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_file() {
        let path = std::env::temp_dir().join(format!("vantage-config-{}.json", std::process::id()));
        std::fs::write(&path, r#"{"poll_interval_ms": 1000}"#).unwrap();
        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.poll_interval_ms, 1000);
        std::fs::remove_file(&path).unwrap();

        assert!(matches!(
            Config::from_file("/nonexistent/vantage.json"),
            Err(CoreError::Io(_))
        ));
    }
}
