//! Lifecycle notifications
//!
//! Wire format (JSON text frames):
//! ```text
//! {"type": "session_closed", "data": {"id": "t1"}}
//! {"type": "session_navigated", "data": {"id": "t1", "url": "...", "title": "..."}}
//! ```
//! The older `tab_*` names are accepted as aliases, and a top-level `id`
//! is accepted when `data` is absent.

use serde::{Deserialize, Serialize};

use crate::error::EventBusError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleKind {
    Created,
    Closed,
    Navigated,
}

impl LifecycleKind {
    fn from_wire(kind: &str) -> Option<Self> {
        match kind {
            "session_created" | "tab_created" => Some(LifecycleKind::Created),
            "session_closed" | "tab_closed" => Some(LifecycleKind::Closed),
            "session_navigated" | "tab_navigated" => Some(LifecycleKind::Navigated),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleKind::Created => "created",
            LifecycleKind::Closed => "closed",
            LifecycleKind::Navigated => "navigated",
        }
    }
}

impl std::fmt::Display for LifecycleKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LifecycleEvent {
    pub kind: LifecycleKind,
    pub session_id: String,
    /// Hints only; the registry reloads rather than trusting these
    pub url: Option<String>,
    pub title: Option<String>,
}

/// What subscribers receive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BusMessage {
    Lifecycle(LifecycleEvent),
    /// The channel came back after a disconnect; anything may have changed.
    Reconnected,
}

#[derive(Deserialize)]
struct WireMessage {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    data: Option<serde_json::Value>,
    #[serde(default)]
    id: Option<String>,
}

#[derive(Deserialize, Default)]
struct WireData {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    title: Option<String>,
}

/// Decode one text frame.
///
/// `Ok(None)` for frames that are not lifecycle notifications (`pong`,
/// unknown types, notifications without a session id).
pub fn decode(text: &str) -> Result<Option<LifecycleEvent>, EventBusError> {
    let message: WireMessage = serde_json::from_str(text)?;

    let Some(kind) = LifecycleKind::from_wire(&message.kind) else {
        return Ok(None);
    };

    let data: WireData = match message.data {
        Some(value) => serde_json::from_value(value)?,
        None => WireData::default(),
    };
    let Some(session_id) = data.id.or(message.id).filter(|id| !id.is_empty()) else {
        tracing::warn!(kind = %kind, "Lifecycle notification without session id");
        return Ok(None);
    };

    Ok(Some(LifecycleEvent {
        kind,
        session_id,
        url: data.url,
        title: data.title,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_session_events() {
        let event = decode(r#"{"type": "session_closed", "data": {"id": "t1"}}"#)
            .unwrap()
            .unwrap();
        assert_eq!(event.kind, LifecycleKind::Closed);
        assert_eq!(event.session_id, "t1");

        let event = decode(
            r#"{"type": "session_navigated", "data": {"id": "t2", "url": "https://a.test", "title": "A"}}"#,
        )
        .unwrap()
        .unwrap();
        assert_eq!(event.kind, LifecycleKind::Navigated);
        assert_eq!(event.url.as_deref(), Some("https://a.test"));
    }

    #[test]
    fn test_decode_legacy_names() {
        let event = decode(r#"{"type": "tab_created", "data": {"id": "t3", "title": "New Tab"}}"#)
            .unwrap()
            .unwrap();
        assert_eq!(event.kind, LifecycleKind::Created);

        let event = decode(r#"{"type": "tab_closed", "id": "t4"}"#).unwrap().unwrap();
        assert_eq!(event.session_id, "t4");
    }

    #[test]
    fn test_decode_ignores_other_frames() {
        assert!(decode(r#"{"type": "pong"}"#).unwrap().is_none());
        assert!(decode(r#"{"type": "tabs_update", "data": []}"#)
            .unwrap()
            .is_none());
        assert!(decode(r#"{"type": "session_closed", "data": {}}"#)
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_decode_malformed() {
        assert!(decode("not json").is_err());
    }
}
