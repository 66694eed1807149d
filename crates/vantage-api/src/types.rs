//! Wire types exchanged with the automation backend

use serde::{Deserialize, Deserializer, Serialize};

/// A session record as reported by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteSession {
    pub id: String,
    #[serde(default)]
    pub url: String,
    #[serde(default, deserialize_with = "non_empty")]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "non_empty")]
    pub favicon: Option<String>,
}

impl RemoteSession {
    pub fn new(id: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            url: url.into(),
            title: None,
            favicon: None,
        }
    }
}

/// Result of a confirmed navigation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct NavigateOutcome {
    /// Final URL after redirects, when the backend reports it
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default, deserialize_with = "non_empty")]
    pub title: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MouseButton {
    #[default]
    Left,
    Right,
    Middle,
}

impl MouseButton {
    pub fn as_str(&self) -> &'static str {
        match self {
            MouseButton::Left => "left",
            MouseButton::Right => "right",
            MouseButton::Middle => "middle",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClickRequest {
    pub x: i32,
    pub y: i32,
    pub button: MouseButton,
    pub click_count: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TypeRequest {
    pub text: String,
    /// Milliseconds between keystrokes
    pub delay: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScrollRequest {
    pub delta_x: i32,
    pub delta_y: i32,
}

/// `GET /browser/status`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BackendStatus {
    pub browser_type: String,
    pub headless: bool,
    #[serde(default)]
    pub active_contexts: usize,
    #[serde(default)]
    pub active_pages: usize,
}

// The backend reports missing metadata as "" as often as null.
fn non_empty<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|s| !s.trim().is_empty()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_metadata_is_none() {
        let session: RemoteSession = serde_json::from_str(
            r#"{"id": "t1", "url": "https://example.com", "title": null, "favicon": ""}"#,
        )
        .unwrap();
        assert_eq!(session.id, "t1");
        assert!(session.title.is_none());
        assert!(session.favicon.is_none());
    }

    #[test]
    fn test_click_body_shape() {
        let body = serde_json::to_value(ClickRequest {
            x: 480,
            y: 240,
            button: MouseButton::Right,
            click_count: 2,
        })
        .unwrap();
        assert_eq!(
            body,
            serde_json::json!({"x": 480, "y": 240, "button": "right", "click_count": 2})
        );
    }
}
