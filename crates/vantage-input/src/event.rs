//! Input events, before and after translation

use serde::{Deserialize, Serialize};
use vantage_api::MouseButton;

use crate::coords::SurfaceRect;

/// An input call for the remote session. Coordinates are in the remote
/// virtual viewport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InputEvent {
    Click {
        x: i32,
        y: i32,
        button: MouseButton,
        count: u32,
    },
    KeyChar {
        ch: char,
        delay_ms: u64,
    },
    KeySpecial {
        name: String,
    },
    Scroll {
        dx: i32,
        dy: i32,
    },
}

impl InputEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            InputEvent::Click { .. } => "click",
            InputEvent::KeyChar { .. } => "key_char",
            InputEvent::KeySpecial { .. } => "key_special",
            InputEvent::Scroll { .. } => "scroll",
        }
    }
}

/// Where a keystroke was typed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputOrigin {
    /// The rendered session surface
    #[default]
    Surface,
    /// The local address bar; never forwarded
    AddressBar,
}

/// A raw event from the local UI, in local pixels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LocalEvent {
    Pointer {
        x: f64,
        y: f64,
        surface: SurfaceRect,
        #[serde(default)]
        button: MouseButton,
        #[serde(default = "one")]
        count: u32,
    },
    Key {
        /// DOM-style key value: a character, or a name such as `Enter`
        key: String,
        #[serde(default)]
        origin: InputOrigin,
    },
    Wheel {
        dx: f64,
        dy: f64,
    },
}

fn one() -> u32 {
    1
}

const SPECIAL_KEYS: &[&str] = &[
    "Enter", "Backspace", "Tab", "Escape", "Delete", "Insert", "Home", "End", "PageUp",
    "PageDown", "ArrowUp", "ArrowDown", "ArrowLeft", "ArrowRight", "F1", "F2", "F3", "F4", "F5",
    "F6", "F7", "F8", "F9", "F10", "F11", "F12",
];

/// Single printable characters are typed; known named keys are pressed.
/// Modifiers on their own and unknown names map to nothing.
pub(crate) fn key_event(key: &str, delay_ms: u64) -> Option<InputEvent> {
    let mut chars = key.chars();
    if let (Some(ch), None) = (chars.next(), chars.next()) {
        if !ch.is_control() {
            return Some(InputEvent::KeyChar { ch, delay_ms });
        }
    }

    SPECIAL_KEYS
        .contains(&key)
        .then(|| InputEvent::KeySpecial {
            name: key.to_string(),
        })
}
