//! Virtual viewport

use serde::{Deserialize, Serialize};

/// Fixed logical resolution of the remote session.
///
/// Remote pointer coordinates are expressed in this space, and frames are
/// scaled to it for display, whatever size the local surface has.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new(1920, 1080)
    }
}

impl std::fmt::Display for Viewport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}
