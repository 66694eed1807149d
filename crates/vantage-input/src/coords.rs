//! Local surface to remote viewport coordinates

use serde::{Deserialize, Serialize};
use vantage_display::Viewport;

/// Bounding box of the rendered surface, in local pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SurfaceRect {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl SurfaceRect {
    pub fn new(left: f64, top: f64, width: f64, height: f64) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.left
            && y >= self.top
            && x <= self.left + self.width
            && y <= self.top + self.height
    }
}

/// Map a local pixel onto the remote viewport.
///
/// Holds for any surface size, zoom or pixel ratio, and for both still and
/// streamed frames. `None` for points outside the surface or a degenerate
/// surface.
pub fn to_remote(x: f64, y: f64, surface: &SurfaceRect, viewport: Viewport) -> Option<(i32, i32)> {
    if surface.width <= 0.0 || surface.height <= 0.0 || viewport.is_empty() {
        return None;
    }
    if !surface.contains(x, y) {
        return None;
    }

    let vw = f64::from(viewport.width);
    let vh = f64::from(viewport.height);
    let rx = ((x - surface.left) * vw / surface.width).round();
    let ry = ((y - surface.top) * vh / surface.height).round();

    // The far edge rounds onto the viewport size itself
    Some((rx.min(vw - 1.0) as i32, ry.min(vh - 1.0) as i32))
}
