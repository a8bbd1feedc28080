//! Local surface → remote frame-buffer coordinate mapping.
//!
//! The remote image is stretched into the render rectangle, so the
//! inverse is a per-axis normalisation. Coordinates are clamped before
//! scaling (touches outside the image pin to its nearest edge) and again
//! after conversion, so the result is always a valid remote pixel.

use crate::geometry::{Point, RemotePoint, RenderGeometry};

/// Map `local` into a `fb_width × fb_height` remote frame buffer.
///
/// Unknown remote dimensions (≤ 0) return the input point unchanged.
/// A render extent of one pixel or less means nothing has been drawn yet;
/// the full surface extent is used instead.
pub fn map_to_remote(
    local: Point,
    geometry: &RenderGeometry,
    fb_width: i32,
    fb_height: i32,
) -> RemotePoint {
    if fb_width <= 0 || fb_height <= 0 {
        return RemotePoint::new(local.x as i32, local.y as i32);
    }

    let rw = if geometry.width > 1.0 {
        geometry.width
    } else {
        geometry.surface_width.max(1) as f32
    };
    let rh = if geometry.height > 1.0 {
        geometry.height
    } else {
        geometry.surface_height.max(1) as f32
    };

    let nx = ((local.x - geometry.left) / rw).clamp(0.0, 1.0);
    let ny = ((local.y - geometry.top) / rh).clamp(0.0, 1.0);

    // Truncates; stays within [0, fb-1] because n ≤ 1.
    let fx = (nx * (fb_width - 1) as f32) as i32;
    let fy = (ny * (fb_height - 1) as f32) as i32;

    RemotePoint::new(fx.clamp(0, fb_width - 1), fy.clamp(0, fb_height - 1))
}

// ── Viewport ─────────────────────────────────────────────────────

/// Snapshot of everything the mapper needs: where the image was drawn
/// and how large the remote desktop is.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Viewport {
    pub geometry: RenderGeometry,
    pub fb_width: i32,
    pub fb_height: i32,
}

impl Viewport {
    pub fn new(geometry: RenderGeometry, frame_size: Option<(u32, u32)>) -> Self {
        let (fb_width, fb_height) = frame_size
            .map(|(w, h)| (w as i32, h as i32))
            .unwrap_or((0, 0));
        Self {
            geometry,
            fb_width,
            fb_height,
        }
    }

    pub fn to_remote(&self, local: Point) -> RemotePoint {
        map_to_remote(local, &self.geometry, self.fb_width, self.fb_height)
    }
}
