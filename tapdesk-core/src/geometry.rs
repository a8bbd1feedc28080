//! Points and render placement shared by the frame and input pipelines.

// ── Points ───────────────────────────────────────────────────────

/// A point on the local display surface, in surface pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Squared distance to `other`.
    pub fn distance_sq(self, other: Point) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx * dx + dy * dy
    }
}

/// A point in remote frame-buffer pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct RemotePoint {
    pub x: i32,
    pub y: i32,
}

impl RemotePoint {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

// ── DisplayScale ─────────────────────────────────────────────────

/// How much of the local surface the remote image occupies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DisplayScale {
    /// Fill the surface.
    #[default]
    Full,
    /// Shrink to 80%, centred.
    Reduced,
}

impl DisplayScale {
    pub fn factor(self) -> f32 {
        match self {
            DisplayScale::Full => 1.0,
            DisplayScale::Reduced => 0.8,
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            DisplayScale::Full => DisplayScale::Reduced,
            DisplayScale::Reduced => DisplayScale::Full,
        }
    }
}

// ── RenderGeometry ───────────────────────────────────────────────

/// Where the remote image was last drawn on the local surface.
///
/// Recomputed on every draw; the coordinate mapper reads the most recent
/// value to undo the placement.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RenderGeometry {
    pub left: f32,
    pub top: f32,
    pub width: f32,
    pub height: f32,
    /// Surface extent the placement was computed for.
    pub surface_width: u32,
    pub surface_height: u32,
}

impl RenderGeometry {
    /// Centre the image within a `surface_width × surface_height` surface
    /// at the given scale. Zero-sized surfaces are treated as 1×1.
    pub fn compute(surface_width: u32, surface_height: u32, scale: DisplayScale) -> Self {
        let vw = surface_width.max(1) as f32;
        let vh = surface_height.max(1) as f32;
        let dw = vw * scale.factor();
        let dh = vh * scale.factor();
        Self {
            left: (vw - dw) / 2.0,
            top: (vh - dh) / 2.0,
            width: dw,
            height: dh,
            surface_width: surface_width.max(1),
            surface_height: surface_height.max(1),
        }
    }

    /// Whether a draw has happened since the surface appeared.
    pub fn is_drawn(&self) -> bool {
        self.width > 1.0 && self.height > 1.0
    }

    /// Whether `p` falls inside the drawn rectangle.
    pub fn contains(&self, p: Point) -> bool {
        p.x >= self.left
            && p.y >= self.top
            && p.x < self.left + self.width
            && p.y < self.top + self.height
    }
}
