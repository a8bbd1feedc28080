//! Frame sync pipeline: keeps the displayed image in step with the
//! remote desktop across the callback and render threads.
//!
//! The protocol engine paints into a private *staging* buffer. After each
//! region lands, the staging contents are copied into a recycled buffer
//! and published with a single pointer swap on a `watch` channel. A
//! recycled buffer is the previously published image, so only the region
//! painted since then is copied; a full copy happens only when no buffer
//! of the current geometry can be recycled. The
//! render path only ever clones the published `Arc`, so it sees either the
//! previous complete image or the next one, never a half-applied update
//! and never new dimensions over old pixels.
//!
//! ```text
//! callback thread                         render thread
//! ┌──────────┐  copy   ┌───────┐  swap   ┌────────────────┐
//! │ staging  │ ──────► │ spare │ ──────► │ published Arc  │──► surface
//! └──────────┘         └───────┘         └────────────────┘
//!                          ▲  previous Arc, once unshared │
//!                          └──────────────────────────────┘
//! ```

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::{debug, info, trace, warn};

use crate::error::SessionError;
use crate::events::EventSink;
use crate::frame::buffer::{FrameBuffer, Region};
use crate::geometry::{DisplayScale, RenderGeometry};

// ── DisplaySurface ───────────────────────────────────────────────

/// A local surface the remote image is drawn onto.
pub trait DisplaySurface {
    /// Current surface size in pixels.
    fn size(&self) -> (u32, u32);

    /// Draw `frame` scaled into the `geometry` rectangle, clearing the
    /// rest of the surface.
    fn present(&mut self, frame: &FrameBuffer, geometry: &RenderGeometry);
}

// ── FrameStats ───────────────────────────────────────────────────

/// Per-session frame statistics exposed to the UI.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameStats {
    /// Region updates applied since the connect started.
    pub frames: u64,
    /// Current frame buffer width.
    pub width: u32,
    /// Current frame buffer height.
    pub height: u32,
    /// Time from connect initiation to the first region update.
    pub first_frame_after: Option<Duration>,
}

// ── FrameSync ────────────────────────────────────────────────────

/// A retired frame, stale only in `stale`.
struct Spare {
    frame: FrameBuffer,
    stale: Region,
}

#[derive(Default)]
struct Slots {
    staging: Option<FrameBuffer>,
    spare: Option<Spare>,
}

#[derive(Default)]
struct Timing {
    connect_started: Option<Instant>,
    first_frame_at: Option<Instant>,
}

#[derive(Default)]
struct View {
    scale: DisplayScale,
    geometry: RenderGeometry,
}

/// Owner of the session's single authoritative frame buffer.
pub struct FrameSync {
    slots: Mutex<Slots>,
    published: watch::Sender<Option<Arc<FrameBuffer>>>,
    stats: watch::Sender<FrameStats>,
    timing: Mutex<Timing>,
    view: Mutex<View>,
    last_error: Mutex<Option<String>>,
    events: EventSink,
}

impl FrameSync {
    pub fn new(events: EventSink) -> Self {
        let (published, _) = watch::channel(None);
        let (stats, _) = watch::channel(FrameStats::default());
        Self {
            slots: Mutex::new(Slots::default()),
            published,
            stats,
            timing: Mutex::new(Timing::default()),
            view: Mutex::new(View::default()),
            last_error: Mutex::new(None),
            events,
        }
    }

    // ── Writer side (callback context) ───────────────────────────

    /// Replace the frame buffer with a blank `width × height` image.
    ///
    /// Storage and dimensions are swapped in together; a concurrent
    /// render sees either the old buffer or the new one.
    pub fn resize(&self, width: u32, height: u32, color_depth: u32) {
        let fb = FrameBuffer::new(width, height, color_depth);
        let mut slots = self.slots.lock();
        let (w, h) = self.install(&mut slots, fb);
        drop(slots);
        info!(width = w, height = h, color_depth, "frame buffer resized");
        self.announce(w, h);
    }

    /// Publish an initial buffer unless the engine already sized one.
    ///
    /// The check and the publish happen under the same lock as
    /// [`resize`](Self::resize), so an engine resize is never replaced by
    /// the placeholder.
    pub fn ensure_initial(&self, width: u32, height: u32, color_depth: u32) {
        let fb = FrameBuffer::new(width, height, color_depth);
        let mut slots = self.slots.lock();
        if slots.staging.is_some() {
            debug!("frame buffer already sized; placeholder skipped");
            return;
        }
        let (w, h) = self.install(&mut slots, fb);
        drop(slots);
        debug!(width = w, height = h, "placeholder frame published");
        self.announce(w, h);
    }

    /// Make `fb` the staging and published image. Caller holds `slots`.
    fn install(&self, slots: &mut Slots, fb: FrameBuffer) -> (u32, u32) {
        let (w, h) = (fb.width(), fb.height());
        slots.spare = None;
        slots.staging = Some(fb.clone());
        self.published.send_replace(Some(Arc::new(fb)));
        self.stats.send_modify(|s| {
            s.width = w;
            s.height = h;
        });
        (w, h)
    }

    fn announce(&self, width: u32, height: u32) {
        self.events.resized(width, height);
        self.events.redraw(Region::full(width, height));
    }

    /// Apply one region update.
    ///
    /// `write` receives the staging buffer and the (clamped) region and
    /// paints the remote pixels; it returns `false` when the engine could
    /// not. A failed write is recorded as a diagnostic and reported as
    /// [`SessionError::GraphicsUpdateFailure`], which callers treat as
    /// non-fatal.
    pub fn apply_region_update<F>(&self, region: Region, write: F) -> Result<(), SessionError>
    where
        F: FnOnce(&mut FrameBuffer, Region) -> bool,
    {
        let applied = {
            let mut slots = self.slots.lock();
            let Slots { staging, spare } = &mut *slots;

            let Some(staging) = staging.as_mut() else {
                return Err(self.graphics_failure(region, "no frame buffer yet"));
            };
            let Some(clamped) = region.clamp_to(staging.width(), staging.height()) else {
                return Err(self.graphics_failure(region, "region outside frame buffer"));
            };
            if !write(staging, clamped) {
                return Err(self.graphics_failure(region, "engine write failed"));
            }

            let next = match spare.take() {
                Some(Spare { mut frame, stale }) if frame.same_geometry(staging) => {
                    frame.copy_region_from(staging, stale);
                    frame.copy_region_from(staging, clamped);
                    frame
                }
                _ => {
                    trace!(region = %clamped, "no recyclable frame; full copy");
                    staging.clone()
                }
            };

            if let Some(previous) = self.published.send_replace(Some(Arc::new(next))) {
                // Recycle unless a renderer still holds it. It matches
                // staging everywhere except the region just painted.
                if let Ok(frame) = Arc::try_unwrap(previous) {
                    *spare = Some(Spare {
                        frame,
                        stale: clamped,
                    });
                }
            }
            clamped
        };

        self.record_frame(applied);
        self.events.redraw(applied);
        Ok(())
    }

    fn record_frame(&self, region: Region) {
        let mut first_after = None;
        {
            let mut timing = self.timing.lock();
            if timing.first_frame_at.is_none() {
                let now = Instant::now();
                timing.first_frame_at = Some(now);
                first_after = Some(
                    timing
                        .connect_started
                        .map(|t| now.saturating_duration_since(t))
                        .unwrap_or_default(),
                );
            }
        }

        self.stats.send_modify(|s| {
            s.frames += 1;
            if first_after.is_some() {
                s.first_frame_after = first_after;
            }
        });

        if let Some(cost) = first_after {
            self.events.diagnostic(format!(
                "first frame received after {}ms, region {region}",
                cost.as_millis()
            ));
        }
    }

    fn graphics_failure(&self, region: Region, reason: &str) -> SessionError {
        self.record_error(format!("graphics update failed ({reason}) for region {region}"));
        SessionError::GraphicsUpdateFailure {
            x: region.x,
            y: region.y,
            width: region.width,
            height: region.height,
        }
    }

    /// Remember a non-fatal error and surface it as a diagnostic.
    pub fn record_error(&self, message: String) {
        warn!("{message}");
        *self.last_error.lock() = Some(message.clone());
        self.events.diagnostic(message);
    }

    // ── Reader side (render context) ─────────────────────────────

    /// Draw the latest complete image onto `surface`.
    ///
    /// Recomputes the render geometry from the surface size and current
    /// display scale, and returns it. Never waits on the network.
    pub fn render(&self, surface: &mut dyn DisplaySurface) -> RenderGeometry {
        let (sw, sh) = surface.size();
        let geometry = {
            let mut view = self.view.lock();
            view.geometry = RenderGeometry::compute(sw, sh, view.scale);
            view.geometry
        };
        if let Some(frame) = self.latest() {
            surface.present(&frame, &geometry);
        }
        geometry
    }

    /// Flip between full and reduced view. Returns `true` when the
    /// reduced view is now active.
    pub fn toggle_display_scale(&self) -> bool {
        let scale = {
            let mut view = self.view.lock();
            view.scale = view.scale.toggled();
            view.scale
        };
        debug!(?scale, "display scale toggled");
        if let Some((w, h)) = self.frame_size() {
            self.events.redraw(Region::full(w, h));
        }
        scale == DisplayScale::Reduced
    }

    pub fn display_scale(&self) -> DisplayScale {
        self.view.lock().scale
    }

    /// Placement used by the most recent render.
    pub fn geometry(&self) -> RenderGeometry {
        self.view.lock().geometry
    }

    /// The most recently published frame.
    pub fn latest(&self) -> Option<Arc<FrameBuffer>> {
        self.published.borrow().clone()
    }

    /// Dimensions of the published frame, if any.
    pub fn frame_size(&self) -> Option<(u32, u32)> {
        self.published
            .borrow()
            .as_ref()
            .map(|fb| (fb.width(), fb.height()))
    }

    /// A receiver that wakes whenever a new frame is published.
    pub fn subscribe(&self) -> watch::Receiver<Option<Arc<FrameBuffer>>> {
        self.published.subscribe()
    }

    /// A receiver for frame statistics.
    pub fn stats_receiver(&self) -> watch::Receiver<FrameStats> {
        self.stats.subscribe()
    }

    pub fn stats(&self) -> FrameStats {
        self.stats.borrow().clone()
    }

    // ── Diagnostics ──────────────────────────────────────────────

    /// Start timing a new connect attempt.
    pub fn mark_connect_started(&self) {
        *self.timing.lock() = Timing {
            connect_started: Some(Instant::now()),
            first_frame_at: None,
        };
        *self.last_error.lock() = None;
        self.stats.send_modify(|s| {
            s.frames = 0;
            s.first_frame_after = None;
        });
    }

    pub fn first_frame_received(&self) -> bool {
        self.timing.lock().first_frame_at.is_some()
    }

    pub fn frame_count(&self) -> u64 {
        self.stats.borrow().frames
    }

    pub fn last_error(&self) -> Option<String> {
        self.last_error.lock().clone()
    }

    /// Text of the "first frame timeout" diagnostic, or `None` when a
    /// frame has already arrived.
    pub fn first_frame_overdue(&self, engine_error: Option<String>) -> Option<String> {
        let waited = {
            let timing = self.timing.lock();
            if timing.first_frame_at.is_some() {
                return None;
            }
            timing
                .connect_started
                .map(|t| t.elapsed())
                .unwrap_or_default()
        };
        let last_error = engine_error
            .or_else(|| self.last_error())
            .unwrap_or_else(|| "none".into());
        Some(format!(
            "first frame timeout: no image {}ms after connect, frame_count={}, last_error={last_error}",
            waited.as_millis(),
            self.frame_count(),
        ))
    }

    /// Drop all frame state. A reconnect starts from a fresh resize.
    pub fn clear(&self) {
        {
            let mut slots = self.slots.lock();
            slots.staging = None;
            slots.spare = None;
            self.published.send_replace(None);
        }
        self.timing.lock().first_frame_at = None;
        self.stats.send_replace(FrameStats::default());
    }
}

// ── Tests ────────────────────────────────────────────────────────
