//! Touch gesture disambiguation.
//!
//! A touch sequence (first contact down → last contact up) is tracked by a
//! single [`Gesture`] value and advanced by one transition function,
//! [`GestureTranslator::on_touch`]. Each transition returns the remote
//! commands it implies, already mapped through the current [`Viewport`].
//!
//! ```text
//!            down                move > threshold
//!   Idle ──────────► Down ─────────────────────► Dragging
//!    ▲                │ up < 300ms: click          │ up: button-up
//!    │                │ second contact             │ second contact: button-up
//!    │                ▼                            ▼
//!    └──── up ────── Multi ◄───────────────────────┘
//! ```
//!
//! Once a second contact is seen the gesture is `Multi` until it ends:
//! no button press or click can be produced, only wheel events from pinch.

use std::time::{Duration, Instant};

use tracing::trace;

use crate::geometry::Point;
use crate::input::command::{PointerButton, RemoteInput, WheelDirection};
use crate::input::mapper::Viewport;

/// Squared travel (in surface pixels) that turns a press into a drag.
pub const DRAG_THRESHOLD_SQ: f32 = 36.0;
/// Longest press that still counts as a tap.
pub const TAP_TIMEOUT: Duration = Duration::from_millis(300);

// ── Events ───────────────────────────────────────────────────────

/// Touch-screen input in local surface coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TouchEvent {
    /// First contact of a new sequence.
    Down { at: Point, time: Instant },
    /// An additional contact; `pointers` is the new contact count.
    PointerDown { pointers: usize },
    /// Primary contact moved while `pointers` contacts are down.
    Move { at: Point, pointers: usize },
    /// A non-final contact lifted.
    PointerUp { pointers: usize },
    /// Last contact lifted.
    Up { at: Point, time: Instant },
    /// The host aborted the sequence.
    Cancel { at: Point },
    /// Pinch progress around `focus`; `factor` > 1 spreads, < 1 pinches.
    Scale { focus: Point, factor: f32 },
}

/// Input from an external pointing device (mouse, trackpad).
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PointerEvent {
    Hover { at: Point },
    /// Vertical scroll; positive is away from the user.
    Scroll { at: Point, vertical: f32 },
}

// ── Gesture ──────────────────────────────────────────────────────

/// Per-sequence state.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Gesture {
    #[default]
    Idle,
    /// One contact down, not yet travelled far enough to drag.
    Down {
        origin: Point,
        last: Point,
        started: Instant,
    },
    /// Left button is held on the remote side.
    Dragging { origin: Point, last: Point },
    /// More than one contact was seen; buttons are suppressed.
    Multi,
}

/// Tunables for gesture recognition.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GestureConfig {
    pub drag_threshold_sq: f32,
    pub tap_timeout: Duration,
}

impl Default for GestureConfig {
    fn default() -> Self {
        Self {
            drag_threshold_sq: DRAG_THRESHOLD_SQ,
            tap_timeout: TAP_TIMEOUT,
        }
    }
}

// ── GestureTranslator ────────────────────────────────────────────

/// Turns host touch and pointer events into remote commands.
#[derive(Debug, Default)]
pub struct GestureTranslator {
    config: GestureConfig,
    gesture: Gesture,
}

impl GestureTranslator {
    pub fn new(config: GestureConfig) -> Self {
        Self {
            config,
            gesture: Gesture::Idle,
        }
    }

    pub fn gesture(&self) -> &Gesture {
        &self.gesture
    }

    /// Forget the current sequence without emitting anything.
    pub fn reset(&mut self) {
        self.gesture = Gesture::Idle;
    }

    /// Advance the gesture by one touch event.
    pub fn on_touch(&mut self, event: TouchEvent, viewport: &Viewport) -> Vec<RemoteInput> {
        let mut out = Vec::new();
        let left = PointerButton::Left;

        match event {
            TouchEvent::Down { at, time } => {
                // A lost Up must not leave the remote button held.
                if let Gesture::Dragging { last, .. } = self.gesture {
                    out.push(RemoteInput::ButtonUp(viewport.to_remote(last), left));
                }
                self.gesture = Gesture::Down {
                    origin: at,
                    last: at,
                    started: time,
                };
                out.push(RemoteInput::Move(viewport.to_remote(at)));
            }

            TouchEvent::PointerDown { pointers } if pointers >= 2 => {
                self.enter_multi(viewport, &mut out);
            }
            TouchEvent::PointerDown { .. } | TouchEvent::PointerUp { .. } => {}

            TouchEvent::Move { pointers, .. } if pointers >= 2 => {
                self.enter_multi(viewport, &mut out);
            }
            TouchEvent::Move { at, .. } => match self.gesture {
                Gesture::Down { origin, .. }
                    if at.distance_sq(origin) > self.config.drag_threshold_sq =>
                {
                    let remote = viewport.to_remote(at);
                    self.gesture = Gesture::Dragging { origin, last: at };
                    out.push(RemoteInput::ButtonDown(remote, left));
                    out.push(RemoteInput::Move(remote));
                }
                Gesture::Down { origin, started, .. } => {
                    self.gesture = Gesture::Down {
                        origin,
                        last: at,
                        started,
                    };
                    out.push(RemoteInput::Move(viewport.to_remote(at)));
                }
                Gesture::Dragging { origin, .. } => {
                    self.gesture = Gesture::Dragging { origin, last: at };
                    out.push(RemoteInput::Move(viewport.to_remote(at)));
                }
                Gesture::Idle | Gesture::Multi => {}
            },

            TouchEvent::Up { at, time } => {
                match std::mem::take(&mut self.gesture) {
                    Gesture::Down { started, .. }
                        if time.saturating_duration_since(started) < self.config.tap_timeout =>
                    {
                        out.push(RemoteInput::Click(viewport.to_remote(at), left));
                    }
                    Gesture::Dragging { .. } => {
                        out.push(RemoteInput::ButtonUp(viewport.to_remote(at), left));
                    }
                    // Long press without travel, multi-touch, or stray up.
                    _ => {}
                }
            }

            TouchEvent::Cancel { at } => {
                if let Gesture::Dragging { .. } = std::mem::take(&mut self.gesture) {
                    out.push(RemoteInput::ButtonUp(viewport.to_remote(at), left));
                }
            }

            TouchEvent::Scale { focus, factor } => {
                self.enter_multi(viewport, &mut out);
                if let Some(direction) = pinch_direction(factor) {
                    out.push(RemoteInput::Wheel(viewport.to_remote(focus), direction));
                }
            }
        }

        trace!(?event, gesture = ?self.gesture, emitted = out.len(), "touch");
        out
    }

    /// Translate an external pointer event. Does not affect the touch
    /// gesture.
    pub fn on_pointer(&self, event: PointerEvent, viewport: &Viewport) -> Vec<RemoteInput> {
        match event {
            PointerEvent::Hover { at } => vec![RemoteInput::Move(viewport.to_remote(at))],
            PointerEvent::Scroll { at, vertical } => {
                let direction = if vertical > 0.0 {
                    WheelDirection::Up
                } else if vertical < 0.0 {
                    WheelDirection::Down
                } else {
                    return Vec::new();
                };
                vec![RemoteInput::Wheel(viewport.to_remote(at), direction)]
            }
        }
    }

    fn enter_multi(&mut self, viewport: &Viewport, out: &mut Vec<RemoteInput>) {
        if let Gesture::Dragging { last, .. } = self.gesture {
            out.push(RemoteInput::ButtonUp(viewport.to_remote(last), PointerButton::Left));
        }
        self.gesture = Gesture::Multi;
    }
}

/// Spreading zooms in (wheel down), pinching zooms out (wheel up).
fn pinch_direction(factor: f32) -> Option<WheelDirection> {
    if !factor.is_finite() {
        return None;
    }
    if factor > 1.0 {
        Some(WheelDirection::Down)
    } else if factor < 1.0 {
        Some(WheelDirection::Up)
    } else {
        None
    }
}
