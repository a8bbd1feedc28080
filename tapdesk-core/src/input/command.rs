//! Protocol-level input commands produced by the translator.
//!
//! A [`RemoteInput`] is already in remote coordinates; turning it into
//! engine calls is a pure encoding step ([`RemoteInput::pointer_commands`]).

use crate::flags::PointerFlags;
use crate::geometry::RemotePoint;

// ── Buttons & wheel ──────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PointerButton {
    #[default]
    Left,
    Right,
    Middle,
}

impl PointerButton {
    pub fn flag(self) -> PointerFlags {
        match self {
            PointerButton::Left => PointerFlags::BUTTON1,
            PointerButton::Right => PointerFlags::BUTTON2,
            PointerButton::Middle => PointerFlags::BUTTON3,
        }
    }
}

/// Wheel rotation direction, as seen by the remote desktop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WheelDirection {
    Up,
    Down,
}

impl WheelDirection {
    pub fn flags(self) -> PointerFlags {
        match self {
            WheelDirection::Up => PointerFlags::wheel_up(),
            WheelDirection::Down => PointerFlags::wheel_down(),
        }
    }
}

// ── Keys ─────────────────────────────────────────────────────────

/// A keyboard event target on the remote side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RemoteKey {
    /// Windows virtual-key code.
    Virtual(u16),
    /// A single UTF-16 code unit.
    Unicode(u16),
}

// ── RemoteInput ──────────────────────────────────────────────────

/// One input action destined for the remote desktop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteInput {
    Move(RemotePoint),
    ButtonDown(RemotePoint, PointerButton),
    ButtonUp(RemotePoint, PointerButton),
    /// Down immediately followed by up at the same point.
    Click(RemotePoint, PointerButton),
    Wheel(RemotePoint, WheelDirection),
    Key { key: RemoteKey, down: bool },
    /// Committed text, sent per UTF-16 unit.
    Text(String),
}

impl RemoteInput {
    /// Encode the pointer part of this command as `(point, flags)` pairs in
    /// send order. Keyboard commands encode to nothing.
    pub fn pointer_commands(&self) -> Vec<(RemotePoint, PointerFlags)> {
        match *self {
            RemoteInput::Move(p) => vec![(p, PointerFlags::MOVE)],
            RemoteInput::ButtonDown(p, b) => vec![(p, PointerFlags::DOWN | b.flag())],
            RemoteInput::ButtonUp(p, b) => vec![(p, b.flag())],
            RemoteInput::Click(p, b) => vec![(p, PointerFlags::DOWN | b.flag()), (p, b.flag())],
            RemoteInput::Wheel(p, dir) => vec![(p, dir.flags())],
            RemoteInput::Key { .. } | RemoteInput::Text(_) => Vec::new(),
        }
    }

    /// Whether this command presses a pointer button.
    pub fn is_button_down(&self) -> bool {
        matches!(self, RemoteInput::ButtonDown(..) | RemoteInput::Click(..))
    }

    pub fn is_button_up(&self) -> bool {
        matches!(self, RemoteInput::ButtonUp(..) | RemoteInput::Click(..))
    }
}
