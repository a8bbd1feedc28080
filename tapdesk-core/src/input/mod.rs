//! Local input → remote protocol commands.
//!
//! | Module    | Purpose                                                   |
//! |-----------|-----------------------------------------------------------|
//! | `mapper`  | Surface coordinates → remote frame-buffer pixels          |
//! | `gesture` | Touch sequence state machine (tap, drag, pinch)           |
//! | `keymap`  | Host key codes → Windows virtual keys                     |
//! | `command` | `RemoteInput` and its pointer-flag encoding               |

pub mod command;
pub mod gesture;
pub mod keymap;
pub mod mapper;

pub use command::{PointerButton, RemoteInput, RemoteKey, WheelDirection};
pub use gesture::{Gesture, GestureConfig, GestureTranslator, PointerEvent, TouchEvent};
pub use keymap::{KeyInput, host_to_vk, translate_key};
pub use mapper::{Viewport, map_to_remote};
