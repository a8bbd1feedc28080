//! # tapdesk-core
//!
//! Remote session engine for driving a Windows desktop from a touch device.
//!
//! This crate contains:
//! - **Session**: `Session`: connection lifecycle, connect worker, engine callbacks, input dispatch
//! - **State**: `ConnectionState` and its validated transitions
//! - **Frame**: `FrameBuffer` and `FrameSync`, the double-buffered publish path to the renderer
//! - **Input**: coordinate mapping, touch gesture recognition, key translation, `RemoteInput`
//! - **Engine**: `RemoteProtocolEngine` / `EngineEvents`, the contract with the native protocol engine
//! - **Profile**: saved connection profiles and the `ProfileStore` trait
//! - **Error**: `SessionError`, `ProfileError`, typed, `thiserror`-based

pub mod engine;
pub mod error;
pub mod events;
pub mod flags;
pub mod frame;
pub mod geometry;
pub mod input;
pub mod profile;
pub mod session;
pub mod state;

// ── Re-exports for ergonomic usage ───────────────────────────────

pub use engine::{ConnectRequest, EngineEvents, NativeHandle, RemoteProtocolEngine};
pub use error::{ProfileError, SessionError};
pub use events::{EventReceiver, EventSink, SessionEvent};
pub use flags::PointerFlags;
pub use frame::{DisplaySurface, FrameBuffer, FrameStats, FrameSync, PixelFormat, Region};
pub use geometry::{DisplayScale, Point, RemotePoint, RenderGeometry};
pub use input::{
    GestureTranslator, KeyInput, PointerButton, PointerEvent, RemoteInput, RemoteKey, TouchEvent,
    Viewport, WheelDirection,
};
pub use profile::{Profile, ProfileStore, StaticProfileStore};
pub use session::{ConnectOutcome, Session, SessionConfig};
pub use state::ConnectionState;
