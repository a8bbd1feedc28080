//! Contract with the native remote-desktop protocol engine.
//!
//! The engine owns the wire protocol (TLS, capability negotiation, bitmap
//! codecs); the session only drives it through this narrow surface. Every
//! call is keyed by a [`NativeHandle`] obtained from
//! [`RemoteProtocolEngine::allocate`]. Callbacks arrive on whatever thread
//! the engine chooses through a registered [`EngineEvents`] sink.

use std::fmt;
use std::num::NonZeroU64;
use std::sync::Arc;

use crate::flags::PointerFlags;
use crate::frame::{FrameBuffer, Region};
use crate::geometry::RemotePoint;
use crate::input::RemoteKey;

/// Opaque native instance id. Never zero; "no connection" is `None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NativeHandle(NonZeroU64);

impl NativeHandle {
    /// Wrap a raw engine id. Returns `None` for zero.
    pub fn new(raw: u64) -> Option<Self> {
        NonZeroU64::new(raw).map(Self)
    }

    pub fn get(self) -> u64 {
        self.0.get()
    }
}

impl fmt::Display for NativeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

// ── ConnectRequest ───────────────────────────────────────────────

/// Resolved connection parameters handed to `configure`.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectRequest {
    pub host: String,
    pub port: u16,
    pub domain: Option<String>,
    pub username: String,
    pub password: String,
    /// Requested desktop size in pixels.
    pub width: u32,
    pub height: u32,
}

impl ConnectRequest {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

// Keep credentials out of logs.
impl fmt::Debug for ConnectRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectRequest")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("domain", &self.domain)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("width", &self.width)
            .field("height", &self.height)
            .finish()
    }
}

// ── Callbacks ────────────────────────────────────────────────────

/// Notifications from the engine. May be invoked from any thread,
/// including concurrently with each other.
pub trait EngineEvents: Send + Sync {
    fn on_connect_success(&self);

    /// `reason` is the engine's own explanation, when it has one.
    fn on_connect_failure(&self, reason: Option<String>);

    /// The connection ended, for whatever reason.
    fn on_disconnected(&self);

    /// The remote desktop changed size or color depth.
    fn on_graphics_resize(&self, width: u32, height: u32, color_depth: u32);

    /// New pixels are ready for the given rectangle.
    fn on_graphics_update(&self, x: u32, y: u32, width: u32, height: u32);
}

// ── Engine ───────────────────────────────────────────────────────

/// The native protocol engine.
///
/// Apart from `connect_blocking`, which hosts the engine's event loop and
/// returns only when the connection ends, every method is expected to
/// return promptly.
pub trait RemoteProtocolEngine: Send + Sync + 'static {
    /// Create a native instance.
    fn allocate(&self) -> Option<NativeHandle>;

    /// Apply connection parameters. `false` means they were rejected.
    fn configure(&self, handle: NativeHandle, request: &ConnectRequest) -> bool;

    /// Connect and run the session loop. Blocks until the connection ends;
    /// `false` means it never came up or ended abnormally.
    fn connect_blocking(&self, handle: NativeHandle) -> bool;

    /// Ask a running `connect_blocking` to return.
    fn disconnect(&self, handle: NativeHandle);

    /// Free the native instance. Called exactly once per allocation.
    fn release(&self, handle: NativeHandle);

    fn register(&self, handle: NativeHandle, events: Arc<dyn EngineEvents>);

    /// After this returns no further callbacks for `handle` are delivered.
    fn unregister(&self, handle: NativeHandle);

    /// Paint `region` of the remote image into `target`.
    fn update_graphics(&self, handle: NativeHandle, target: &mut FrameBuffer, region: Region)
    -> bool;

    fn send_pointer(&self, handle: NativeHandle, at: RemotePoint, flags: PointerFlags) -> bool;

    fn send_key(&self, handle: NativeHandle, key: RemoteKey, down: bool) -> bool;

    /// Human-readable description of the most recent engine error.
    fn last_error(&self, handle: NativeHandle) -> Option<String>;
}
