//! Domain-specific error types for the session engine.
//!
//! Only allocation, configuration and connect failures end a session.
//! Graphics and input failures are per-event and recoverable; they are
//! reported as diagnostics and the connection carries on.

use std::time::Duration;
use thiserror::Error;

use crate::state::ConnectionState;

/// The canonical error type for session operations.
#[derive(Debug, Error)]
pub enum SessionError {
    // ── Fatal (end the attempt) ──────────────────────────────────
    /// The engine could not create a native instance.
    #[error("instance allocation failed")]
    AllocationFailure,

    /// The engine rejected the connection parameters before any I/O.
    #[error("configuration rejected: {0}")]
    ConfigurationFailure(String),

    /// Network, authentication or handshake failure (includes timeout).
    #[error("connect failed: {0}")]
    ConnectFailure(String),

    // ── Non-fatal (per event) ────────────────────────────────────
    /// A single region could not be written into the frame buffer.
    #[error("graphics update failed for region {x},{y} {width}x{height}")]
    GraphicsUpdateFailure {
        x: u32,
        y: u32,
        width: u32,
        height: u32,
    },

    /// A single pointer or key command could not be transmitted.
    #[error("input send failed: {0}")]
    InputSendFailure(&'static str),

    // ── Lifecycle misuse ─────────────────────────────────────────
    /// A connect was requested while another attempt or session is live.
    #[error("session busy: already {0}")]
    AlreadyActive(ConnectionState),

    /// An operation that needs a live connection found none.
    #[error("not connected")]
    NotConnected,

    /// A state transition was requested that the lifecycle forbids.
    #[error("invalid transition: {0}")]
    InvalidTransition(&'static str),
}

impl SessionError {
    /// Connect timeout expressed as a [`SessionError::ConnectFailure`].
    pub fn timeout(after: Duration) -> Self {
        tracing::debug!(?after, "connect latch timed out");
        SessionError::ConnectFailure(CONNECT_TIMEOUT_REASON.into())
    }

    /// Whether this error ends the session (as opposed to a per-event
    /// failure the session survives).
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            SessionError::AllocationFailure
                | SessionError::ConfigurationFailure(_)
                | SessionError::ConnectFailure(_)
        )
    }
}

/// Failure reason published when the connect latch times out.
pub const CONNECT_TIMEOUT_REASON: &str = "connect timeout";

/// Failure reason published when native allocation fails.
pub const ALLOCATION_FAILED_REASON: &str = "instance allocation failed";

// ── ProfileError ─────────────────────────────────────────────────

/// Errors raised while resolving a saved connection profile.
#[derive(Debug, Error)]
pub enum ProfileError {
    /// No profile with that name.
    #[error("unknown profile: {0}")]
    NotFound(String),

    /// The device id is not `host:port`.
    #[error("invalid device id: {0:?}")]
    InvalidDeviceId(String),

    /// A required field was blank.
    #[error("{0} is required")]
    MissingField(&'static str),
}
