//! Session lifecycle states and their validated transitions.
//!
//! Transitions return `Result` instead of panicking; the session driver
//! maps a rejected transition onto [`SessionError::AlreadyActive`] or
//! [`SessionError::InvalidTransition`].

use crate::error::SessionError;

// ── ConnectionState ──────────────────────────────────────────────

/// The current lifecycle state of a remote session.
///
/// ```text
///   Idle ──► Connecting ──► Connected
///    ▲           │              │  │
///    │           ▼              │  │ (user disconnect)
///    ├─────── Failed ◄──────────┘  │
///    └─────────────────────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConnectionState {
    /// No native instance exists. Initial state.
    #[default]
    Idle,

    /// A native instance exists and the handshake is in flight.
    Connecting,

    /// The engine reported success; graphics and input are live.
    Connected,

    /// The attempt or session ended with an error. Terminal until reset.
    Failed,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "Idle"),
            Self::Connecting => write!(f, "Connecting"),
            Self::Connected => write!(f, "Connected"),
            Self::Failed => write!(f, "Failed"),
        }
    }
}

impl ConnectionState {
    /// Whether a native handle may be live in this state.
    pub fn holds_handle(self) -> bool {
        matches!(self, Self::Connecting | Self::Connected)
    }

    /// Whether input and graphics traffic is allowed.
    pub fn is_connected(self) -> bool {
        matches!(self, Self::Connected)
    }

    // ── Transitions ──────────────────────────────────────────────

    /// `Idle → Connecting`.
    ///
    /// Any other state rejects the request; a second attempt is never
    /// queued behind the first.
    pub fn begin_connect(&mut self) -> Result<(), SessionError> {
        match self {
            Self::Idle => {
                *self = Self::Connecting;
                Ok(())
            }
            other => Err(SessionError::AlreadyActive(*other)),
        }
    }

    /// `Connecting → Connected`.
    pub fn complete_connect(&mut self) -> Result<(), SessionError> {
        match self {
            Self::Connecting => {
                *self = Self::Connected;
                Ok(())
            }
            _ => Err(SessionError::InvalidTransition(
                "cannot complete connect: not in Connecting state",
            )),
        }
    }

    /// `Connecting | Connected → Failed`.
    pub fn fail(&mut self) -> Result<(), SessionError> {
        match self {
            Self::Connecting | Self::Connected => {
                *self = Self::Failed;
                Ok(())
            }
            _ => Err(SessionError::InvalidTransition(
                "cannot fail: no attempt or session in progress",
            )),
        }
    }

    /// `Connected | Failed → Idle`.
    pub fn finish_disconnect(&mut self) -> Result<(), SessionError> {
        match self {
            Self::Connected | Self::Failed => {
                *self = Self::Idle;
                Ok(())
            }
            _ => Err(SessionError::InvalidTransition(
                "cannot finish disconnect: not Connected or Failed",
            )),
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────
