//! Notifications delivered to the UI context.
//!
//! Every producer (connect path, callback thread, watchdog) pushes into
//! one unbounded channel; the UI drains it on its own thread, so nothing
//! here ever blocks the sender.

use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::frame::Region;
use crate::state::ConnectionState;

/// Something the surrounding UI should react to.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// The lifecycle moved to `state`. Failures carry a reason.
    StateChanged {
        state: ConnectionState,
        message: Option<String>,
    },
    /// Informational text for the user (first frame, send failures...).
    Diagnostic(String),
    /// The remote desktop changed size.
    FrameResized { width: u32, height: u32 },
    /// Fresh pixels are available for `region`.
    Redraw { region: Region },
}

/// Receiving half, owned by the UI.
pub type EventReceiver = mpsc::UnboundedReceiver<SessionEvent>;

/// Cloneable sending half used inside the engine.
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: mpsc::UnboundedSender<SessionEvent>,
}

impl EventSink {
    pub fn channel() -> (Self, EventReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn state(&self, state: ConnectionState, message: Option<String>) {
        match &message {
            Some(m) => info!(%state, reason = %m, "session state changed"),
            None => info!(%state, "session state changed"),
        }
        self.emit(SessionEvent::StateChanged { state, message });
    }

    pub fn diagnostic(&self, message: impl Into<String>) {
        let message = message.into();
        info!(diagnostic = %message);
        self.emit(SessionEvent::Diagnostic(message));
    }

    pub fn resized(&self, width: u32, height: u32) {
        self.emit(SessionEvent::FrameResized { width, height });
    }

    pub fn redraw(&self, region: Region) {
        self.emit(SessionEvent::Redraw { region });
    }

    fn emit(&self, event: SessionEvent) {
        // The UI may have gone away during shutdown.
        if self.tx.send(event).is_err() {
            warn!("session event dropped: receiver closed");
        }
    }
}
