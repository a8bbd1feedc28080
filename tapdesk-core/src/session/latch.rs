//! One-shot connect completion.
//!
//! Several paths race to decide how a connect attempt ends: the engine's
//! success or failure callback, the worker returning early, the timeout,
//! and a user cancel. Each calls [`ConnectLatch::resolve`]; the first one
//! wins and the rest become no-ops.

use parking_lot::Mutex;
use tokio::sync::oneshot;

/// How a connect attempt ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectOutcome {
    Connected,
    Failed(String),
    TimedOut,
    Cancelled,
}

impl ConnectOutcome {
    /// Reason published with `Failed`, or `None` for success.
    pub fn failure_reason(&self) -> Option<String> {
        match self {
            ConnectOutcome::Connected => None,
            ConnectOutcome::Failed(reason) => Some(reason.clone()),
            ConnectOutcome::TimedOut => Some(crate::error::CONNECT_TIMEOUT_REASON.into()),
            ConnectOutcome::Cancelled => Some(CANCELLED_REASON.into()),
        }
    }
}

/// Failure reason for an attempt cancelled by `disconnect`.
pub const CANCELLED_REASON: &str = "connect cancelled";

pub(crate) struct ConnectLatch {
    tx: Mutex<Option<oneshot::Sender<ConnectOutcome>>>,
}

impl ConnectLatch {
    pub(crate) fn new() -> (Self, oneshot::Receiver<ConnectOutcome>) {
        let (tx, rx) = oneshot::channel();
        (
            Self {
                tx: Mutex::new(Some(tx)),
            },
            rx,
        )
    }

    /// Deliver `outcome` if nothing has been delivered yet. Returns
    /// whether this call was the one that resolved the latch.
    pub(crate) fn resolve(&self, outcome: ConnectOutcome) -> bool {
        let Some(tx) = self.tx.lock().take() else {
            return false;
        };
        // The waiter may have gone away; the latch still counts as resolved.
        let _ = tx.send(outcome);
        true
    }

    pub(crate) fn is_resolved(&self) -> bool {
        self.tx.lock().is_none()
    }
}
