//! Engine callback sink.
//!
//! Each connect attempt registers its own [`SessionSink`]. The sink holds
//! a weak reference to the session plus the attempt's generation, so a
//! callback that arrives after teardown (or for an older attempt) finds
//! nothing to act on and returns.

use std::sync::{Arc, Weak};

use tokio::runtime::Handle as RuntimeHandle;
use tracing::{debug, trace};

use crate::engine::{EngineEvents, NativeHandle, RemoteProtocolEngine};
use crate::frame::Region;
use crate::session::Shared;
use crate::session::latch::ConnectOutcome;
use crate::state::ConnectionState;

/// Reason used when the engine reports failure without any detail.
pub const CONNECTION_FAILED_REASON: &str = "connection failed";
/// Reason used when the connect loop returns `false` before any callback.
pub const CONNECT_RETURNED_FALSE_REASON: &str = "connect returned false";
/// Reason used when the connect loop ends cleanly before any callback.
pub const CONNECT_LOOP_ENDED_REASON: &str = "connect loop ended before completion";
/// Reason used when the engine disconnects while the handshake is running.
pub const DISCONNECTED_DURING_CONNECT_REASON: &str = "disconnected during connect";

pub(crate) struct SessionSink<E: RemoteProtocolEngine> {
    shared: Weak<Shared<E>>,
    generation: u64,
    handle: NativeHandle,
    runtime: RuntimeHandle,
}

impl<E: RemoteProtocolEngine> SessionSink<E> {
    pub(crate) fn new(
        shared: Weak<Shared<E>>,
        generation: u64,
        handle: NativeHandle,
        runtime: RuntimeHandle,
    ) -> Self {
        Self {
            shared,
            generation,
            handle,
            runtime,
        }
    }

    /// The session, if it still exists and is still on this attempt.
    fn live(&self) -> Option<Arc<Shared<E>>> {
        let shared = self.shared.upgrade()?;
        shared.state_of(self.generation).map(|_| shared)
    }

    /// Called on the worker thread once `connect_blocking` returns.
    pub(crate) fn on_worker_exit(&self, ok: bool) {
        let Some(shared) = self.shared.upgrade() else {
            return;
        };
        match shared.state_of(self.generation) {
            Some(ConnectionState::Connecting) => {
                let fallback = if ok {
                    CONNECT_LOOP_ENDED_REASON
                } else {
                    CONNECT_RETURNED_FALSE_REASON
                };
                let reason = non_blank(shared.engine().last_error(self.handle))
                    .unwrap_or_else(|| fallback.to_owned());
                shared.settle(self.generation, ConnectOutcome::Failed(reason));
            }
            Some(ConnectionState::Connected) => {
                shared.connection_lost(self.generation, &self.runtime);
            }
            _ => {}
        }
    }
}

impl<E: RemoteProtocolEngine> EngineEvents for SessionSink<E> {
    fn on_connect_success(&self) {
        if let Some(shared) = self.shared.upgrade() {
            shared.settle(self.generation, ConnectOutcome::Connected);
        }
    }

    fn on_connect_failure(&self, reason: Option<String>) {
        let Some(shared) = self.shared.upgrade() else {
            return;
        };
        let reason = non_blank(reason)
            .or_else(|| non_blank(shared.engine().last_error(self.handle)))
            .unwrap_or_else(|| CONNECTION_FAILED_REASON.to_owned());
        shared.settle(self.generation, ConnectOutcome::Failed(reason));
    }

    fn on_disconnected(&self) {
        let Some(shared) = self.shared.upgrade() else {
            return;
        };
        match shared.state_of(self.generation) {
            Some(ConnectionState::Connecting) => {
                shared.settle(
                    self.generation,
                    ConnectOutcome::Failed(DISCONNECTED_DURING_CONNECT_REASON.to_owned()),
                );
            }
            Some(ConnectionState::Connected) => {
                shared.connection_lost(self.generation, &self.runtime);
            }
            _ => debug!(handle = %self.handle, "disconnect callback ignored"),
        }
    }

    fn on_graphics_resize(&self, width: u32, height: u32, color_depth: u32) {
        if let Some(shared) = self.live() {
            shared.frames().resize(width, height, color_depth);
        }
    }

    fn on_graphics_update(&self, x: u32, y: u32, width: u32, height: u32) {
        let Some(shared) = self.live() else {
            return;
        };
        // Hold the handle for the whole write so teardown cannot release
        // the instance underneath it.
        let current = shared.handle_lock().read();
        if *current != Some(self.handle) {
            trace!(handle = %self.handle, "graphics update after teardown ignored");
            return;
        }
        let engine = shared.engine();
        let region = Region::new(x, y, width, height);
        if let Err(e) = shared
            .frames()
            .apply_region_update(region, |fb, r| engine.update_graphics(self.handle, fb, r))
        {
            debug!(error = %e, "region update skipped");
        }
    }
}

fn non_blank(s: Option<String>) -> Option<String> {
    s.filter(|s| !s.trim().is_empty())
}
