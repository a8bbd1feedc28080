//! The remote session: connection lifecycle and input dispatch.
//!
//! A [`Session`] drives one [`RemoteProtocolEngine`] instance at a time
//! through `Idle → Connecting → Connected`, falling to `Failed` on error,
//! and back to `Idle` on disconnect. Three contexts meet here:
//!
//! - the **caller** (UI) awaits `connect` / `disconnect`, which never block
//!   a runtime thread; engine teardown runs on the blocking pool;
//! - the **worker** thread hosts the engine's blocking connect loop;
//! - engine **callbacks** arrive on arbitrary threads through a
//!   per-attempt [`SessionSink`](sink::SessionSink).
//!
//! The outcome of an attempt is decided exactly once, by whichever of
//! success callback, failure callback, early worker exit, timeout or
//! user cancel gets there first. State transitions happen under one lock
//! together with that decision, so observers never see two outcomes.

mod latch;
mod sink;
mod worker;

pub use latch::{CANCELLED_REASON, ConnectOutcome};
pub use sink::{
    CONNECT_LOOP_ENDED_REASON, CONNECT_RETURNED_FALSE_REASON, CONNECTION_FAILED_REASON,
    DISCONNECTED_DURING_CONNECT_REASON,
};

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use tokio::runtime::Handle as RuntimeHandle;
use tokio::sync::Mutex as AsyncMutex;
use tokio::time;
use tracing::{debug, error, info, warn};

use crate::engine::{ConnectRequest, NativeHandle, RemoteProtocolEngine};
use crate::error::{ALLOCATION_FAILED_REASON, SessionError};
use crate::events::{EventReceiver, EventSink};
use crate::flags::PointerFlags;
use crate::frame::FrameSync;
use crate::geometry::RemotePoint;
use crate::input::{RemoteInput, RemoteKey, Viewport};
use crate::state::ConnectionState;

use latch::ConnectLatch;
use sink::SessionSink;
use worker::ConnectWorker;

/// Default time allowed for the handshake.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
/// Default wait for the worker thread during teardown.
pub const DEFAULT_JOIN_TIMEOUT: Duration = Duration::from_secs(1);
/// Default delay before reporting a missing first frame.
pub const DEFAULT_FIRST_FRAME_GRACE: Duration = Duration::from_millis(3500);

/// Reason published when an established connection drops.
pub const CONNECTION_LOST_REASON: &str = "connection lost";
/// Reason used when the engine rejects the connection parameters.
pub const CONFIGURATION_REJECTED_REASON: &str = "configuration rejected";

/// Color depth of the placeholder frame published on connect.
const INITIAL_COLOR_DEPTH: u32 = 32;

// ── SessionConfig ────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    pub connect_timeout: Duration,
    pub join_timeout: Duration,
    pub first_frame_grace: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            join_timeout: DEFAULT_JOIN_TIMEOUT,
            first_frame_grace: DEFAULT_FIRST_FRAME_GRACE,
        }
    }
}

// ── Shared state ─────────────────────────────────────────────────

/// A live native instance and the thread running its connect loop.
struct Attachment {
    handle: NativeHandle,
    worker: Option<ConnectWorker>,
}

impl Attachment {
    /// Unregister, disconnect, bounded join, release. Blocking.
    fn shutdown<E: RemoteProtocolEngine>(self, engine: &E, join_timeout: Duration) {
        let handle = self.handle;
        debug!(%handle, "tearing down native instance");
        engine.unregister(handle);
        engine.disconnect(handle);
        if let Some(worker) = self.worker {
            worker.join_bounded(join_timeout);
        }
        engine.release(handle);
        info!(%handle, "native instance released");
    }
}

struct Core {
    state: ConnectionState,
    /// Bumped on every connect; callbacks carrying an older value are stale.
    generation: u64,
    latch: Option<ConnectLatch>,
    attachment: Option<Attachment>,
    request: Option<ConnectRequest>,
}

pub(crate) struct Shared<E: RemoteProtocolEngine> {
    engine: Arc<E>,
    config: SessionConfig,
    events: EventSink,
    frames: FrameSync,
    /// The handle input and graphics paths use. Cleared before teardown
    /// calls reach the engine.
    handle: RwLock<Option<NativeHandle>>,
    core: Mutex<Core>,
    /// Serialises connect, disconnect and loss teardown.
    lifecycle: AsyncMutex<()>,
    user_disconnect: AtomicBool,
}

impl<E: RemoteProtocolEngine> Shared<E> {
    pub(crate) fn engine(&self) -> &Arc<E> {
        &self.engine
    }

    pub(crate) fn frames(&self) -> &FrameSync {
        &self.frames
    }

    pub(crate) fn handle_lock(&self) -> &RwLock<Option<NativeHandle>> {
        &self.handle
    }

    fn state(&self) -> ConnectionState {
        self.core.lock().state
    }

    fn generation(&self) -> u64 {
        self.core.lock().generation
    }

    /// Current state, if `generation` is still the active attempt.
    pub(crate) fn state_of(&self, generation: u64) -> Option<ConnectionState> {
        let core = self.core.lock();
        (core.generation == generation).then_some(core.state)
    }

    /// Decide the outcome of attempt `generation` and apply the matching
    /// transition. Returns `false` when the attempt was already decided or
    /// is no longer current.
    pub(crate) fn settle(&self, generation: u64, outcome: ConnectOutcome) -> bool {
        let mut core = self.core.lock();
        if core.generation != generation || core.state != ConnectionState::Connecting {
            return false;
        }
        if let Some(latch) = core.latch.as_ref() {
            if !latch.resolve(outcome.clone()) {
                return false;
            }
        }

        let reason = outcome.failure_reason();
        let transition = match reason {
            None => core.state.complete_connect(),
            Some(_) => core.state.fail(),
        };
        if let Err(e) = transition {
            error!(error = %e, "connect outcome could not be applied");
            return false;
        }
        if reason.is_some() {
            self.handle.write().take();
        }
        self.events.state(core.state, reason);
        true
    }

    /// An established connection dropped without the user asking.
    pub(crate) fn connection_lost(self: &Arc<Self>, generation: u64, runtime: &RuntimeHandle) {
        {
            let mut core = self.core.lock();
            if core.generation != generation
                || !core.state.is_connected()
                || self.user_disconnect.load(Ordering::SeqCst)
            {
                return;
            }
            if core.state.fail().is_err() {
                return;
            }
            self.handle.write().take();
            self.events
                .state(core.state, Some(CONNECTION_LOST_REASON.to_owned()));
        }

        let shared = Arc::clone(self);
        runtime.spawn(async move {
            let _guard = shared.lifecycle.lock().await;
            if shared.generation() == generation {
                shared.teardown().await;
            }
        });
    }

    /// Release the current attachment, if any. Caller holds `lifecycle`.
    async fn teardown(&self) {
        let Some(attachment) = self.core.lock().attachment.take() else {
            return;
        };
        self.handle.write().take();

        let engine = Arc::clone(&self.engine);
        let join_timeout = self.config.join_timeout;
        let task = tokio::task::spawn_blocking(move || attachment.shutdown(&*engine, join_timeout));
        if let Err(e) = task.await {
            error!(error = %e, "teardown task failed");
        }
    }
}

impl<E: RemoteProtocolEngine> Drop for Shared<E> {
    fn drop(&mut self) {
        if let Some(attachment) = self.core.get_mut().attachment.take() {
            warn!(handle = %attachment.handle, "session dropped while attached");
            self.handle.get_mut().take();
            attachment.shutdown(&*self.engine, self.config.join_timeout);
        }
    }
}

// ── Session ──────────────────────────────────────────────────────

/// A single remote desktop session.
pub struct Session<E: RemoteProtocolEngine> {
    shared: Arc<Shared<E>>,
}

impl<E: RemoteProtocolEngine> Session<E> {
    /// Create an idle session. The returned receiver yields every
    /// [`SessionEvent`](crate::events::SessionEvent), starting with
    /// `StateChanged(Idle)`.
    pub fn new(engine: Arc<E>, config: SessionConfig) -> (Self, EventReceiver) {
        let (events, rx) = EventSink::channel();
        let shared = Arc::new(Shared {
            engine,
            config,
            frames: FrameSync::new(events.clone()),
            events,
            handle: RwLock::new(None),
            core: Mutex::new(Core {
                state: ConnectionState::Idle,
                generation: 0,
                latch: None,
                attachment: None,
                request: None,
            }),
            lifecycle: AsyncMutex::new(()),
            user_disconnect: AtomicBool::new(false),
        });
        shared.events.state(ConnectionState::Idle, None);
        (Self { shared }, rx)
    }

    pub fn state(&self) -> ConnectionState {
        self.shared.state()
    }

    /// The live native handle. `Some` only while connecting or connected.
    pub fn handle(&self) -> Option<NativeHandle> {
        *self.shared.handle.read()
    }

    pub fn config(&self) -> &SessionConfig {
        &self.shared.config
    }

    /// The frame pipeline, for rendering and diagnostics.
    pub fn frames(&self) -> &FrameSync {
        &self.shared.frames
    }

    /// Mapping snapshot for the input translator.
    pub fn viewport(&self) -> Viewport {
        Viewport::new(self.shared.frames.geometry(), self.shared.frames.frame_size())
    }

    /// Parameters of the most recent connect attempt.
    pub fn request(&self) -> Option<ConnectRequest> {
        self.shared.core.lock().request.clone()
    }

    // ── Lifecycle ────────────────────────────────────────────────

    /// Connect to `request`.
    ///
    /// Resolves once the attempt is decided: `Ok` when connected, `Err`
    /// with the failure (the session is then `Failed` until
    /// [`disconnect`](Self::disconnect) resets it). A second call while an
    /// attempt or session is live is rejected without touching the engine.
    pub async fn connect(&self, request: ConnectRequest) -> Result<(), SessionError> {
        let shared = &self.shared;
        let Ok(_guard) = shared.lifecycle.try_lock() else {
            let state = self.state();
            warn!(%state, "connect rejected: another lifecycle operation is running");
            return Err(SessionError::AlreadyActive(state));
        };

        let (generation, mut rx) = {
            let mut core = shared.core.lock();
            if let Err(e) = core.state.begin_connect() {
                warn!(error = %e, "connect rejected");
                return Err(e);
            }
            core.generation += 1;
            let (latch, rx) = ConnectLatch::new();
            core.latch = Some(latch);
            core.request = Some(request.clone());
            shared.user_disconnect.store(false, Ordering::SeqCst);
            shared.events.state(core.state, None);
            (core.generation, rx)
        };

        info!(
            address = %request.address(),
            width = request.width,
            height = request.height,
            "connecting"
        );
        shared.frames.clear();
        shared.frames.mark_connect_started();

        self.attach(generation, &request)?;

        let outcome = match time::timeout(shared.config.connect_timeout, &mut rx).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(_)) => {
                let outcome = ConnectOutcome::Failed("connect latch closed".into());
                shared.settle(generation, outcome.clone());
                outcome
            }
            Err(_) => {
                shared.settle(generation, ConnectOutcome::TimedOut);
                // Someone may have won the race just before the timeout did.
                rx.try_recv().unwrap_or(ConnectOutcome::TimedOut)
            }
        };

        match outcome {
            ConnectOutcome::Connected => self.on_connected(generation, &request),
            failed => {
                shared.teardown().await;
                let err = match failed {
                    ConnectOutcome::TimedOut => SessionError::timeout(shared.config.connect_timeout),
                    other => SessionError::ConnectFailure(other.failure_reason().unwrap_or_default()),
                };
                warn!(error = %err, "connect attempt ended");
                Err(err)
            }
        }
    }

    /// Allocate, configure and register a native instance, then start the
    /// worker. On error the attempt has already been moved to `Failed`.
    fn attach(&self, generation: u64, request: &ConnectRequest) -> Result<(), SessionError> {
        let shared = &self.shared;
        let engine = &shared.engine;

        let Some(handle) = engine.allocate() else {
            error!("native instance allocation failed");
            shared.settle(
                generation,
                ConnectOutcome::Failed(ALLOCATION_FAILED_REASON.to_owned()),
            );
            return Err(SessionError::AllocationFailure);
        };
        debug!(%handle, "native instance allocated");
        {
            // Publish the handle only while this attempt is still pending;
            // a cancel may have landed during allocation.
            let core = shared.core.lock();
            if core.generation != generation || core.state != ConnectionState::Connecting {
                drop(core);
                info!(%handle, "connect cancelled during allocation");
                engine.release(handle);
                return Err(SessionError::ConnectFailure(CANCELLED_REASON.to_owned()));
            }
            *shared.handle.write() = Some(handle);
        }

        if !engine.configure(handle, request) {
            let reason = engine
                .last_error(handle)
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| CONFIGURATION_REJECTED_REASON.to_owned());
            shared.handle.write().take();
            engine.release(handle);
            shared.settle(generation, ConnectOutcome::Failed(reason.clone()));
            return Err(SessionError::ConfigurationFailure(reason));
        }

        let sink = Arc::new(SessionSink::new(
            Arc::downgrade(shared),
            generation,
            handle,
            RuntimeHandle::current(),
        ));
        engine.register(handle, sink.clone());

        let worker = match ConnectWorker::spawn(Arc::clone(engine), handle, move |ok| {
            sink.on_worker_exit(ok)
        }) {
            Ok(worker) => Some(worker),
            Err(e) => {
                error!(error = %e, "failed to start connect worker");
                shared.settle(
                    generation,
                    ConnectOutcome::Failed(format!("failed to start connect worker: {e}")),
                );
                None
            }
        };
        shared.core.lock().attachment = Some(Attachment { handle, worker });
        Ok(())
    }

    fn on_connected(&self, generation: u64, request: &ConnectRequest) -> Result<(), SessionError> {
        let shared = &self.shared;
        if shared.state_of(generation) != Some(ConnectionState::Connected) {
            return Err(SessionError::ConnectFailure(CONNECTION_LOST_REASON.to_owned()));
        }
        info!(address = %request.address(), "connected");
        shared
            .frames
            .ensure_initial(request.width, request.height, INITIAL_COLOR_DEPTH);
        shared.events.diagnostic("connected, waiting for first frame");
        self.spawn_first_frame_watchdog(generation);
        Ok(())
    }

    fn spawn_first_frame_watchdog(&self, generation: u64) {
        let weak = Arc::downgrade(&self.shared);
        let grace = self.shared.config.first_frame_grace;
        tokio::spawn(async move {
            time::sleep(grace).await;
            let Some(shared) = weak.upgrade() else {
                return;
            };
            if shared.state_of(generation) != Some(ConnectionState::Connected) {
                return;
            }
            let handle = *shared.handle.read();
            let engine_error = handle.and_then(|h| shared.engine.last_error(h));
            if let Some(report) = shared.frames.first_frame_overdue(engine_error) {
                warn!("{report}");
                shared.events.diagnostic(report);
            }
        });
    }

    /// End the session and return to `Idle`.
    ///
    /// A pending connect is cancelled first. From `Failed` this only
    /// resets; from `Idle` it does nothing.
    pub async fn disconnect(&self) {
        let shared = &self.shared;
        shared.user_disconnect.store(true, Ordering::SeqCst);
        if shared.settle(shared.generation(), ConnectOutcome::Cancelled) {
            info!("pending connect cancelled");
        }

        let _guard = shared.lifecycle.lock().await;
        shared.teardown().await;
        shared.frames.clear();

        let mut core = shared.core.lock();
        core.latch = None;
        if core.state == ConnectionState::Connecting {
            // Only reachable when a connect future was dropped mid-attempt.
            let _ = core.state.fail();
        }
        if core.state.finish_disconnect().is_ok() {
            info!("disconnected");
            shared.events.state(core.state, None);
        }
    }

    /// Disconnect, then connect again with `request` or, when `None`, the
    /// previous request. The old frame buffer is discarded.
    pub async fn reconnect(&self, request: Option<ConnectRequest>) -> Result<(), SessionError> {
        let request = request
            .or_else(|| self.request())
            .ok_or(SessionError::InvalidTransition("reconnect without a previous request"))?;
        self.disconnect().await;
        self.connect(request).await
    }

    // ── Input ────────────────────────────────────────────────────

    pub fn send_pointer(&self, at: RemotePoint, flags: PointerFlags) -> Result<(), SessionError> {
        self.with_handle("pointer", |engine, handle| engine.send_pointer(handle, at, flags))
    }

    pub fn send_key(&self, key: RemoteKey, down: bool) -> Result<(), SessionError> {
        self.with_handle("key", |engine, handle| engine.send_key(handle, key, down))
    }

    /// Send `text` one UTF-16 unit at a time as key down + key up.
    ///
    /// Returns `true` if at least one unit went through completely.
    pub fn send_text(&self, text: &str) -> bool {
        let mut any = false;
        for unit in text.encode_utf16() {
            let key = RemoteKey::Unicode(unit);
            let down = self.send_key(key, true).is_ok();
            let up = self.send_key(key, false).is_ok();
            any |= down && up;
        }
        any
    }

    /// Send one translated command.
    pub fn send_input(&self, input: &RemoteInput) -> Result<(), SessionError> {
        match input {
            RemoteInput::Key { key, down } => self.send_key(*key, *down),
            RemoteInput::Text(text) => {
                if self.send_text(text) {
                    Ok(())
                } else {
                    Err(SessionError::InputSendFailure("text"))
                }
            }
            pointer => {
                for (at, flags) in pointer.pointer_commands() {
                    self.send_pointer(at, flags)?;
                }
                Ok(())
            }
        }
    }

    /// Send every input, carrying on past failures. Returns how many
    /// failed.
    pub fn dispatch(&self, inputs: &[RemoteInput]) -> usize {
        inputs
            .iter()
            .filter(|input| match self.send_input(input) {
                Ok(()) => false,
                Err(e) => {
                    debug!(error = %e, ?input, "input dropped");
                    true
                }
            })
            .count()
    }

    /// Run `send` against the live handle. Only a `Connected` session
    /// accepts input.
    fn with_handle<F>(&self, what: &'static str, send: F) -> Result<(), SessionError>
    where
        F: FnOnce(&E, NativeHandle) -> bool,
    {
        if !self.shared.state().is_connected() {
            return Err(SessionError::NotConnected);
        }
        let guard = self.shared.handle.read();
        let Some(handle) = *guard else {
            return Err(SessionError::NotConnected);
        };
        if send(self.shared.engine.as_ref(), handle) {
            return Ok(());
        }
        drop(guard);
        self.shared
            .frames
            .record_error(format!("{what} event send failed"));
        Err(SessionError::InputSendFailure(what))
    }
}
