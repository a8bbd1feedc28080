//! Integration tests: connection lifecycle, teardown ordering, graphics
//! callbacks and input dispatch against a scripted in-process engine.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

use tapdesk_core::{
    ConnectRequest, ConnectionState, EngineEvents, EventReceiver, FrameBuffer, NativeHandle,
    PointerButton, PointerFlags, Region, RemoteInput, RemoteKey, RemotePoint,
    RemoteProtocolEngine, Session, SessionConfig, SessionError, SessionEvent,
};

// ── Fake engine ──────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
enum Call {
    Allocate,
    Configure,
    Register,
    Unregister,
    Disconnect,
    Release,
    Pointer(RemotePoint, u16),
    Key(RemoteKey, bool),
}

/// What `connect_blocking` does.
#[derive(Debug, Clone)]
enum Script {
    /// Report success, then run until disconnected.
    Succeed,
    /// Report nothing, run until disconnected.
    Hang,
    /// Report nothing and ignore disconnect for a while.
    Stubborn(Duration),
    /// Report failure with the given reason and return.
    Refuse(Option<String>),
    /// Return `false` without any callback.
    ReturnFalse,
}

struct FakeEngine {
    script: Script,
    allocate_ok: bool,
    configure_ok: bool,
    allocate_delay: Duration,
    fail_sends: AtomicBool,
    last_error: Mutex<Option<String>>,
    calls: Mutex<Vec<Call>>,
    sink: Mutex<Option<Arc<dyn EngineEvents>>>,
    stopped: (Mutex<bool>, Condvar),
}

impl FakeEngine {
    fn new(script: Script) -> Self {
        Self {
            script,
            allocate_ok: true,
            configure_ok: true,
            allocate_delay: Duration::ZERO,
            fail_sends: AtomicBool::new(false),
            last_error: Mutex::new(None),
            calls: Mutex::new(Vec::new()),
            sink: Mutex::new(None),
            stopped: (Mutex::new(false), Condvar::new()),
        }
    }

    fn with_allocate_delay(mut self, delay: Duration) -> Self {
        self.allocate_delay = delay;
        self
    }

    fn with_last_error(self, error: &str) -> Self {
        *self.last_error.lock().unwrap() = Some(error.to_owned());
        self
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn count(&self, call: &Call) -> usize {
        self.calls().iter().filter(|c| *c == call).count()
    }

    /// Lifecycle calls only, in order.
    fn lifecycle_calls(&self) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|c| !matches!(c, Call::Pointer(..) | Call::Key(..)))
            .collect()
    }

    fn sink(&self) -> Option<Arc<dyn EngineEvents>> {
        self.sink.lock().unwrap().clone()
    }

    fn wait_for_stop(&self) {
        let (lock, cvar) = &self.stopped;
        let mut stopped = lock.lock().unwrap();
        let deadline = Instant::now() + Duration::from_secs(10);
        while !*stopped && Instant::now() < deadline {
            stopped = cvar
                .wait_timeout(stopped, Duration::from_millis(50))
                .unwrap()
                .0;
        }
    }
}

impl RemoteProtocolEngine for FakeEngine {
    fn allocate(&self) -> Option<NativeHandle> {
        self.record(Call::Allocate);
        if !self.allocate_delay.is_zero() {
            std::thread::sleep(self.allocate_delay);
        }
        if self.allocate_ok {
            NativeHandle::new(0x51)
        } else {
            None
        }
    }

    fn configure(&self, _: NativeHandle, request: &ConnectRequest) -> bool {
        self.record(Call::Configure);
        assert!(!request.host.is_empty());
        *self.stopped.0.lock().unwrap() = false;
        self.configure_ok
    }

    fn connect_blocking(&self, _: NativeHandle) -> bool {
        match &self.script {
            Script::Succeed => {
                if let Some(sink) = self.sink() {
                    sink.on_connect_success();
                }
                self.wait_for_stop();
                true
            }
            Script::Hang => {
                self.wait_for_stop();
                false
            }
            Script::Stubborn(for_) => {
                std::thread::sleep(*for_);
                false
            }
            Script::Refuse(reason) => {
                if let Some(sink) = self.sink() {
                    sink.on_connect_failure(reason.clone());
                }
                false
            }
            Script::ReturnFalse => false,
        }
    }

    fn disconnect(&self, _: NativeHandle) {
        self.record(Call::Disconnect);
        let (lock, cvar) = &self.stopped;
        *lock.lock().unwrap() = true;
        cvar.notify_all();
    }

    fn release(&self, _: NativeHandle) {
        self.record(Call::Release);
    }

    fn register(&self, _: NativeHandle, events: Arc<dyn EngineEvents>) {
        self.record(Call::Register);
        *self.sink.lock().unwrap() = Some(events);
    }

    fn unregister(&self, _: NativeHandle) {
        self.record(Call::Unregister);
        self.sink.lock().unwrap().take();
    }

    fn update_graphics(&self, _: NativeHandle, target: &mut FrameBuffer, region: Region) -> bool {
        target.fill(region, &[0xAB; 4]);
        true
    }

    fn send_pointer(&self, _: NativeHandle, at: RemotePoint, flags: PointerFlags) -> bool {
        self.record(Call::Pointer(at, flags.bits()));
        !self.fail_sends.load(Ordering::SeqCst)
    }

    fn send_key(&self, _: NativeHandle, key: RemoteKey, down: bool) -> bool {
        self.record(Call::Key(key, down));
        !self.fail_sends.load(Ordering::SeqCst)
    }

    fn last_error(&self, _: NativeHandle) -> Option<String> {
        self.last_error.lock().unwrap().clone()
    }
}

// ── Helpers ──────────────────────────────────────────────────────

fn request() -> ConnectRequest {
    ConnectRequest {
        host: "10.0.0.5".into(),
        port: 3389,
        domain: None,
        username: "alice".into(),
        password: "secret".into(),
        width: 800,
        height: 600,
    }
}

fn quick_config() -> SessionConfig {
    SessionConfig {
        connect_timeout: Duration::from_secs(5),
        join_timeout: Duration::from_secs(1),
        first_frame_grace: Duration::from_secs(60),
    }
}

fn start(engine: FakeEngine, config: SessionConfig) -> (Arc<FakeEngine>, Session<FakeEngine>, EventReceiver) {
    let engine = Arc::new(engine);
    let (session, rx) = Session::new(engine.clone(), config);
    (engine, session, rx)
}

fn drain(rx: &mut EventReceiver) -> Vec<SessionEvent> {
    let mut out = Vec::new();
    while let Ok(ev) = rx.try_recv() {
        out.push(ev);
    }
    out
}

fn states(events: &[SessionEvent]) -> Vec<(ConnectionState, Option<String>)> {
    events
        .iter()
        .filter_map(|ev| match ev {
            SessionEvent::StateChanged { state, message } => Some((*state, message.clone())),
            _ => None,
        })
        .collect()
}

fn diagnostics(events: &[SessionEvent]) -> Vec<String> {
    events
        .iter()
        .filter_map(|ev| match ev {
            SessionEvent::Diagnostic(msg) => Some(msg.clone()),
            _ => None,
        })
        .collect()
}

async fn wait_until(what: &str, cond: impl Fn() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !cond() {
        assert!(Instant::now() < deadline, "timed out waiting for {what}");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

use ConnectionState::{Connected, Connecting, Failed, Idle};

// ── Connect outcomes ─────────────────────────────────────────────

#[tokio::test]
async fn test_connect_success_sequence() {
    let (engine, session, mut rx) = start(FakeEngine::new(Script::Succeed), quick_config());

    session.connect(request()).await.unwrap();

    assert_eq!(session.state(), Connected);
    assert!(session.handle().is_some());
    assert_eq!(
        states(&drain(&mut rx)),
        vec![(Idle, None), (Connecting, None), (Connected, None)]
    );
    // Initial frame sized from the request until the engine resizes.
    assert_eq!(session.frames().frame_size(), Some((800, 600)));
    assert_eq!(engine.count(&Call::Allocate), 1);
}

#[tokio::test]
async fn test_connect_timeout_fails_and_releases() {
    let config = SessionConfig {
        connect_timeout: Duration::from_millis(100),
        ..quick_config()
    };
    let (engine, session, mut rx) = start(FakeEngine::new(Script::Hang), config);

    let err = session.connect(request()).await.unwrap_err();
    assert!(matches!(&err, SessionError::ConnectFailure(r) if r == "connect timeout"));

    assert_eq!(
        states(&drain(&mut rx)),
        vec![
            (Idle, None),
            (Connecting, None),
            (Failed, Some("connect timeout".into()))
        ]
    );
    assert_eq!(session.state(), Failed);
    assert!(session.handle().is_none());
    assert_eq!(engine.count(&Call::Release), 1);
}

#[tokio::test]
async fn test_late_success_after_timeout_is_ignored() {
    let config = SessionConfig {
        connect_timeout: Duration::from_millis(50),
        ..quick_config()
    };
    let (engine, session, mut rx) = start(FakeEngine::new(Script::Hang), config);
    // Capture the sink before teardown unregisters it.
    let connecting = session.connect(request());
    tokio::pin!(connecting);
    let sink = loop {
        tokio::select! {
            res = &mut connecting => panic!("connect finished early: {res:?}"),
            _ = tokio::time::sleep(Duration::from_millis(5)) => {
                if let Some(sink) = engine.sink() {
                    break sink;
                }
            }
        }
    };
    assert!(connecting.await.is_err());

    sink.on_connect_success();
    assert_eq!(session.state(), Failed);
    let seen = states(&drain(&mut rx));
    assert!(!seen.iter().any(|(s, _)| *s == Connected));
}

#[tokio::test]
async fn test_stubborn_worker_is_disowned() {
    let config = SessionConfig {
        connect_timeout: Duration::from_millis(50),
        join_timeout: Duration::from_millis(50),
        ..quick_config()
    };
    let (engine, session, _rx) =
        start(FakeEngine::new(Script::Stubborn(Duration::from_secs(2))), config);

    let started = Instant::now();
    assert!(session.connect(request()).await.is_err());
    assert!(started.elapsed() < Duration::from_secs(1));
    assert_eq!(engine.count(&Call::Release), 1);
}

#[tokio::test]
async fn test_failure_callback_reason() {
    let (_, session, mut rx) = start(
        FakeEngine::new(Script::Refuse(Some("authentication failed".into()))),
        quick_config(),
    );
    let err = session.connect(request()).await.unwrap_err();
    assert_eq!(err.to_string(), "connect failed: authentication failed");
    assert_eq!(
        states(&drain(&mut rx)).last().cloned(),
        Some((Failed, Some("authentication failed".into())))
    );
}

#[tokio::test]
async fn test_failure_reason_falls_back_to_engine_error() {
    let engine = FakeEngine::new(Script::Refuse(None)).with_last_error("ERRCONNECT_CONNECT_TRANSPORT_FAILED");
    let (_, session, mut rx) = start(engine, quick_config());
    session.connect(request()).await.unwrap_err();
    assert_eq!(
        states(&drain(&mut rx)).last().cloned(),
        Some((Failed, Some("ERRCONNECT_CONNECT_TRANSPORT_FAILED".into())))
    );

    let (_, session, mut rx) = start(FakeEngine::new(Script::Refuse(None)), quick_config());
    session.connect(request()).await.unwrap_err();
    assert_eq!(
        states(&drain(&mut rx)).last().cloned(),
        Some((Failed, Some("connection failed".into())))
    );
}

#[tokio::test]
async fn test_worker_returning_false_fails_attempt() {
    let (engine, session, mut rx) = start(FakeEngine::new(Script::ReturnFalse), quick_config());
    session.connect(request()).await.unwrap_err();
    assert_eq!(
        states(&drain(&mut rx)).last().cloned(),
        Some((Failed, Some("connect returned false".into())))
    );
    assert_eq!(engine.count(&Call::Release), 1);
}

#[tokio::test]
async fn test_allocation_failure() {
    let mut engine = FakeEngine::new(Script::Succeed);
    engine.allocate_ok = false;
    let (engine, session, mut rx) = start(engine, quick_config());

    let err = session.connect(request()).await.unwrap_err();
    assert!(matches!(err, SessionError::AllocationFailure));
    assert_eq!(
        states(&drain(&mut rx)),
        vec![
            (Idle, None),
            (Connecting, None),
            (Failed, Some("instance allocation failed".into()))
        ]
    );
    assert_eq!(engine.count(&Call::Release), 0);
    assert!(session.handle().is_none());
}

#[tokio::test]
async fn test_configuration_rejected_releases_instance() {
    let mut engine = FakeEngine::new(Script::Succeed);
    engine.configure_ok = false;
    let (engine, session, _rx) = start(engine, quick_config());

    let err = session.connect(request()).await.unwrap_err();
    assert!(matches!(&err, SessionError::ConfigurationFailure(r) if r == "configuration rejected"));
    assert_eq!(
        engine.lifecycle_calls(),
        vec![Call::Allocate, Call::Configure, Call::Release]
    );
    assert_eq!(session.state(), Failed);
}

// ── Lifecycle misuse & teardown ──────────────────────────────────

#[tokio::test]
async fn test_double_connect_rejected_then_cancel() {
    let (engine, session, mut rx) = start(FakeEngine::new(Script::Hang), quick_config());
    let session = Arc::new(session);

    let first = tokio::spawn({
        let session = session.clone();
        async move { session.connect(request()).await }
    });
    wait_until("connecting", || engine.sink().is_some()).await;
    assert_eq!(session.state(), Connecting);

    let err = session.connect(request()).await.unwrap_err();
    assert!(matches!(err, SessionError::AlreadyActive(Connecting)));
    assert_eq!(engine.count(&Call::Allocate), 1);

    session.disconnect().await;
    let first = first.await.unwrap();
    assert!(matches!(&first, Err(SessionError::ConnectFailure(r)) if r == "connect cancelled"));

    assert_eq!(session.state(), Idle);
    assert!(session.handle().is_none());
    assert_eq!(engine.count(&Call::Release), 1);
    assert_eq!(
        states(&drain(&mut rx)),
        vec![
            (Idle, None),
            (Connecting, None),
            (Failed, Some("connect cancelled".into())),
            (Idle, None)
        ]
    );
}

#[tokio::test]
async fn test_disconnect_release_order() {
    let (engine, session, mut rx) = start(FakeEngine::new(Script::Succeed), quick_config());
    session.connect(request()).await.unwrap();
    session.disconnect().await;

    assert_eq!(
        engine.lifecycle_calls(),
        vec![
            Call::Allocate,
            Call::Configure,
            Call::Register,
            Call::Unregister,
            Call::Disconnect,
            Call::Release,
        ]
    );
    assert_eq!(session.state(), Idle);
    assert!(session.handle().is_none());
    assert!(session.frames().latest().is_none());
    assert_eq!(states(&drain(&mut rx)).last().cloned(), Some((Idle, None)));

    // A second disconnect is a no-op.
    session.disconnect().await;
    assert_eq!(engine.count(&Call::Release), 1);
    assert!(states(&drain(&mut rx)).is_empty());
}

#[tokio::test]
async fn test_failed_session_requires_reset() {
    let (_, session, _rx) = start(FakeEngine::new(Script::ReturnFalse), quick_config());
    session.connect(request()).await.unwrap_err();

    let err = session.connect(request()).await.unwrap_err();
    assert!(matches!(err, SessionError::AlreadyActive(Failed)));

    session.disconnect().await;
    assert_eq!(session.state(), Idle);
}

#[tokio::test]
async fn test_connection_lost_mid_session() {
    let (engine, session, mut rx) = start(FakeEngine::new(Script::Succeed), quick_config());
    session.connect(request()).await.unwrap();
    drain(&mut rx);

    engine.sink().unwrap().on_disconnected();
    assert_eq!(session.state(), Failed);
    assert!(session.handle().is_none());
    assert_eq!(
        states(&drain(&mut rx)),
        vec![(Failed, Some("connection lost".into()))]
    );

    wait_until("loss teardown", || engine.count(&Call::Release) == 1).await;

    session.disconnect().await;
    assert_eq!(session.state(), Idle);
    assert_eq!(engine.count(&Call::Release), 1);
}

#[tokio::test]
async fn test_reconnect_discards_frame() {
    let (engine, session, mut rx) = start(FakeEngine::new(Script::Succeed), quick_config());
    session.connect(request()).await.unwrap();
    let sink = engine.sink().unwrap();
    sink.on_graphics_resize(1024, 768, 32);
    assert_eq!(session.frames().frame_size(), Some((1024, 768)));

    session.reconnect(None).await.unwrap();
    assert_eq!(session.state(), Connected);
    assert_eq!(session.frames().frame_size(), Some((800, 600)));
    assert_eq!(engine.count(&Call::Allocate), 2);
    assert_eq!(engine.count(&Call::Release), 1);
    assert_eq!(
        states(&drain(&mut rx)),
        vec![
            (Idle, None),
            (Connecting, None),
            (Connected, None),
            (Idle, None),
            (Connecting, None),
            (Connected, None)
        ]
    );

    // Callbacks registered for the first attempt are now stale.
    sink.on_graphics_resize(10, 10, 16);
    assert_eq!(session.frames().frame_size(), Some((800, 600)));
}

// ── Graphics ─────────────────────────────────────────────────────

#[tokio::test]
async fn test_graphics_callbacks_publish_frames() {
    let (engine, session, mut rx) = start(FakeEngine::new(Script::Succeed), quick_config());
    session.connect(request()).await.unwrap();
    let sink = engine.sink().unwrap();

    sink.on_graphics_resize(400, 300, 32);
    sink.on_graphics_update(10, 10, 5, 5);

    let frame = session.frames().latest().unwrap();
    assert_eq!((frame.width(), frame.height()), (400, 300));
    assert_eq!(frame.pixel(12, 12), &[0xAB; 4]);
    assert_eq!(frame.pixel(0, 0), &[0; 4]);
    assert_eq!(session.frames().frame_count(), 1);

    let events = drain(&mut rx);
    assert!(events.contains(&SessionEvent::FrameResized {
        width: 400,
        height: 300
    }));
    assert!(
        diagnostics(&events)
            .iter()
            .any(|d| d.starts_with("first frame received after"))
    );
}

#[tokio::test]
async fn test_first_frame_timeout_diagnostic() {
    let config = SessionConfig {
        first_frame_grace: Duration::from_millis(30),
        ..quick_config()
    };
    let (_engine, session, mut rx) = start(FakeEngine::new(Script::Succeed).with_last_error("none yet"), config);
    session.connect(request()).await.unwrap();

    tokio::time::sleep(Duration::from_millis(150)).await;
    let diags = diagnostics(&drain(&mut rx));
    assert!(diags.iter().any(|d| d == "connected, waiting for first frame"));
    let report = diags
        .iter()
        .find(|d| d.starts_with("first frame timeout"))
        .expect("missing first frame timeout diagnostic");
    assert!(report.contains("frame_count=0"));
    assert!(report.contains("last_error=none yet"));
}

// ── Input ────────────────────────────────────────────────────────

#[tokio::test]
async fn test_input_requires_connection() {
    let (engine, session, _rx) = start(FakeEngine::new(Script::Succeed), quick_config());
    let err = session
        .send_pointer(RemotePoint::new(1, 1), PointerFlags::MOVE)
        .unwrap_err();
    assert!(matches!(err, SessionError::NotConnected));
    assert!(!session.send_text("x"));
    assert!(engine.calls().is_empty());
}

#[tokio::test]
async fn test_input_rejected_while_connecting() {
    let (engine, session, _rx) = start(FakeEngine::new(Script::Hang), quick_config());
    let session = Arc::new(session);
    let connecting = tokio::spawn({
        let session = session.clone();
        async move { session.connect(request()).await }
    });
    wait_until("connecting", || engine.sink().is_some()).await;
    assert_eq!(session.state(), Connecting);
    assert!(session.handle().is_some());

    let err = session
        .send_pointer(RemotePoint::new(1, 1), PointerFlags::MOVE)
        .unwrap_err();
    assert!(matches!(err, SessionError::NotConnected));
    assert!(matches!(
        session.send_key(RemoteKey::Virtual(0x41), true),
        Err(SessionError::NotConnected)
    ));
    assert_eq!(session.dispatch(&[RemoteInput::Move(RemotePoint::new(2, 2))]), 1);
    assert!(
        !engine
            .calls()
            .iter()
            .any(|c| matches!(c, Call::Pointer(..) | Call::Key(..)))
    );

    session.disconnect().await;
    assert!(connecting.await.unwrap().is_err());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_cancel_during_allocation_never_publishes_handle() {
    let engine = FakeEngine::new(Script::Succeed).with_allocate_delay(Duration::from_millis(200));
    let (engine, session, mut rx) = start(engine, quick_config());
    let session = Arc::new(session);
    let connecting = tokio::spawn({
        let session = session.clone();
        async move { session.connect(request()).await }
    });
    wait_until("allocation", || engine.count(&Call::Allocate) == 1).await;

    let disconnecting = tokio::spawn({
        let session = session.clone();
        async move { session.disconnect().await }
    });
    wait_until("cancel", || session.state() != Connecting).await;
    // Failed while allocation is still running: no handle may appear.
    while !connecting.is_finished() {
        if session.state() == Failed {
            assert!(session.handle().is_none());
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    let result = connecting.await.unwrap();
    assert!(matches!(&result, Err(SessionError::ConnectFailure(r)) if r == "connect cancelled"));
    disconnecting.await.unwrap();

    assert_eq!(session.state(), Idle);
    assert!(session.handle().is_none());
    assert_eq!(engine.lifecycle_calls(), vec![Call::Allocate, Call::Release]);
    assert_eq!(
        states(&drain(&mut rx)),
        vec![
            (Idle, None),
            (Connecting, None),
            (Failed, Some("connect cancelled".into())),
            (Idle, None)
        ]
    );
}

#[tokio::test]
async fn test_dispatch_encodes_pointer_commands() {
    let (engine, session, _rx) = start(FakeEngine::new(Script::Succeed), quick_config());
    session.connect(request()).await.unwrap();

    let p = RemotePoint::new(50, 50);
    let failed = session.dispatch(&[
        RemoteInput::Move(p),
        RemoteInput::Click(p, PointerButton::Left),
    ]);
    assert_eq!(failed, 0);

    let pointer: Vec<_> = engine
        .calls()
        .into_iter()
        .filter(|c| matches!(c, Call::Pointer(..)))
        .collect();
    assert_eq!(
        pointer,
        vec![
            Call::Pointer(p, 0x0800),
            Call::Pointer(p, 0x9000),
            Call::Pointer(p, 0x1000)
        ]
    );
}

#[tokio::test]
async fn test_send_failures_are_non_fatal() {
    let (engine, session, mut rx) = start(FakeEngine::new(Script::Succeed), quick_config());
    session.connect(request()).await.unwrap();
    engine.fail_sends.store(true, Ordering::SeqCst);

    let err = session
        .send_pointer(RemotePoint::new(0, 0), PointerFlags::MOVE)
        .unwrap_err();
    assert!(matches!(err, SessionError::InputSendFailure("pointer")));
    assert_eq!(session.dispatch(&vec![RemoteInput::Move(RemotePoint::new(1, 1)); 3]), 3);

    assert_eq!(session.state(), Connected);
    assert!(
        diagnostics(&drain(&mut rx))
            .iter()
            .any(|d| d == "pointer event send failed")
    );
}

#[tokio::test]
async fn test_send_text_as_unicode_pairs() {
    let (engine, session, _rx) = start(FakeEngine::new(Script::Succeed), quick_config());
    session.connect(request()).await.unwrap();

    assert!(session.send_text("hi"));
    let keys: Vec<_> = engine
        .calls()
        .into_iter()
        .filter(|c| matches!(c, Call::Key(..)))
        .collect();
    let h = RemoteKey::Unicode('h' as u16);
    let i = RemoteKey::Unicode('i' as u16);
    assert_eq!(
        keys,
        vec![
            Call::Key(h, true),
            Call::Key(h, false),
            Call::Key(i, true),
            Call::Key(i, false)
        ]
    );

    engine.fail_sends.store(true, Ordering::SeqCst);
    assert!(!session.send_text("hi"));
    assert!(!session.send_text(""));
}
