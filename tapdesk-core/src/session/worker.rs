//! The dedicated thread that hosts the engine's blocking connect loop.

use std::io;
use std::sync::Arc;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread::{self, JoinHandle, ThreadId};
use std::time::Duration;

use tracing::{debug, warn};

use crate::engine::{NativeHandle, RemoteProtocolEngine};

/// Owner of a running `connect_blocking` call.
///
/// The thread cannot be interrupted; it ends when the engine returns,
/// which `disconnect` asks it to do. A worker that does not finish within
/// the join timeout is disowned rather than waited on forever.
pub(crate) struct ConnectWorker {
    handle: NativeHandle,
    thread: JoinHandle<()>,
    done: mpsc::Receiver<()>,
}

impl ConnectWorker {
    /// Start `connect_blocking(handle)` on a new thread. `on_exit` runs on
    /// that thread with the engine's return value.
    pub(crate) fn spawn<E, F>(engine: Arc<E>, handle: NativeHandle, on_exit: F) -> io::Result<Self>
    where
        E: RemoteProtocolEngine,
        F: FnOnce(bool) + Send + 'static,
    {
        let (done_tx, done) = mpsc::channel();
        let thread = thread::Builder::new()
            .name(format!("tapdesk-connect-{handle}"))
            .spawn(move || {
                debug!(%handle, "connect worker started");
                let ok = engine.connect_blocking(handle);
                debug!(%handle, ok, "connect worker returned");
                on_exit(ok);
                let _ = done_tx.send(());
            })?;
        Ok(Self {
            handle,
            thread,
            done,
        })
    }

    pub(crate) fn thread_id(&self) -> ThreadId {
        self.thread.thread().id()
    }

    /// Wait up to `timeout` for the thread to finish. Returns `false` when
    /// it was still running and has been disowned.
    pub(crate) fn join_bounded(self, timeout: Duration) -> bool {
        if thread::current().id() == self.thread_id() {
            // Teardown reached from the worker's own exit path.
            return false;
        }
        match self.done.recv_timeout(timeout) {
            // Disconnected means the thread unwound without signalling.
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                if self.thread.join().is_err() {
                    warn!(handle = %self.handle, "connect worker panicked");
                }
                true
            }
            Err(RecvTimeoutError::Timeout) => {
                warn!(
                    handle = %self.handle,
                    ?timeout,
                    "connect worker still running after join timeout; disowning it"
                );
                false
            }
        }
    }
}
