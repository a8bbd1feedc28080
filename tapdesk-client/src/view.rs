//! The UI-side view of a session.
//!
//! [`SessionView`] lives on the UI thread. It owns the gesture state,
//! renders the latest frame into a [`SoftwareSurface`] and turns host
//! input into remote commands for the session.

use std::sync::Arc;

use tracing::{debug, trace};

use tapdesk_core::input::{GestureConfig, translate_key};
use tapdesk_core::{
    ConnectionState, DisplayScale, EventReceiver, GestureTranslator, KeyInput, PointerEvent,
    RemoteProtocolEngine, RenderGeometry, Session, SessionEvent, TouchEvent,
};

use crate::config::ClientConfig;
use crate::surface::SoftwareSurface;

/// Input reported by the host window.
#[derive(Debug, Clone, PartialEq)]
pub enum HostEvent {
    Touch(TouchEvent),
    Pointer(PointerEvent),
    Key(KeyInput),
    /// The surface changed size.
    Resize { width: u32, height: u32 },
    /// Flip between full and reduced display.
    ToggleScale,
}

/// Which host input is forwarded to the remote desktop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capture {
    pub touch: bool,
    pub keyboard: bool,
}

impl Default for Capture {
    fn default() -> Self {
        Self {
            touch: true,
            keyboard: true,
        }
    }
}

pub struct SessionView<E: RemoteProtocolEngine> {
    session: Arc<Session<E>>,
    gestures: GestureTranslator,
    capture: Capture,
    surface: SoftwareSurface,
}

impl<E: RemoteProtocolEngine> SessionView<E> {
    pub fn new(session: Arc<Session<E>>, width: u32, height: u32) -> Self {
        Self::with_input(session, width, height, GestureConfig::default(), Capture::default())
    }

    /// Create a session on `engine` and a `width`×`height` view onto it,
    /// both set up from `config`.
    pub fn open(
        engine: Arc<E>,
        config: &ClientConfig,
        width: u32,
        height: u32,
    ) -> (Self, EventReceiver) {
        let (session, events) = Session::new(engine, config.session.to_session_config());
        let view = Self::from_config(Arc::new(session), width, height, config);
        (view, events)
    }

    /// A view using the configured input settings. Switches the session to
    /// reduced scale when `display.reduced` is set.
    pub fn from_config(
        session: Arc<Session<E>>,
        width: u32,
        height: u32,
        config: &ClientConfig,
    ) -> Self {
        let input = &config.input;
        let capture = Capture {
            touch: input.capture_touch,
            keyboard: input.capture_keyboard,
        };
        if config.display.reduced && session.frames().display_scale() == DisplayScale::Full {
            session.frames().toggle_display_scale();
            debug!("starting in reduced scale");
        }
        Self::with_input(session, width, height, input.to_gesture_config(), capture)
    }

    pub fn with_input(
        session: Arc<Session<E>>,
        width: u32,
        height: u32,
        gestures: GestureConfig,
        capture: Capture,
    ) -> Self {
        Self {
            session,
            gestures: GestureTranslator::new(gestures),
            capture,
            surface: SoftwareSurface::new(width, height),
        }
    }

    pub fn session(&self) -> &Arc<Session<E>> {
        &self.session
    }

    pub fn surface(&self) -> &SoftwareSurface {
        &self.surface
    }

    /// Draw the latest published frame.
    pub fn render(&mut self) -> RenderGeometry {
        self.session.frames().render(&mut self.surface)
    }

    /// Handle one host event. Returns how many translated inputs reached
    /// the engine. A click counts once even though the engine receives it
    /// as a press and a release.
    pub fn handle(&mut self, event: HostEvent) -> usize {
        let inputs = match event {
            HostEvent::Resize { width, height } => {
                self.surface.resize(width, height);
                self.render();
                return 0;
            }
            HostEvent::ToggleScale => {
                let reduced = self.session.frames().toggle_display_scale();
                debug!(reduced, "display scale toggled from view");
                self.render();
                return 0;
            }
            _ if self.session.state() != ConnectionState::Connected => {
                trace!(?event, "input ignored: not connected");
                self.gestures.reset();
                return 0;
            }
            HostEvent::Touch(touch) if self.capture.touch => {
                let viewport = self.session.viewport();
                self.gestures.on_touch(touch, &viewport)
            }
            HostEvent::Pointer(pointer) if self.capture.touch => {
                let viewport = self.session.viewport();
                self.gestures.on_pointer(pointer, &viewport)
            }
            HostEvent::Key(key) if self.capture.keyboard => vec![translate_key(key)],
            _ => return 0,
        };
        let failed = self.session.dispatch(&inputs);
        inputs.len() - failed
    }

    /// React to a session notification drained by the UI loop.
    pub fn on_session_event(&mut self, event: &SessionEvent) {
        match event {
            SessionEvent::StateChanged { state, .. } if *state != ConnectionState::Connected => {
                self.gestures.reset();
            }
            SessionEvent::FrameResized { .. } | SessionEvent::Redraw { .. } => {
                self.render();
            }
            _ => {}
        }
    }
}
