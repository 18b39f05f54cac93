//! Highlight session controller
//!
//! At most one session is alive at a time. A session ends when its duration
//! timer fires, when the user presses a pointer button or key or scrolls, or
//! when it is replaced or stopped explicitly, whichever comes first.

use super::highlight_box::HighlightBox;
use super::stylesheet::pulse_stylesheet;
use crate::config::HighlightConfig;
use crate::geometry::FindResultGeometry;
use crate::host::{Chrome, EventHub, EventKind, Listener, Phase, Propagation};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use tokio::task::JoinHandle;

pub type SessionId = u64;

/// Input that ends a session early.
const INTERRUPT_KINDS: [EventKind; 3] = [EventKind::MouseDown, EventKind::KeyPress, EventKind::Wheel];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Timeout,
    UserInterrupt,
    /// A new session was started over this one
    Replaced,
    /// A new find command made the highlight stale
    NewFind,
    Explicit,
    Teardown,
}

/// Aborts the duration timer when dropped.
struct TimerGuard(JoinHandle<()>);

impl Drop for TimerGuard {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Resources owned by one active highlight. Dropping it tears everything
/// down.
struct Session {
    id: SessionId,
    highlight: HighlightBox,
    timer: TimerGuard,
    interrupts: Vec<Listener>,
}

impl Session {
    fn end(self) {
        let Session {
            id,
            highlight,
            timer,
            interrupts,
        } = self;
        drop(timer);
        drop(interrupts);
        highlight.dispose();
        log::trace!("Session {} resources released", id);
    }
}

enum SessionState {
    Idle,
    Active(Session),
}

struct Inner {
    state: SessionState,
    next_id: SessionId,
    /// Session being built by `start` outside the lock
    starting: Option<SessionId>,
    stylesheet_injected: bool,
    stops: u64,
    last_stop: Option<(SessionId, StopReason)>,
}

/// Shared handle to the session controller.
#[derive(Clone)]
pub struct Highlighting {
    inner: Arc<Mutex<Inner>>,
    chrome: Arc<dyn Chrome>,
    hub: EventHub,
    config: Arc<HighlightConfig>,
}

impl Highlighting {
    pub fn new(chrome: Arc<dyn Chrome>, hub: EventHub, config: HighlightConfig) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                state: SessionState::Idle,
                next_id: 1,
                starting: None,
                stylesheet_injected: false,
                stops: 0,
                last_stop: None,
            })),
            chrome,
            hub,
            config: Arc::new(config),
        }
    }

    /// Start a session for a find result. Any session still active is torn
    /// down first. Must be called from within a tokio runtime.
    ///
    /// The chrome may dispatch host events synchronously, so it is only
    /// called with the session lock released. A stop that arrives while the
    /// box is being built ends the new session before it is installed.
    pub fn start(&self, geometry: FindResultGeometry) -> SessionId {
        let (id, previous, inject_stylesheet) = {
            let mut inner = self.lock();
            Self::cancel_starting(&mut inner, None, StopReason::Replaced);
            let previous = Self::take_session(&mut inner, None, StopReason::Replaced);
            let id = inner.next_id;
            inner.next_id += 1;
            inner.starting = Some(id);
            let inject = !std::mem::replace(&mut inner.stylesheet_injected, true);
            (id, previous, inject)
        };

        if let Some(previous) = previous {
            log::warn!("Highlight started while session {} was still active", previous.id);
            previous.end();
        }
        if inject_stylesheet {
            self.chrome.inject_stylesheet(&pulse_stylesheet(&self.config));
        }

        let timer = {
            let weak = Arc::downgrade(&self.inner);
            let duration = self.config.duration();
            TimerGuard(tokio::spawn(async move {
                tokio::time::sleep(duration).await;
                Self::stop_session(&weak, id, StopReason::Timeout);
            }))
        };

        let interrupts = {
            let weak = Arc::downgrade(&self.inner);
            vec![self.hub.listen(&INTERRUPT_KINDS, Phase::Capture, move |event| {
                log::trace!("Session {} interrupted by {:?}", id, event.kind());
                Self::stop_session(&weak, id, StopReason::UserInterrupt);
                Propagation::Continue
            })]
        };

        let mut highlight = HighlightBox::new(geometry, self.chrome.clone(), &self.config.border);
        highlight.show();
        let rect = highlight.rect();
        let session = Session {
            id,
            highlight,
            timer,
            interrupts,
        };

        let mut inner = self.lock();
        if inner.starting != Some(id) {
            drop(inner);
            log::debug!("Highlight session {} stopped before it was installed", id);
            session.end();
            return id;
        }
        inner.starting = None;
        inner.state = SessionState::Active(session);
        log::debug!("Highlight session {} started at {:?}", id, rect);
        id
    }

    /// End the active session, if any. A no-op while idle.
    pub fn stop(&self) -> bool {
        self.stop_with(StopReason::Explicit)
    }

    pub fn stop_with(&self, reason: StopReason) -> bool {
        let (cancelled, session) = {
            let mut inner = self.lock();
            let cancelled = Self::cancel_starting(&mut inner, None, reason);
            (cancelled, Self::take_session(&mut inner, None, reason))
        };
        match session {
            Some(session) => {
                session.end();
                true
            }
            None => cancelled,
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self.lock().state, SessionState::Active(_))
    }

    pub fn current_session(&self) -> Option<SessionId> {
        match &self.lock().state {
            SessionState::Active(session) => Some(session.id),
            SessionState::Idle => None,
        }
    }

    /// Number of sessions ended so far.
    pub fn stop_count(&self) -> u64 {
        self.lock().stops
    }

    pub fn last_stop(&self) -> Option<(SessionId, StopReason)> {
        self.lock().last_stop
    }

    /// Stop `id` from a timer or listener callback. Ignored when `id` is no
    /// longer the active session.
    fn stop_session(inner: &Weak<Mutex<Inner>>, id: SessionId, reason: StopReason) {
        let Some(inner) = inner.upgrade() else {
            return;
        };
        let session = {
            let mut inner = inner.lock().unwrap_or_else(|e| e.into_inner());
            Self::cancel_starting(&mut inner, Some(id), reason);
            Self::take_session(&mut inner, Some(id), reason)
        };
        if let Some(session) = session {
            session.end();
        }
    }

    /// Mark a session still being built by `start` as stopped. `start` ends
    /// it once it gets the lock back.
    fn cancel_starting(inner: &mut Inner, only: Option<SessionId>, reason: StopReason) -> bool {
        match inner.starting {
            Some(id) if only.map_or(true, |only| only == id) => {
                inner.starting = None;
                inner.stops += 1;
                inner.last_stop = Some((id, reason));
                log::debug!("Highlight session {} stopped while starting: {:?}", id, reason);
                true
            }
            _ => false,
        }
    }

    /// Move the active session out of the shared state, leaving it idle.
    fn take_session(inner: &mut Inner, only: Option<SessionId>, reason: StopReason) -> Option<Session> {
        match &inner.state {
            SessionState::Active(session) if only.map_or(true, |id| id == session.id) => {}
            _ => return None,
        }

        let SessionState::Active(session) = std::mem::replace(&mut inner.state, SessionState::Idle) else {
            return None;
        };
        inner.stops += 1;
        inner.last_stop = Some((session.id, reason));
        log::debug!("Highlight session {} stopped: {:?}", session.id, reason);
        Some(session)
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}
