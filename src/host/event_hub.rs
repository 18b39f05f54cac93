//! Event dispatch for the host window
//!
//! Listeners register for a set of event kinds in either the capture or the
//! bubble phase. Capture listeners always run first and cannot be suppressed;
//! bubble listeners run in registration order until one of them returns
//! `Propagation::Stop`. Registration hands back a `Listener` token which
//! unregisters on drop.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

/// Events delivered by the host window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum HostEvent {
    /// Find engine ran a new search
    Find,
    /// Find engine repeated the last search
    FindAgain,
    /// Content-command channel event (toolbar buttons and friends)
    Command { id: String },
    KeyUp { key: String },
    KeyPress { key: String },
    MouseDown { x: f64, y: f64 },
    Wheel { delta_y: f64 },
    /// Host window is being torn down
    Unload,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Find,
    FindAgain,
    Command,
    KeyUp,
    KeyPress,
    MouseDown,
    Wheel,
    Unload,
}

impl HostEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            HostEvent::Find => EventKind::Find,
            HostEvent::FindAgain => EventKind::FindAgain,
            HostEvent::Command { .. } => EventKind::Command,
            HostEvent::KeyUp { .. } => EventKind::KeyUp,
            HostEvent::KeyPress { .. } => EventKind::KeyPress,
            HostEvent::MouseDown { .. } => EventKind::MouseDown,
            HostEvent::Wheel { .. } => EventKind::Wheel,
            HostEvent::Unload => EventKind::Unload,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Capture,
    Bubble,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Propagation {
    Continue,
    Stop,
}

type Callback = Arc<dyn Fn(&HostEvent) -> Propagation + Send + Sync>;

struct Registration {
    id: u64,
    kinds: Vec<EventKind>,
    phase: Phase,
    callback: Callback,
}

struct HubInner {
    next_id: AtomicU64,
    registrations: Mutex<Vec<Registration>>,
}

impl HubInner {
    fn is_registered(&self, id: u64) -> bool {
        self.registrations
            .lock()
            .map(|regs| regs.iter().any(|r| r.id == id))
            .unwrap_or(false)
    }

    fn remove(&self, id: u64) {
        if let Ok(mut regs) = self.registrations.lock() {
            regs.retain(|r| r.id != id);
        }
    }
}

/// Shared handle to the host window's event target.
#[derive(Clone)]
pub struct EventHub {
    inner: Arc<HubInner>,
}

impl Default for EventHub {
    fn default() -> Self {
        Self::new()
    }
}

impl EventHub {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(HubInner {
                next_id: AtomicU64::new(1),
                registrations: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Register a listener for the given kinds. The registration lives as
    /// long as the returned token.
    pub fn listen<F>(&self, kinds: &[EventKind], phase: Phase, callback: F) -> Listener
    where
        F: Fn(&HostEvent) -> Propagation + Send + Sync + 'static,
    {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let registration = Registration {
            id,
            kinds: kinds.to_vec(),
            phase,
            callback: Arc::new(callback),
        };
        if let Ok(mut regs) = self.inner.registrations.lock() {
            regs.push(registration);
        }
        log::trace!("Registered listener {} for {:?} ({:?})", id, kinds, phase);

        Listener {
            id,
            hub: Arc::downgrade(&self.inner),
        }
    }

    /// Deliver an event to every matching listener. Returns how many
    /// listeners were invoked.
    ///
    /// Callbacks run outside the registry lock, so a callback may register or
    /// drop listeners (including itself) while the event is in flight.
    pub fn dispatch(&self, event: &HostEvent) -> usize {
        let kind = event.kind();
        let (capture, bubble) = {
            let regs = match self.inner.registrations.lock() {
                Ok(regs) => regs,
                Err(_) => {
                    log::error!("Event registry poisoned, dropping {:?}", kind);
                    return 0;
                }
            };
            let matching = |phase: Phase| -> Vec<(u64, Callback)> {
                regs.iter()
                    .filter(|r| r.phase == phase && r.kinds.contains(&kind))
                    .map(|r| (r.id, r.callback.clone()))
                    .collect()
            };
            (matching(Phase::Capture), matching(Phase::Bubble))
        };

        log::trace!(
            "Dispatching {:?} to {} capture / {} bubble listeners",
            kind,
            capture.len(),
            bubble.len()
        );

        let mut invoked = 0;
        for (id, callback) in capture {
            if self.inner.is_registered(id) {
                callback(event);
                invoked += 1;
            }
        }
        for (id, callback) in bubble {
            if !self.inner.is_registered(id) {
                continue;
            }
            invoked += 1;
            if callback(event) == Propagation::Stop {
                break;
            }
        }
        invoked
    }

    pub fn listener_count(&self) -> usize {
        self.inner
            .registrations
            .lock()
            .map(|regs| regs.len())
            .unwrap_or(0)
    }
}

/// Scoped registration token. Dropping it removes the listener.
pub struct Listener {
    id: u64,
    hub: Weak<HubInner>,
}

impl Drop for Listener {
    fn drop(&mut self) {
        if let Some(hub) = self.hub.upgrade() {
            hub.remove(self.id);
            log::trace!("Removed listener {}", self.id);
        }
    }
}

impl std::fmt::Debug for Listener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Listener").field("id", &self.id).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn key_up() -> HostEvent {
        HostEvent::KeyUp {
            key: "Enter".to_string(),
        }
    }

    #[test]
    fn test_listener_receives_matching_kinds_only() {
        let hub = EventHub::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let hits_clone = hits.clone();
        let _listener = hub.listen(&[EventKind::KeyUp, EventKind::Wheel], Phase::Bubble, move |_| {
            hits_clone.fetch_add(1, Ordering::SeqCst);
            Propagation::Continue
        });

        hub.dispatch(&key_up());
        hub.dispatch(&HostEvent::Wheel { delta_y: 3.0 });
        hub.dispatch(&HostEvent::Find);
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_drop_unregisters() {
        let hub = EventHub::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let hits_clone = hits.clone();
        let listener = hub.listen(&[EventKind::KeyUp], Phase::Capture, move |_| {
            hits_clone.fetch_add(1, Ordering::SeqCst);
            Propagation::Continue
        });
        assert_eq!(hub.listener_count(), 1);

        drop(listener);
        assert_eq!(hub.listener_count(), 0);
        assert_eq!(hub.dispatch(&key_up()), 0);
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_bubble_stop_cannot_suppress_capture() {
        let hub = EventHub::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        let o = order.clone();
        let _stopper = hub.listen(&[EventKind::KeyUp], Phase::Bubble, move |_| {
            o.lock().unwrap().push("bubble-stop");
            Propagation::Stop
        });
        let o = order.clone();
        let _late_bubble = hub.listen(&[EventKind::KeyUp], Phase::Bubble, move |_| {
            o.lock().unwrap().push("bubble-late");
            Propagation::Continue
        });
        let o = order.clone();
        let _capture = hub.listen(&[EventKind::KeyUp], Phase::Capture, move |_| {
            o.lock().unwrap().push("capture");
            Propagation::Continue
        });

        assert_eq!(hub.dispatch(&key_up()), 2);
        assert_eq!(*order.lock().unwrap(), vec!["capture", "bubble-stop"]);
    }

    #[test]
    fn test_listener_removed_mid_dispatch_is_skipped() {
        let hub = EventHub::new();
        let victim_hits = Arc::new(AtomicUsize::new(0));
        let slot: Arc<Mutex<Option<Listener>>> = Arc::new(Mutex::new(None));

        let slot_clone = slot.clone();
        let _remover = hub.listen(&[EventKind::MouseDown], Phase::Capture, move |_| {
            slot_clone.lock().unwrap().take();
            Propagation::Continue
        });
        let hits_clone = victim_hits.clone();
        let victim = hub.listen(&[EventKind::MouseDown], Phase::Capture, move |_| {
            hits_clone.fetch_add(1, Ordering::SeqCst);
            Propagation::Continue
        });
        *slot.lock().unwrap() = Some(victim);

        hub.dispatch(&HostEvent::MouseDown { x: 1.0, y: 1.0 });
        assert_eq!(victim_hits.load(Ordering::SeqCst), 0);
        assert_eq!(hub.listener_count(), 1);
    }

    #[test]
    fn test_token_outliving_hub_is_harmless() {
        let hub = EventHub::new();
        let listener = hub.listen(&[EventKind::Unload], Phase::Bubble, |_| Propagation::Continue);
        drop(hub);
        drop(listener);
    }
}
