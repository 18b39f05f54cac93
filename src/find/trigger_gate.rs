//! Wait for the event that completes a find command
//!
//! A find can finish through the command channel (toolbar "find again") or
//! through the keyboard (typing in the find field, shortcut keys). The gate
//! resolves on whichever arrives first. Key releases are observed in the
//! capture phase so no page or chrome handler can swallow them.

use crate::host::{EventHub, EventKind, HostEvent, Listener, Phase, Propagation};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use tokio::sync::oneshot;

/// Which channel carried the user's action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    Command,
    KeyUp,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TriggerError {
    #[error("Trigger wait was superseded or cancelled")]
    Superseded,
}

type Resolver = Arc<Mutex<Option<oneshot::Sender<Trigger>>>>;

struct PendingTrigger {
    generation: u64,
    _listeners: Vec<Listener>,
}

#[derive(Clone)]
pub struct TriggerGate {
    hub: EventHub,
    pending: Arc<Mutex<Option<PendingTrigger>>>,
    generation: Arc<AtomicU64>,
}

impl TriggerGate {
    pub fn new(hub: EventHub) -> Self {
        Self {
            hub,
            pending: Arc::new(Mutex::new(None)),
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Start waiting for the next trigger.
    ///
    /// Listeners are registered before this returns, so an event dispatched
    /// right after the call is not missed. A previous wait that has not
    /// resolved yet is dropped and its future yields
    /// `TriggerError::Superseded`.
    pub fn wait(&self) -> impl Future<Output = Result<Trigger, TriggerError>> + Send + 'static {
        let (sender, receiver) = oneshot::channel();
        let resolver: Resolver = Arc::new(Mutex::new(Some(sender)));
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;

        let command = {
            let resolver = resolver.clone();
            let pending = Arc::downgrade(&self.pending);
            self.hub.listen(&[EventKind::Command], Phase::Bubble, move |_| {
                Self::resolve(&resolver, &pending, generation, Trigger::Command);
                Propagation::Continue
            })
        };
        let key_up = {
            let pending = Arc::downgrade(&self.pending);
            self.hub.listen(&[EventKind::KeyUp], Phase::Capture, move |event: &HostEvent| {
                log::trace!("Trigger candidate {:?}", event);
                Self::resolve(&resolver, &pending, generation, Trigger::KeyUp);
                Propagation::Continue
            })
        };

        let previous = self.lock().replace(PendingTrigger {
            generation,
            _listeners: vec![command, key_up],
        });
        if let Some(previous) = previous {
            log::debug!("Trigger wait {} superseded by {}", previous.generation, generation);
        }

        async move { receiver.await.map_err(|_| TriggerError::Superseded) }
    }

    /// Drop the outstanding wait, if any.
    pub fn cancel(&self) {
        let previous = self.lock().take();
        if let Some(previous) = previous {
            log::debug!("Trigger wait {} cancelled", previous.generation);
        }
    }

    pub fn is_pending(&self) -> bool {
        self.lock().is_some()
    }

    fn resolve(resolver: &Resolver, pending: &Weak<Mutex<Option<PendingTrigger>>>, generation: u64, trigger: Trigger) {
        let sender = resolver.lock().unwrap_or_else(|e| e.into_inner()).take();
        let Some(sender) = sender else {
            return;
        };
        log::debug!("Trigger wait {} resolved by {:?}", generation, trigger);
        let _ = sender.send(trigger);

        // Unregister both listeners now that the wait is settled
        if let Some(pending) = pending.upgrade() {
            let finished = {
                let mut slot = pending.lock().unwrap_or_else(|e| e.into_inner());
                match slot.as_ref() {
                    Some(p) if p.generation == generation => slot.take(),
                    _ => None,
                }
            };
            drop(finished);
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<PendingTrigger>> {
        self.pending.lock().unwrap_or_else(|e| e.into_inner())
    }
}
