//! Find command observer
//!
//! Turns find-engine notifications into highlights:
//! find → stop current highlight → wait for trigger → query geometry →
//! start highlight. Every notification starts a fresh chain. Chains are not
//! cancelled when a newer notification arrives; each carries the epoch it
//! was started in and, with `discard_stale_replies`, gives up as soon as it
//! notices a newer one.

use super::geometry_query::GeometryQuery;
use super::trigger_gate::{Trigger, TriggerError, TriggerGate};
use crate::config::HighlightConfig;
use crate::highlight::{Highlighting, StopReason};
use crate::host::{Chrome, EventHub, EventKind, HostEvent, Listener, Phase, Propagation};
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

/// Counters describing what the observer has done so far.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ObserverStats {
    pub find_commands: u64,
    pub triggers: u64,
    pub queries: u64,
    pub highlights_started: u64,
    pub no_result: u64,
    pub query_failures: u64,
    pub stale_discarded: u64,
}

#[derive(Default)]
struct Counters {
    find_commands: AtomicU64,
    triggers: AtomicU64,
    queries: AtomicU64,
    highlights_started: AtomicU64,
    no_result: AtomicU64,
    query_failures: AtomicU64,
    stale_discarded: AtomicU64,
}

impl Counters {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> ObserverStats {
        ObserverStats {
            find_commands: self.find_commands.load(Ordering::Relaxed),
            triggers: self.triggers.load(Ordering::Relaxed),
            queries: self.queries.load(Ordering::Relaxed),
            highlights_started: self.highlights_started.load(Ordering::Relaxed),
            no_result: self.no_result.load(Ordering::Relaxed),
            query_failures: self.query_failures.load(Ordering::Relaxed),
            stale_discarded: self.stale_discarded.load(Ordering::Relaxed),
        }
    }
}

struct Shared {
    hub: EventHub,
    highlighting: Highlighting,
    gate: TriggerGate,
    query: GeometryQuery,
    discard_stale: bool,
    runtime: Handle,
    epoch: AtomicU64,
    closed: AtomicBool,
    registrations: Mutex<Vec<Listener>>,
    chains: Mutex<Vec<JoinHandle<()>>>,
    counters: Counters,
}

impl Shared {
    fn on_find_command(self: &Arc<Self>, event: &HostEvent) {
        if self.closed.load(Ordering::SeqCst) {
            return;
        }
        Counters::bump(&self.counters.find_commands);

        let epoch = self.epoch.fetch_add(1, Ordering::SeqCst) + 1;
        log::debug!("Find command {:?} opened epoch {}", event.kind(), epoch);

        // A new find always invalidates whatever is on screen
        self.highlighting.stop_with(StopReason::NewFind);

        let trigger = self.gate.wait();
        let shared = self.clone();
        let chain = self.runtime.spawn(async move { shared.run_chain(epoch, trigger).await });

        let mut chains = self.chains.lock().unwrap_or_else(|e| e.into_inner());
        chains.retain(|handle| !handle.is_finished());
        chains.push(chain);
    }

    async fn run_chain(
        self: Arc<Self>,
        epoch: u64,
        trigger: impl Future<Output = Result<Trigger, TriggerError>>,
    ) {
        let trigger = match trigger.await {
            Ok(trigger) => trigger,
            Err(e) => {
                log::trace!("Chain {} ended: {}", epoch, e);
                return;
            }
        };
        Counters::bump(&self.counters.triggers);
        log::debug!("Chain {} triggered by {:?}", epoch, trigger);

        if self.is_stale(epoch) {
            Counters::bump(&self.counters.stale_discarded);
            log::debug!("Chain {} is stale after trigger, dropping", epoch);
            return;
        }

        Counters::bump(&self.counters.queries);
        let geometry = match self.query.query().await {
            Ok(Some(geometry)) => geometry,
            Ok(None) => {
                Counters::bump(&self.counters.no_result);
                log::debug!("Chain {}: no find selection on the page", epoch);
                return;
            }
            Err(e) => {
                Counters::bump(&self.counters.query_failures);
                log::warn!("Find result geometry query failed: {}", e);
                return;
            }
        };

        if self.closed.load(Ordering::SeqCst) {
            return;
        }
        if self.is_stale(epoch) {
            Counters::bump(&self.counters.stale_discarded);
            log::debug!("Chain {} got a reply for a superseded find, dropping", epoch);
            return;
        }

        let session = self.highlighting.start(geometry);
        Counters::bump(&self.counters.highlights_started);
        log::debug!("Chain {} started highlight session {}", epoch, session);
    }

    fn is_stale(&self, epoch: u64) -> bool {
        self.discard_stale && self.epoch.load(Ordering::SeqCst) != epoch
    }

    fn teardown(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        log::info!("Find command observer shutting down");

        self.epoch.fetch_add(1, Ordering::SeqCst);
        self.highlighting.stop_with(StopReason::Teardown);
        self.gate.cancel();

        let registrations = std::mem::take(&mut *self.registrations.lock().unwrap_or_else(|e| e.into_inner()));
        drop(registrations);

        let chains = std::mem::take(&mut *self.chains.lock().unwrap_or_else(|e| e.into_inner()));
        for chain in chains {
            chain.abort();
        }
    }
}

pub struct FindCommandObserver {
    shared: Arc<Shared>,
}

impl FindCommandObserver {
    /// Build the observer and its session controller. Must be called from
    /// within a tokio runtime.
    pub fn new(hub: EventHub, chrome: Arc<dyn Chrome>, query: GeometryQuery, config: HighlightConfig) -> Self {
        let discard_stale = config.discard_stale_replies;
        let highlighting = Highlighting::new(chrome, hub.clone(), config);
        let gate = TriggerGate::new(hub.clone());

        Self {
            shared: Arc::new(Shared {
                hub,
                highlighting,
                gate,
                query,
                discard_stale,
                runtime: Handle::current(),
                epoch: AtomicU64::new(0),
                closed: AtomicBool::new(false),
                registrations: Mutex::new(Vec::new()),
                chains: Mutex::new(Vec::new()),
                counters: Counters::default(),
            }),
        }
    }

    /// Subscribe to find notifications and window teardown. Calling it again
    /// while subscribed does nothing.
    pub fn init(&self) {
        let shared = &self.shared;
        if shared.closed.load(Ordering::SeqCst) {
            log::warn!("Find command observer already shut down");
            return;
        }

        let mut registrations = shared.registrations.lock().unwrap_or_else(|e| e.into_inner());
        if !registrations.is_empty() {
            return;
        }

        let weak: Weak<Shared> = Arc::downgrade(shared);
        registrations.push(shared.hub.listen(
            &[EventKind::Find, EventKind::FindAgain],
            Phase::Bubble,
            move |event| {
                if let Some(shared) = weak.upgrade() {
                    shared.on_find_command(event);
                }
                Propagation::Continue
            },
        ));

        let weak: Weak<Shared> = Arc::downgrade(shared);
        registrations.push(shared.hub.listen(&[EventKind::Unload], Phase::Capture, move |_| {
            if let Some(shared) = weak.upgrade() {
                shared.teardown();
            }
            Propagation::Continue
        }));

        log::debug!("Find command observer subscribed");
    }

    /// Stop the highlight and release every listener and pending chain.
    pub fn shutdown(&self) {
        self.shared.teardown();
    }

    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::SeqCst)
    }

    pub fn highlighting(&self) -> &Highlighting {
        &self.shared.highlighting
    }

    pub fn stats(&self) -> ObserverStats {
        self.shared.counters.snapshot()
    }

    /// Chains that have not finished yet.
    pub fn pending_chains(&self) -> usize {
        self.shared
            .chains
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .filter(|handle| !handle.is_finished())
            .count()
    }
}

impl Drop for FindCommandObserver {
    fn drop(&mut self) {
        self.shared.teardown();
    }
}
