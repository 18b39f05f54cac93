//! In-memory chrome
//!
//! Records every overlay transition so callers can inspect what would have
//! been on screen. Used by the `replay` command and throughout the tests.

use super::{Chrome, Overlay};
use crate::geometry::{OverlayRect, ViewportRect};
use std::sync::{Arc, Mutex};
use tokio::time::Instant;

#[derive(Debug, Clone, PartialEq)]
pub enum OverlayEvent {
    Opened { overlay: u64, rect: OverlayRect },
    Activated { overlay: u64 },
    Deactivated { overlay: u64 },
    Closed { overlay: u64 },
}

impl std::fmt::Display for OverlayEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OverlayEvent::Opened { overlay, rect } => write!(
                f,
                "overlay #{} opened at left={} top={} width={} height={}",
                overlay, rect.left, rect.top, rect.width, rect.height
            ),
            OverlayEvent::Activated { overlay } => write!(f, "overlay #{} animating", overlay),
            OverlayEvent::Deactivated { overlay } => write!(f, "overlay #{} animation stopped", overlay),
            OverlayEvent::Closed { overlay } => write!(f, "overlay #{} closed", overlay),
        }
    }
}

#[derive(Default)]
struct Recorder {
    next_overlay: u64,
    events: Vec<(Instant, OverlayEvent)>,
    open: Vec<u64>,
    max_open: usize,
    stylesheets: Vec<String>,
}

impl Recorder {
    fn record(&mut self, event: OverlayEvent) {
        log::debug!("Headless chrome: {}", event);
        self.events.push((Instant::now(), event));
    }
}

#[derive(Clone)]
pub struct HeadlessChrome {
    viewport: Arc<Mutex<ViewportRect>>,
    recorder: Arc<Mutex<Recorder>>,
    started: Instant,
}

impl HeadlessChrome {
    pub fn new(viewport: ViewportRect) -> Self {
        Self {
            viewport: Arc::new(Mutex::new(viewport)),
            recorder: Arc::new(Mutex::new(Recorder::default())),
            started: Instant::now(),
        }
    }

    /// Simulate the browser window moving or resizing.
    pub fn set_viewport(&self, viewport: ViewportRect) {
        *self.viewport.lock().unwrap_or_else(|e| e.into_inner()) = viewport;
    }

    pub fn events(&self) -> Vec<OverlayEvent> {
        self.lock().events.iter().map(|(_, e)| e.clone()).collect()
    }

    /// Events with their offset from chrome creation.
    pub fn timeline(&self) -> Vec<(std::time::Duration, OverlayEvent)> {
        self.lock()
            .events
            .iter()
            .map(|(at, e)| (at.duration_since(self.started), e.clone()))
            .collect()
    }

    pub fn visible_count(&self) -> usize {
        self.lock().open.len()
    }

    /// Highest number of simultaneously open overlays seen so far.
    pub fn max_visible(&self) -> usize {
        self.lock().max_open
    }

    pub fn opened_count(&self) -> usize {
        self.lock()
            .events
            .iter()
            .filter(|(_, e)| matches!(e, OverlayEvent::Opened { .. }))
            .count()
    }

    pub fn stylesheets(&self) -> Vec<String> {
        self.lock().stylesheets.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Recorder> {
        self.recorder.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Chrome for HeadlessChrome {
    fn content_viewport(&self) -> ViewportRect {
        *self.viewport.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn inject_stylesheet(&self, css: &str) {
        self.lock().stylesheets.push(css.to_string());
    }

    fn open_overlay(&self, rect: OverlayRect) -> Box<dyn Overlay> {
        let mut recorder = self.lock();
        recorder.next_overlay += 1;
        let overlay = recorder.next_overlay;
        recorder.open.push(overlay);
        recorder.max_open = recorder.max_open.max(recorder.open.len());
        recorder.record(OverlayEvent::Opened { overlay, rect });

        Box::new(HeadlessOverlay {
            id: overlay,
            active: false,
            closed: false,
            recorder: self.recorder.clone(),
        })
    }
}

struct HeadlessOverlay {
    id: u64,
    active: bool,
    closed: bool,
    recorder: Arc<Mutex<Recorder>>,
}

impl Overlay for HeadlessOverlay {
    fn set_active(&mut self, active: bool) {
        if self.closed || self.active == active {
            return;
        }
        self.active = active;
        let event = if active {
            OverlayEvent::Activated { overlay: self.id }
        } else {
            OverlayEvent::Deactivated { overlay: self.id }
        };
        self.recorder.lock().unwrap_or_else(|e| e.into_inner()).record(event);
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        let mut recorder = self.recorder.lock().unwrap_or_else(|e| e.into_inner());
        recorder.open.retain(|id| *id != self.id);
        recorder.record(OverlayEvent::Closed { overlay: self.id });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rect() -> OverlayRect {
        OverlayRect {
            left: 0.0,
            top: 10.0,
            width: 100.0,
            height: 20.0,
        }
    }

    #[tokio::test]
    async fn test_overlay_lifecycle_recorded() {
        let chrome = HeadlessChrome::new(ViewportRect {
            screen_x: 0.0,
            width: 100.0,
        });
        let mut overlay = chrome.open_overlay(rect());
        overlay.set_active(true);
        overlay.set_active(true);
        assert_eq!(chrome.visible_count(), 1);

        overlay.close();
        overlay.close();
        overlay.set_active(false);

        assert_eq!(
            chrome.events(),
            vec![
                OverlayEvent::Opened { overlay: 1, rect: rect() },
                OverlayEvent::Activated { overlay: 1 },
                OverlayEvent::Closed { overlay: 1 },
            ]
        );
        assert_eq!(chrome.visible_count(), 0);
        assert_eq!(chrome.max_visible(), 1);
    }

    #[tokio::test]
    async fn test_viewport_updates() {
        let chrome = HeadlessChrome::new(ViewportRect {
            screen_x: 0.0,
            width: 100.0,
        });
        chrome.set_viewport(ViewportRect {
            screen_x: 40.0,
            width: 300.0,
        });
        assert_eq!(chrome.content_viewport().screen_x, 40.0);
        assert_eq!(chrome.content_viewport().width, 300.0);
    }
}
