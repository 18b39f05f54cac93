//! Host window interface
//!
//! The privileged UI context this crate runs in: an event target delivering
//! find-engine notifications and raw input, and a chrome able to place
//! overlays on screen. `HeadlessChrome` is an in-memory chrome used by the
//! replay binary and the tests.

pub mod event_hub;
pub mod headless;

pub use event_hub::{EventHub, EventKind, HostEvent, Listener, Phase, Propagation};
pub use headless::{HeadlessChrome, OverlayEvent};

use crate::geometry::{OverlayRect, ViewportRect};

/// Browser chrome collaborator.
pub trait Chrome: Send + Sync {
    /// Current screen rectangle of the visible content area.
    fn content_viewport(&self) -> ViewportRect;

    /// Add a stylesheet to the chrome document. Never removed.
    fn inject_stylesheet(&self, css: &str);

    /// Open an overlay element at a screen position.
    fn open_overlay(&self, rect: OverlayRect) -> Box<dyn Overlay>;
}

/// One open overlay element.
pub trait Overlay: Send {
    /// Toggle the "active" state that runs the pulse animation.
    fn set_active(&mut self, active: bool);

    fn close(&mut self);
}
