pub mod config;
pub mod content;
pub mod core;
pub mod find;
pub mod geometry;
pub mod highlight;
pub mod host;
pub mod scenario;

// Public API
pub use config::{BorderWidths, ConfigError, HighlightConfig};
pub use find::{FindCommandObserver, GeometryQuery, ObserverStats, QueryError, Trigger, TriggerGate};
pub use geometry::{FindResultGeometry, OverlayRect, ViewportRect};
pub use highlight::{HighlightBox, Highlighting, SessionId, StopReason};
pub use host::{Chrome, EventHub, HeadlessChrome, HostEvent, Overlay};
