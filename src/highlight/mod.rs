//! On-screen highlight of a find result
//!
//! [`HighlightBox`] owns one overlay element; [`Highlighting`] runs the
//! session lifecycle around it.

pub mod highlight_box;
pub mod session;
pub mod stylesheet;

pub use highlight_box::HighlightBox;
pub use session::{Highlighting, SessionId, StopReason};
pub use stylesheet::pulse_stylesheet;
