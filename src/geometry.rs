//! Geometry shared by the content side and the highlight box.

use crate::config::BorderWidths;
use serde::{Deserialize, Serialize};

/// Vertical extent of a find result as reported by the content process.
///
/// `top`/`bottom` are document coordinates of the matched range,
/// `view_origin_y` is the vertical screen offset of the content viewport.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FindResultGeometry {
    pub top: f64,
    pub bottom: f64,
    pub view_origin_y: f64,
    pub zoom: f64,
}

impl FindResultGeometry {
    /// JSON has no NaN or infinity, so only finite geometry crosses the
    /// process boundary.
    pub fn is_finite(&self) -> bool {
        [self.top, self.bottom, self.view_origin_y, self.zoom]
            .iter()
            .all(|v| v.is_finite())
    }
}

/// Screen rectangle of the visible content area, as known to the chrome.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ViewportRect {
    pub screen_x: f64,
    pub width: f64,
}

/// Screen-space placement of the highlight overlay.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OverlayRect {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl OverlayRect {
    /// Place the overlay around a find result. The horizontal extent always
    /// spans the whole content viewport.
    pub fn around(geometry: &FindResultGeometry, viewport: &ViewportRect, border: &BorderWidths) -> Self {
        let inset = border.total();
        Self {
            left: viewport.screen_x,
            top: (geometry.top + geometry.view_origin_y) * geometry.zoom - inset,
            width: viewport.width,
            height: (geometry.bottom - geometry.top) * geometry.zoom + 2.0 * inset,
        }
    }
}
