//! A single highlight overlay
//!
//! The box is placed once, at construction, from the find result geometry
//! and the chrome's viewport at that moment. It does not follow scrolling.

use crate::config::BorderWidths;
use crate::geometry::{FindResultGeometry, OverlayRect};
use crate::host::{Chrome, Overlay};
use std::sync::Arc;

pub struct HighlightBox {
    rect: OverlayRect,
    chrome: Arc<dyn Chrome>,
    overlay: Option<Box<dyn Overlay>>,
}

impl HighlightBox {
    pub fn new(geometry: FindResultGeometry, chrome: Arc<dyn Chrome>, border: &BorderWidths) -> Self {
        let viewport = chrome.content_viewport();
        let rect = OverlayRect::around(&geometry, &viewport, border);
        Self {
            rect,
            chrome,
            overlay: None,
        }
    }

    pub fn rect(&self) -> OverlayRect {
        self.rect
    }

    pub fn is_visible(&self) -> bool {
        self.overlay.is_some()
    }

    /// Open the overlay and start the pulse animation.
    pub fn show(&mut self) {
        if self.overlay.is_some() {
            return;
        }
        let mut overlay = self.chrome.open_overlay(self.rect);
        overlay.set_active(true);
        self.overlay = Some(overlay);
    }

    /// Stop the animation and close the overlay. Safe to call repeatedly.
    pub fn hide(&mut self) {
        if let Some(mut overlay) = self.overlay.take() {
            overlay.set_active(false);
            overlay.close();
        }
    }

    /// Release the box for good.
    pub fn dispose(mut self) {
        self.hide();
    }
}

impl Drop for HighlightBox {
    fn drop(&mut self) {
        self.hide();
    }
}

impl std::fmt::Debug for HighlightBox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HighlightBox")
            .field("rect", &self.rect)
            .field("visible", &self.is_visible())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::ViewportRect;
    use crate::host::{HeadlessChrome, OverlayEvent};

    fn geometry() -> FindResultGeometry {
        FindResultGeometry {
            top: 100.0,
            bottom: 120.0,
            view_origin_y: 0.0,
            zoom: 1.0,
        }
    }

    fn chrome() -> HeadlessChrome {
        HeadlessChrome::new(ViewportRect {
            screen_x: 0.0,
            width: 800.0,
        })
    }

    #[tokio::test]
    async fn test_show_places_overlay() {
        let chrome = chrome();
        let mut highlight = HighlightBox::new(geometry(), Arc::new(chrome.clone()), &BorderWidths::default());
        assert!(!highlight.is_visible());

        highlight.show();
        highlight.show();
        assert!(highlight.is_visible());
        assert_eq!(chrome.opened_count(), 1);
        assert_eq!(
            chrome.events(),
            vec![
                OverlayEvent::Opened {
                    overlay: 1,
                    rect: OverlayRect {
                        left: 0.0,
                        top: 96.0,
                        width: 800.0,
                        height: 28.0,
                    }
                },
                OverlayEvent::Activated { overlay: 1 },
            ]
        );
    }

    #[tokio::test]
    async fn test_hide_is_idempotent() {
        let chrome = chrome();
        let mut highlight = HighlightBox::new(geometry(), Arc::new(chrome.clone()), &BorderWidths::default());
        highlight.show();
        highlight.hide();
        highlight.hide();

        assert!(!highlight.is_visible());
        assert_eq!(chrome.visible_count(), 0);
        let closes = chrome
            .events()
            .iter()
            .filter(|e| matches!(e, OverlayEvent::Closed { .. }))
            .count();
        assert_eq!(closes, 1);
    }

    #[tokio::test]
    async fn test_rect_sampled_at_construction() {
        let chrome = chrome();
        let mut highlight = HighlightBox::new(geometry(), Arc::new(chrome.clone()), &BorderWidths::default());

        chrome.set_viewport(ViewportRect {
            screen_x: 300.0,
            width: 100.0,
        });
        highlight.show();
        assert_eq!(highlight.rect().left, 0.0);
        assert_eq!(highlight.rect().width, 800.0);
    }

    #[tokio::test]
    async fn test_dispose_closes_visible_overlay() {
        let chrome = chrome();
        let mut highlight = HighlightBox::new(geometry(), Arc::new(chrome.clone()), &BorderWidths::default());
        highlight.show();
        highlight.dispose();

        assert_eq!(chrome.visible_count(), 0);
        assert_eq!(
            chrome.events().last(),
            Some(&OverlayEvent::Closed { overlay: 1 })
        );
    }
}
