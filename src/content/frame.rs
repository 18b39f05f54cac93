//! Frame tree of a content page and the find-selection scan over it.

use crate::geometry::FindResultGeometry;
use serde::{Deserialize, Serialize};

/// Bounding rectangle of a selection range, in the owning frame's
/// document coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RangeRect {
    pub top: f64,
    pub bottom: f64,
    #[serde(default)]
    pub left: f64,
    #[serde(default)]
    pub right: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Selection {
    pub range_count: u32,
    pub collapsed: bool,
    /// Bounds of the first range, when there is one
    pub first_range: Option<RangeRect>,
}

impl Selection {
    /// Non-collapsed selection covering some text.
    pub fn around(rect: RangeRect) -> Self {
        Self {
            range_count: 1,
            collapsed: false,
            first_range: Some(rect),
        }
    }

    /// Caret-only selection.
    pub fn collapsed_at(rect: RangeRect) -> Self {
        Self {
            range_count: 1,
            collapsed: true,
            first_range: Some(rect),
        }
    }

    fn qualifying_range(&self) -> Option<RangeRect> {
        if self.collapsed || self.range_count == 0 {
            return None;
        }
        self.first_range
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ControlKind {
    Input,
    TextArea,
    Select,
    Button,
}

impl ControlKind {
    fn has_editor(&self) -> bool {
        matches!(self, ControlKind::Input | ControlKind::TextArea)
    }
}

/// A form control with its own internal editor selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditableControl {
    pub kind: ControlKind,
    #[serde(default)]
    pub selection: Option<Selection>,
}

/// One document in the page's frame hierarchy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Frame {
    pub name: String,
    /// Vertical screen origin of this frame's window
    pub screen_y: f64,
    pub zoom: f64,
    /// Default text selection of the window
    pub selection: Option<Selection>,
    /// Form controls in document order
    pub editables: Vec<EditableControl>,
    pub children: Vec<Frame>,
}

impl Default for Frame {
    fn default() -> Self {
        Self {
            name: String::new(),
            screen_y: 0.0,
            zoom: 1.0,
            selection: None,
            editables: Vec::new(),
            children: Vec::new(),
        }
    }
}

impl Frame {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_selection(mut self, selection: Selection) -> Self {
        self.selection = Some(selection);
        self
    }

    pub fn with_editable(mut self, control: EditableControl) -> Self {
        self.editables.push(control);
        self
    }

    pub fn with_child(mut self, child: Frame) -> Self {
        self.children.push(child);
        self
    }

    pub fn at(mut self, screen_y: f64, zoom: f64) -> Self {
        self.screen_y = screen_y;
        self.zoom = zoom;
        self
    }

    /// The window selection if it qualifies, otherwise the first editable
    /// control whose editor holds a qualifying selection.
    fn own_find_range(&self) -> Option<RangeRect> {
        if let Some(range) = self.selection.as_ref().and_then(Selection::qualifying_range) {
            return Some(range);
        }
        self.editables
            .iter()
            .filter(|control| control.kind.has_editor())
            .find_map(|control| control.selection.as_ref().and_then(Selection::qualifying_range))
    }
}

/// Locate the find selection in a frame tree.
///
/// Every sub-frame is searched before its parent's own selection, children
/// in document order, so the first qualifying frame in post-order wins.
pub fn locate_find_selection(top: &Frame) -> Option<FindResultGeometry> {
    // (frame, index of the next child to descend into)
    let mut stack: Vec<(&Frame, usize)> = vec![(top, 0)];

    while let Some((frame, next_child)) = stack.pop() {
        if let Some(child) = frame.children.get(next_child) {
            stack.push((frame, next_child + 1));
            stack.push((child, 0));
            continue;
        }

        if let Some(range) = frame.own_find_range() {
            log::trace!("Find selection located in frame '{}'", frame.name);
            return Some(FindResultGeometry {
                top: range.top,
                bottom: range.bottom,
                view_origin_y: frame.screen_y,
                zoom: frame.zoom,
            });
        }
    }

    None
}
