#![forbid(unsafe_code)]

//! Spacer sizing.
//!
//! Occluded rows are not instantiated; two blank spacers stand in for them
//! so the scrollable extent matches a fully rendered tree.

use crate::occlusion::ViewportEdges;

/// Blank space above and below the instantiated rows, in pixels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct SpacerHeights {
    pub top: u64,
    pub bottom: u64,
}

impl SpacerHeights {
    /// Combined height of both spacers.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.top + self.bottom
    }
}

/// Size the spacers for a sequence of `total` deployed nodes.
#[must_use]
pub fn spacer_heights(edges: ViewportEdges, total: usize, node_height: u32) -> SpacerHeights {
    let height = u64::from(node_height);
    let top = match edges.last_occluded_above {
        Some(above) if above > 0 => above as u64 * height,
        _ => 0,
    };
    let bottom = if edges.first_occluded_below < total {
        (total - edges.first_occluded_below) as u64 * height
    } else {
        0
    };
    SpacerHeights { top, bottom }
}
