#![forbid(unsafe_code)]

//! Occlusion and viewport edges.
//!
//! Every deployed node occupies one row of `node_height` pixels at
//! `position * node_height`. A node is occluded when its row, inset by one
//! pixel at each end, does not intersect the viewport
//! `[scroll_offset, scroll_offset + panel_height]`. The inset keeps a node
//! whose edge merely touches the viewport edge from flickering in and out.
//!
//! Occlusion is unimodal along position order: a run of occluded nodes
//! above the viewport, a visible run, then occluded nodes below. The
//! boundaries of that run are captured by [`ViewportEdges`].

use std::ops::RangeInclusive;
use std::sync::Arc;

use tracing::trace;

use crate::store::{TreeNode, TreeStore};

/// Scroll state reported by the viewport host, in pixels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ViewportGeometry {
    pub scroll_offset: u32,
    pub panel_height: u32,
}

impl ViewportGeometry {
    #[must_use]
    pub const fn new(scroll_offset: u32, panel_height: u32) -> Self {
        Self {
            scroll_offset,
            panel_height,
        }
    }

    /// Same panel, different scroll offset.
    #[must_use]
    pub const fn scrolled_to(self, scroll_offset: u32) -> Self {
        Self {
            scroll_offset,
            ..self
        }
    }
}

/// Whether the node at `position` lies entirely outside the viewport.
#[must_use]
pub fn is_occluded(position: usize, node_height: u32, scroll_offset: u32, panel_height: u32) -> bool {
    let height = u64::from(node_height);
    let row_start = (position as u64).saturating_mul(height);
    let node_top = row_start.saturating_add(1);
    let node_bottom = row_start.saturating_add(height).saturating_sub(1);
    let view_top = u64::from(scroll_offset);
    let view_bottom = view_top + u64::from(panel_height);
    view_bottom < node_top || node_bottom < view_top
}

/// Recompute the occluded flag of every deployed node.
///
/// Positions must be current (a flatten pass has run since the last shape
/// change). Returns the flags in position order.
pub fn apply_occlusion(
    store: &mut TreeStore,
    geometry: ViewportGeometry,
    node_height: u32,
) -> Vec<bool> {
    fn walk(node: &mut TreeNode, geometry: ViewportGeometry, node_height: u32, out: &mut Vec<bool>) {
        for child in &mut node.children {
            if !child.deployed {
                continue;
            }
            let occluded = occluded_at(child, geometry, node_height);
            out.push(occluded);
            let mark = out.len();
            // Untouched subtrees stay shared with earlier snapshots.
            if child.occluded == occluded && flags_current(child, geometry, node_height, out) {
                continue;
            }
            out.truncate(mark);
            let child = Arc::make_mut(child);
            child.occluded = occluded;
            walk(child, geometry, node_height, out);
        }
    }

    fn flags_current(
        node: &TreeNode,
        geometry: ViewportGeometry,
        node_height: u32,
        out: &mut Vec<bool>,
    ) -> bool {
        for child in &node.children {
            if !child.deployed {
                continue;
            }
            let occluded = occluded_at(child, geometry, node_height);
            if child.occluded != occluded {
                return false;
            }
            out.push(occluded);
            if !flags_current(child, geometry, node_height, out) {
                return false;
            }
        }
        true
    }

    fn occluded_at(node: &TreeNode, geometry: ViewportGeometry, node_height: u32) -> bool {
        is_occluded(
            node.position,
            node_height,
            geometry.scroll_offset,
            geometry.panel_height,
        )
    }

    let mut flags = Vec::new();
    walk(store.root_mut(), geometry, node_height, &mut flags);
    trace!(
        nodes = flags.len(),
        scroll = geometry.scroll_offset,
        panel = geometry.panel_height,
        "occlusion pass complete"
    );
    flags
}

/// Boundaries of the visible run in the flattened sequence.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ViewportEdges {
    /// Index of the last node occluded above the viewport; `None` when the
    /// first node is visible.
    pub last_occluded_above: Option<usize>,
    /// Index of the first node occluded below the viewport; equals the
    /// sequence length when nothing is occluded below.
    pub first_occluded_below: usize,
}

impl ViewportEdges {
    /// Positions that must be instantiated for a sequence of `total` nodes.
    ///
    /// The window starts at the last occluded-above node (one overscan row)
    /// and ends right before the first occluded-below node. Together with
    /// [`spacer_heights`](crate::spacer::spacer_heights) it accounts for every
    /// deployed node exactly once.
    #[must_use]
    pub fn render_window(&self, total: usize) -> Option<RangeInclusive<usize>> {
        if total == 0 {
            return None;
        }
        let start = self.last_occluded_above.unwrap_or(0);
        let end = self.first_occluded_below.min(total).checked_sub(1)?;
        (start <= end).then_some(start..=end)
    }
}

/// Scan occlusion flags in position order for the visible run boundaries.
#[must_use]
pub fn viewport_edges(flags: &[bool]) -> ViewportEdges {
    let mut i = 0;
    while i < flags.len() && flags[i] {
        i += 1;
    }
    let last_occluded_above = i.checked_sub(1);
    while i < flags.len() && !flags[i] {
        i += 1;
    }
    ViewportEdges {
        last_occluded_above,
        first_occluded_below: i,
    }
}
