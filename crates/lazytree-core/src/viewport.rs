#![forbid(unsafe_code)]

//! Child clipping.
//!
//! When a node is instantiated, only the children that reach into the
//! render window are instantiated with it. Sibling positions increase with
//! sibling index and their subtrees occupy disjoint, ordered position
//! blocks, so the boundary children can be found by binary search instead
//! of scanning every child.

use std::ops::RangeInclusive;
use std::sync::Arc;

use crate::store::TreeNode;

/// How the lower clip boundary treats a child's descendants.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum ClipMode {
    /// Compare each child's own position only.
    ///
    /// A child whose own row lies above the window is skipped together
    /// with its subtree, even when some of its descendants are visible.
    OwnPosition,
    /// Compare each child's subtree span, so that an occluded ancestor of a
    /// visible row is still instantiated as a container.
    #[default]
    SubtreeSpan,
}

impl ClipMode {
    /// Parse `own` or `span` (also the long variant names).
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "own" | "own-position" | "ownposition" => Some(Self::OwnPosition),
            "span" | "subtree-span" | "subtreespan" => Some(Self::SubtreeSpan),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::OwnPosition => "own",
            Self::SubtreeSpan => "span",
        }
    }
}

/// Last index in `0..len` for which `pred` holds.
///
/// `pred` must be monotonic: true on a (possibly empty) prefix, false
/// afterwards. Closed-interval search; the midpoint rounds toward the high
/// end so the interval always shrinks.
#[must_use]
pub fn search_last(len: usize, mut pred: impl FnMut(usize) -> bool) -> Option<usize> {
    if len == 0 {
        return None;
    }
    let (mut lo, mut hi) = (0, len - 1);
    while lo < hi {
        let mid = lo + (hi - lo).div_ceil(2);
        if pred(mid) {
            lo = mid;
        } else {
            hi = mid - 1;
        }
    }
    pred(lo).then_some(lo)
}

/// Indices of the children of an expanded node that must be instantiated
/// for the render `window`, or `None` when no child reaches into it.
///
/// All `children` must be deployed with current positions.
#[must_use]
pub fn child_render_range(
    children: &[Arc<TreeNode>],
    window: &RangeInclusive<usize>,
    mode: ClipMode,
) -> Option<RangeInclusive<usize>> {
    let (start, end) = (*window.start(), *window.end());
    let before = |i: usize| {
        let child = &children[i];
        match mode {
            ClipMode::OwnPosition => child.position < start,
            ClipMode::SubtreeSpan => child.subtree_end < start,
        }
    };
    let first = search_last(children.len(), before).map_or(0, |i| i + 1);
    let last = search_last(children.len(), |i| children[i].position <= end)?;
    (first <= last).then_some(first..=last)
}
