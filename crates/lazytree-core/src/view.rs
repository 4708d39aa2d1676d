#![forbid(unsafe_code)]

//! Render consumer output.
//!
//! A [`ViewFrame`] lists, in visual order, every node the renderer has to
//! instantiate, plus the two spacer heights that stand in for everything
//! else. Rows are collected top-down: at each expanded node only the
//! children selected by [`child_render_range`] are visited, so the cost is
//! proportional to the window and the tree depth, not to the tree size.

use std::ops::RangeInclusive;

use crate::occlusion::ViewportEdges;
use crate::path::TreePath;
use crate::spacer::SpacerHeights;
use crate::store::{LoadState, TreeNode, TreeStore};
use crate::viewport::{ClipMode, child_render_range};

/// How a row participates in the layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum RowKind {
    /// Drawn as one row of `node_height`.
    Row,
    /// Occluded ancestor of drawn rows. Its own row is covered by the top
    /// spacer; it is listed so the renderer can nest its children.
    Container,
}

/// Load status shown next to a node.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum NodeStatus {
    /// Nothing pending.
    Ready,
    /// Children requested; show a loading placeholder.
    Loading,
    /// The last load failed; show the reason and a retry affordance.
    Failed(String),
}

impl NodeStatus {
    #[must_use]
    pub fn of(load: &LoadState) -> Self {
        match load {
            LoadState::Loading { .. } => Self::Loading,
            LoadState::Failed { reason, .. } => Self::Failed(reason.clone()),
            LoadState::Unloaded | LoadState::Loaded => Self::Ready,
        }
    }
}

/// One instantiated node.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ViewRow {
    pub path: TreePath,
    pub label: String,
    /// Nesting level; top-level nodes are at depth 0.
    pub depth: usize,
    pub position: usize,
    pub expanded: bool,
    pub occluded: bool,
    pub kind: RowKind,
    pub status: NodeStatus,
}

/// Everything the renderer needs for one update.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ViewFrame {
    pub rows: Vec<ViewRow>,
    pub spacers: SpacerHeights,
    pub edges: ViewportEdges,
    /// Length of the flattened sequence.
    pub deployed_count: usize,
    /// Status of the root load, `None` before it is issued. Rows stay empty
    /// until it is `Ready`.
    pub root: Option<NodeStatus>,
}

impl ViewFrame {
    /// Rows that occupy vertical space.
    pub fn drawn_rows(&self) -> impl Iterator<Item = &ViewRow> {
        self.rows.iter().filter(|row| row.kind == RowKind::Row)
    }

    /// Rows whose own row intersects the viewport.
    pub fn visible_rows(&self) -> impl Iterator<Item = &ViewRow> {
        self.drawn_rows().filter(|row| !row.occluded)
    }
}

/// Collect the rows of `window` in visual order.
#[must_use]
pub fn collect_rows(
    store: &TreeStore,
    window: Option<RangeInclusive<usize>>,
    mode: ClipMode,
) -> Vec<ViewRow> {
    let mut rows = Vec::new();
    if let Some(window) = window {
        let mut prefix = Vec::new();
        collect(store.root(), &mut prefix, &window, mode, &mut rows);
    }
    rows
}

fn collect(
    node: &TreeNode,
    prefix: &mut Vec<usize>,
    window: &RangeInclusive<usize>,
    mode: ClipMode,
    out: &mut Vec<ViewRow>,
) {
    let children = node.children();
    let Some(range) = child_render_range(children, window, mode) else {
        return;
    };
    for index in range {
        let child = &children[index];
        prefix.push(index);
        let kind = if window.contains(&child.position()) {
            RowKind::Row
        } else {
            RowKind::Container
        };
        out.push(ViewRow {
            path: TreePath::from(prefix.as_slice()),
            label: child.label().to_string(),
            depth: prefix.len() - 1,
            position: child.position(),
            expanded: child.is_expanded(),
            occluded: child.is_occluded(),
            kind,
            status: NodeStatus::of(child.load_state()),
        });
        if child.is_expanded() && child.is_loaded() {
            collect(child, prefix, window, mode, out);
        }
        prefix.pop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flatten::flatten;
    use crate::occlusion::{ViewportGeometry, apply_occlusion, viewport_edges};
    use crate::spacer::spacer_heights;
    use crate::store::{NodeFlag, Update};

    fn windowed(store: &mut TreeStore, geometry: ViewportGeometry) -> Option<RangeInclusive<usize>> {
        let deployment = flatten(store);
        let flags = apply_occlusion(store, geometry, 10);
        viewport_edges(&flags).render_window(deployment.len())
    }

    #[test]
    fn rows_follow_visual_order() {
        let mut store = TreeStore::new();
        store.set_children(&TreePath::root(), ["A", "B", "C"], true);
        store
            .update(&TreePath::from([1]), |n| n.expanded = true)
            .unwrap();
        store.set_children(&TreePath::from([1]), ["X", "Y"], true);

        let window = windowed(&mut store, ViewportGeometry::new(0, 100));
        let rows = collect_rows(&store, window, ClipMode::SubtreeSpan);
        let keys: Vec<_> = rows.iter().map(|r| r.path.key()).collect();
        assert_eq!(keys, ["0", "1", "1-0", "1-1", "2"]);
        assert_eq!(rows[2].depth, 1);
        assert_eq!(rows[2].label, "X");
        assert!(rows.iter().all(|r| r.kind == RowKind::Row));
    }

    #[test]
    fn container_rows_for_occluded_ancestors() {
        let mut store = TreeStore::new();
        store.set_children(&TreePath::root(), ["big", "after"], true);
        store
            .update(&TreePath::from([0]), |n| n.expanded = true)
            .unwrap();
        store.set_children(&TreePath::from([0]), (0..50).map(|i| i.to_string()), true);

        // 10px rows, view [200, 230]: positions 20..=22 visible, 19 is the
        // overscan row.
        let window = windowed(&mut store, ViewportGeometry::new(200, 30));
        assert_eq!(window, Some(19..=22));

        let rows = collect_rows(&store, window.clone(), ClipMode::SubtreeSpan);
        assert_eq!(rows[0].path, TreePath::from([0]));
        assert_eq!(rows[0].kind, RowKind::Container);
        assert!(rows[0].occluded);
        let drawn: Vec<_> = rows
            .iter()
            .filter(|r| r.kind == RowKind::Row)
            .map(|r| r.position)
            .collect();
        assert_eq!(drawn, vec![19, 20, 21, 22]);

        let legacy = collect_rows(&store, window, ClipMode::OwnPosition);
        assert!(legacy.is_empty(), "own-position clipping misses the subtree");
    }

    #[test]
    fn loading_and_failed_status() {
        let mut store = TreeStore::from_root(
            TreeNode::default()
                .child(
                    TreeNode::new("a")
                        .with_deployed(true)
                        .with_expanded(true)
                        .with_load(LoadState::Loading { generation: 1 }),
                )
                .child(TreeNode::new("b").with_deployed(true).with_load(LoadState::Failed {
                    generation: 2,
                    reason: "offline".into(),
                })),
        );

        let window = windowed(&mut store, ViewportGeometry::new(0, 100));
        let rows = collect_rows(&store, window, ClipMode::default());
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].status, NodeStatus::Loading);
        assert!(rows[0].expanded);
        assert_eq!(rows[1].status, NodeStatus::Failed("offline".into()));
    }

    #[test]
    fn collapsed_subtree_is_not_visited() {
        let mut store = TreeStore::new();
        store.set_children(&TreePath::root(), ["a"], true);
        store.set_children(&TreePath::from([0]), ["hidden"], false);
        let window = windowed(&mut store, ViewportGeometry::new(0, 100));
        let rows = collect_rows(&store, window, ClipMode::default());
        assert_eq!(rows.len(), 1);
        assert!(!rows[0].expanded);
    }

    #[test]
    fn placeholder_writes_keep_rows_in_step_with_deployment() {
        let mut base = TreeStore::new();
        base.set_children(&TreePath::root(), ["a", "b"], true);
        let visible = base.write(&TreePath::from([5]), NodeFlag::Expanded, Update::Set(true));
        let hidden = base.write(&TreePath::from([0, 3]), NodeFlag::Expanded, Update::Set(true));

        for (mut store, deployed) in [(visible, 6), (hidden, 2)] {
            for geometry in [ViewportGeometry::new(0, 600), ViewportGeometry::new(15, 30)] {
                let deployment = flatten(&mut store);
                assert_eq!(deployment.len(), deployed);
                let flags = apply_occlusion(&mut store, geometry, 10);
                let edges = viewport_edges(&flags);
                let window = edges.render_window(deployment.len());
                let rows = collect_rows(&store, window.clone(), ClipMode::SubtreeSpan);

                let drawn: Vec<_> = rows
                    .iter()
                    .filter(|r| r.kind == RowKind::Row)
                    .map(|r| r.position)
                    .collect();
                let expected: Vec<_> = window.into_iter().flatten().collect();
                assert_eq!(drawn, expected);

                let spacers = spacer_heights(edges, deployment.len(), 10);
                let total = spacers.top + spacers.bottom + drawn.len() as u64 * 10;
                assert_eq!(total, deployment.len() as u64 * 10);
            }
        }
    }

    #[test]
    fn no_window_no_rows() {
        let store = TreeStore::new();
        assert!(collect_rows(&store, None, ClipMode::default()).is_empty());
    }
}
