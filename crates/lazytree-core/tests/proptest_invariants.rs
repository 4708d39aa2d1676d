//! Property-based invariant tests for the tree engine.
//!
//! Random sequences of toggles, load completions and scrolls are applied to
//! a [`TreeSession`]; after every step the structural invariants must hold:
//!
//! 1. A deployed node's parent is deployed and expanded.
//! 2. The flattened sequence is the pre-order of deployed nodes, and each
//!    node's position is its index in it.
//! 3. Occlusion flags match the pixel geometry and form one visible run.
//! 4. Spacers plus the render window account for every deployed node.
//! 5. The frame draws exactly the render window, in position order.
//!
//! Standalone properties cover occlusion, binary search, toggle round
//! trips and clip-mode agreement on flat trees.

use lazytree_core::{
    ClipMode, LoadOutcome, LoadTicket, RowKind, ToggleEffect, TreeConfig, TreeNode, TreePath,
    TreeSession, ViewportGeometry, is_occluded, search_last,
};
use proptest::prelude::*;

// ── Helpers ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
enum Op {
    Toggle(usize),
    Resolve {
        pick: usize,
        children: usize,
        fail: bool,
    },
    Scroll(u32),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => (0usize..256).prop_map(Op::Toggle),
        3 => (0usize..8, 0usize..6, prop::bool::weighted(0.2)).prop_map(|(pick, children, fail)| {
            Op::Resolve { pick, children, fail }
        }),
        2 => (0u32..2000).prop_map(Op::Scroll),
    ]
}

fn config_strategy() -> impl Strategy<Value = TreeConfig> {
    (1u32..50, 1u32..400).prop_map(|(node_height, panel_height)| {
        TreeConfig::default()
            .with_node_height(node_height)
            .with_panel_height(panel_height)
    })
}

fn labels(path: &TreePath, count: usize) -> LoadOutcome {
    LoadOutcome::Loaded((0..count).map(|i| format!("{path}:{i}")).collect())
}

fn run(session: &mut TreeSession, pending: &mut Vec<LoadTicket>, op: &Op) {
    match *op {
        Op::Toggle(i) => {
            let paths = session.deployment().paths();
            if paths.is_empty() {
                return;
            }
            let path = paths[i % paths.len()].clone();
            if let ToggleEffect::Load(ticket) = session.toggle(&path) {
                pending.push(ticket);
            }
        }
        Op::Resolve {
            pick,
            children,
            fail,
        } => {
            if pending.is_empty() {
                return;
            }
            let ticket = pending.remove(pick % pending.len());
            let outcome = if fail {
                LoadOutcome::Failed {
                    partial: Vec::new(),
                    reason: "boom".into(),
                }
            } else {
                labels(ticket.path(), children)
            };
            // Stale tickets are expected after cancels.
            let _ = session.complete(&ticket, outcome);
        }
        Op::Scroll(offset) => {
            let geometry = session.geometry().scrolled_to(offset);
            let _ = session.scroll(geometry);
        }
    }
}

fn started(config: TreeConfig, roots: usize) -> (TreeSession, Vec<LoadTicket>) {
    let mut session = TreeSession::new(config);
    let Some(ticket) = session.start() else {
        unreachable!("fresh session issues a root load");
    };
    session
        .complete(&ticket, labels(&TreePath::root(), roots))
        .expect("root completion");
    (session, Vec::new())
}

fn expected_preorder(
    node: &TreeNode,
    prefix: &mut Vec<usize>,
    out: &mut Vec<TreePath>,
) -> Result<(), TestCaseError> {
    let parent_open = node.is_deployed() && node.is_expanded();
    for (index, child) in node.children().iter().enumerate() {
        prefix.push(index);
        if child.is_deployed() {
            prop_assert!(parent_open, "deployed child under closed parent: {:?}", prefix);
            out.push(TreePath::from(prefix.as_slice()));
        }
        expected_preorder(child, prefix, out)?;
        prefix.pop();
    }
    Ok(())
}

fn check_invariants(session: &TreeSession) -> Result<(), TestCaseError> {
    let store = session.store();
    let config = session.config();
    let geometry = session.geometry();
    let h = u64::from(config.node_height);

    // 1 + 2: deployment is the pre-order of deployed nodes.
    let mut expected = Vec::new();
    expected_preorder(store.root(), &mut Vec::new(), &mut expected)?;
    let paths = session.deployment().paths();
    prop_assert_eq!(paths, expected.as_slice());
    for pair in paths.windows(2) {
        prop_assert!(pair[0] < pair[1], "not pre-order: {:?}", pair);
    }

    // 3: occlusion.
    let mut flags = Vec::with_capacity(paths.len());
    for (position, path) in paths.iter().enumerate() {
        let node = store.read(path).expect("deployed path resolves");
        prop_assert_eq!(node.position(), position);
        let occluded = is_occluded(
            position,
            config.node_height,
            geometry.scroll_offset,
            geometry.panel_height,
        );
        prop_assert_eq!(node.is_occluded(), occluded, "position {}", position);
        flags.push(occluded);
    }
    let edges = session.edges();
    if let Some(above) = edges.last_occluded_above {
        prop_assert!(flags[..=above].iter().all(|&f| f));
    }
    prop_assert!(flags[edges.first_occluded_below..].iter().all(|&f| f));

    // 4: height conservation.
    let total = paths.len();
    let spacers = session.spacers();
    prop_assert_eq!(spacers.top % h, 0);
    prop_assert_eq!(spacers.bottom % h, 0);
    let window = edges.render_window(total);
    let window_rows = window.as_ref().map_or(0, |w| w.end() - w.start() + 1) as u64;
    prop_assert_eq!(spacers.top / h + window_rows + spacers.bottom / h, total as u64);

    // 5: frame draws the window.
    let frame = session.frame();
    let drawn: Vec<usize> = frame.drawn_rows().map(|row| row.position).collect();
    let wanted: Vec<usize> = window.map(|w| w.collect()).unwrap_or_default();
    prop_assert_eq!(&drawn, &wanted);
    for pair in frame.rows.windows(2) {
        prop_assert!(pair[0].position < pair[1].position);
        if pair[0].kind == RowKind::Container {
            prop_assert!(pair[0].path.is_ancestor_of(&pair[1].path));
        }
    }
    for row in frame.visible_rows() {
        prop_assert!(!flags[row.position]);
    }
    Ok(())
}

// ═════════════════════════════════════════════════════════════════════════
// 1-5. Invariants hold after every step
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn session_invariants_hold(
        config in config_strategy(),
        roots in 0usize..12,
        ops in prop::collection::vec(op_strategy(), 0..60),
    ) {
        let (mut session, mut pending) = started(config, roots);
        check_invariants(&session)?;
        for op in &ops {
            run(&mut session, &mut pending, op);
            check_invariants(&session)?;
        }
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 6. Toggling a loaded node twice restores the deployment
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn double_toggle_round_trips(
        roots in 1usize..8,
        ops in prop::collection::vec(op_strategy(), 0..40),
        pick in any::<usize>(),
    ) {
        let (mut session, mut pending) = started(TreeConfig::default(), roots);
        for op in &ops {
            run(&mut session, &mut pending, op);
        }
        let loaded: Vec<TreePath> = session
            .deployment()
            .paths()
            .iter()
            .filter(|path| session.read(path).is_some_and(TreeNode::is_loaded))
            .cloned()
            .collect();
        prop_assume!(!loaded.is_empty());
        let target = loaded[pick % loaded.len()].clone();

        let before = session.deployment().clone();
        let expanded_before = session.read(&target).map(TreeNode::is_expanded);
        session.toggle(&target);
        session.toggle(&target);
        prop_assert_eq!(session.deployment(), &before);
        prop_assert_eq!(session.read(&target).map(TreeNode::is_expanded), expanded_before);
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 7. Visible positions form one contiguous run
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn visible_positions_are_contiguous(
        node_height in 1u32..100,
        scroll in 0u32..100_000,
        panel in 0u32..5_000,
    ) {
        let visible: Vec<usize> = (0..2_000)
            .filter(|&p| !is_occluded(p, node_height, scroll, panel))
            .collect();
        for pair in visible.windows(2) {
            prop_assert_eq!(pair[0] + 1, pair[1]);
        }
    }
}

proptest! {
    #[test]
    fn occluded_iff_row_interior_misses_viewport(
        position in 0usize..10_000,
        node_height in 2u32..100,
        scroll in 0u32..1_000_000,
        panel in 0u32..5_000,
    ) {
        let h = u64::from(node_height);
        let row_top = position as u64 * h;
        let view = u64::from(scroll)..=u64::from(scroll) + u64::from(panel);
        let overlaps = (row_top + 1..row_top + h).any(|px| view.contains(&px));
        prop_assert_eq!(is_occluded(position, node_height, scroll, panel), !overlaps);
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 8. Binary search agrees with a linear scan
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn search_last_matches_linear_scan(
        mut values in prop::collection::vec(0u32..1_000, 0..200),
        threshold in 0u32..1_000,
    ) {
        values.sort_unstable();
        let linear = values.iter().rposition(|&v| v <= threshold);
        prop_assert_eq!(search_last(values.len(), |i| values[i] <= threshold), linear);
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 9. Clip modes agree on a flat tree
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn clip_modes_agree_without_nesting(
        roots in 0usize..500,
        scroll in 0u32..20_000,
        panel in 1u32..1_000,
    ) {
        let frame_for = |mode: ClipMode| {
            let config = TreeConfig::default()
                .with_clip_mode(mode)
                .with_panel_height(panel)
                .with_suppress_unchanged_scroll(false);
            let (mut session, _) = started(config, roots);
            session.scroll(ViewportGeometry::new(scroll, panel))
        };
        let own = frame_for(ClipMode::OwnPosition);
        let span = frame_for(ClipMode::SubtreeSpan);
        prop_assert_eq!(own, span);
    }
}
