#![forbid(unsafe_code)]

//! Expansion state machine.
//!
//! A [`TreeSession`] is the single owner of the tree state. Every mutation
//! goes through `&mut self`, so toggles, scrolls and load completions are
//! applied one turn at a time against a stable snapshot.
//!
//! Per-node states:
//!
//! ```text
//!   Unloaded ──toggle──▶ Loading ──success──▶ Expanded ◀──toggle──▶ Collapsed
//!      ▲                 │   │
//!      └────toggle───────┘   └──failure──▶ Failed ──toggle──▶ Loading
//! ```
//!
//! Loads are not callbacks: toggling an unloaded node returns a
//! [`LoadTicket`] carrying a generation number, and the result comes back
//! through [`TreeSession::complete`]. A completion whose generation no longer
//! matches the node (the load was cancelled, or superseded by a retry) is
//! rejected as stale.

use tracing::{debug, debug_span, trace, warn};

use crate::config::TreeConfig;
use crate::error::{LoadFailure, TreeError};
use crate::flatten::{Deployment, flatten};
use crate::occlusion::{ViewportEdges, ViewportGeometry, apply_occlusion, viewport_edges};
use crate::path::TreePath;
use crate::spacer::{SpacerHeights, spacer_heights};
use crate::store::{LoadState, TreeNode, TreeStore};
use crate::view::{NodeStatus, ViewFrame, collect_rows};

/// Identifies one in-flight child load.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LoadTicket {
    path: TreePath,
    generation: u64,
}

impl LoadTicket {
    /// Node whose children are requested.
    #[must_use]
    pub fn path(&self) -> &TreePath {
        &self.path
    }

    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// Result reported by a loader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    /// Child labels in sibling order.
    Loaded(Vec<String>),
    /// The load failed after delivering `partial` labels.
    Failed { partial: Vec<String>, reason: String },
}

/// Observable state of one node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpansionState {
    Unloaded,
    Loading,
    Expanded,
    Collapsed,
    Failed,
}

/// What a toggle did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToggleEffect {
    /// The path does not address a toggleable node.
    Ignored,
    /// Children must be fetched; hand the ticket to the loader.
    Load(LoadTicket),
    /// An in-flight load was abandoned and the node collapsed.
    Cancelled,
    /// Cached children were shown again.
    Expanded,
    /// The node's subtree was hidden.
    Collapsed,
}

/// What an accepted completion did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    /// Children were attached and the node expanded.
    Expanded { path: TreePath, children: usize },
    /// The node moved to the failed state.
    Failed(LoadFailure),
}

/// Single-owner tree session.
#[derive(Debug, Clone)]
pub struct TreeSession {
    config: TreeConfig,
    store: TreeStore,
    deployment: Deployment,
    geometry: ViewportGeometry,
    edges: ViewportEdges,
    spacers: SpacerHeights,
    next_generation: u64,
}

impl TreeSession {
    /// Create a session with an unloaded root.
    ///
    /// `config` must pass [`TreeConfig::validate`]: with zero-height rows
    /// or viewport every row counts as visible and the spacers stay empty.
    #[must_use]
    pub fn new(config: TreeConfig) -> Self {
        debug_assert!(
            config.validate().is_ok(),
            "invalid tree config: {:?}",
            config.validate()
        );
        Self {
            geometry: ViewportGeometry::new(0, config.panel_height),
            config,
            store: TreeStore::new(),
            deployment: Deployment::default(),
            edges: ViewportEdges::default(),
            spacers: SpacerHeights::default(),
            next_generation: 1,
        }
    }

    #[must_use]
    pub fn config(&self) -> &TreeConfig {
        &self.config
    }

    #[must_use]
    pub fn store(&self) -> &TreeStore {
        &self.store
    }

    /// A cheap immutable copy of the current tree.
    #[must_use]
    pub fn snapshot(&self) -> TreeStore {
        self.store.clone()
    }

    #[must_use]
    pub fn deployment(&self) -> &Deployment {
        &self.deployment
    }

    #[must_use]
    pub fn geometry(&self) -> ViewportGeometry {
        self.geometry
    }

    #[must_use]
    pub fn edges(&self) -> ViewportEdges {
        self.edges
    }

    #[must_use]
    pub fn spacers(&self) -> SpacerHeights {
        self.spacers
    }

    #[must_use]
    pub fn read(&self, path: &TreePath) -> Option<&TreeNode> {
        self.store.read(path)
    }

    /// State of the node at `path`, or `None` if it is unknown.
    #[must_use]
    pub fn state_of(&self, path: &TreePath) -> Option<ExpansionState> {
        let node = self.store.read(path)?;
        Some(match node.load_state() {
            LoadState::Unloaded => ExpansionState::Unloaded,
            LoadState::Loading { .. } => ExpansionState::Loading,
            LoadState::Failed { .. } => ExpansionState::Failed,
            LoadState::Loaded if node.is_expanded() => ExpansionState::Expanded,
            LoadState::Loaded => ExpansionState::Collapsed,
        })
    }

    /// Request the root's children. Returns `None` once the root is loading
    /// or loaded; after a failure it issues a retry.
    pub fn start(&mut self) -> Option<LoadTicket> {
        match self.store.root().load_state() {
            LoadState::Unloaded | LoadState::Failed { .. } => Some(self.issue(&TreePath::root())),
            LoadState::Loading { .. } | LoadState::Loaded => None,
        }
    }

    /// Toggle the node at `path`.
    pub fn toggle(&mut self, path: &TreePath) -> ToggleEffect {
        if path.is_root() {
            debug!("toggle ignored: the root is always expanded");
            return ToggleEffect::Ignored;
        }
        let Some(node) = self.store.read(path) else {
            debug!(path = %path, "toggle ignored: unknown node");
            return ToggleEffect::Ignored;
        };
        if !node.is_deployed() {
            debug!(path = %path, "toggle ignored: node is not deployed");
            return ToggleEffect::Ignored;
        }

        match node.load_state() {
            LoadState::Unloaded | LoadState::Failed { .. } => {
                let ticket = self.issue(path);
                ToggleEffect::Load(ticket)
            }
            LoadState::Loading { generation } => {
                debug!(path = %path, generation, "load cancelled");
                let node = self.store.node_mut(path);
                node.expanded = false;
                node.load = LoadState::Unloaded;
                ToggleEffect::Cancelled
            }
            LoadState::Loaded if node.is_expanded() => {
                let node = self.store.node_mut(path);
                node.expanded = false;
                node.undeploy_descendants();
                debug!(path = %path, "collapsed");
                self.refresh();
                ToggleEffect::Collapsed
            }
            LoadState::Loaded => {
                let node = self.store.node_mut(path);
                node.expanded = true;
                node.deploy_children();
                debug!(path = %path, "expanded from cache");
                self.refresh();
                ToggleEffect::Expanded
            }
        }
    }

    /// Apply the result of the load identified by `ticket`.
    pub fn complete(
        &mut self,
        ticket: &LoadTicket,
        outcome: LoadOutcome,
    ) -> Result<Completion, TreeError> {
        let path = ticket.path();
        let expected = LoadState::Loading {
            generation: ticket.generation,
        };
        let Some(node) = self
            .store
            .read(path)
            .filter(|node| node.load_state() == &expected)
        else {
            warn!(path = %path, generation = ticket.generation, "discarding stale completion");
            return Err(TreeError::StaleCompletion {
                path: path.clone(),
                generation: ticket.generation,
            });
        };
        let deployed = node.is_deployed();

        match outcome {
            LoadOutcome::Loaded(labels) => {
                let children = labels.len();
                self.store.set_children(path, labels, deployed);
                self.store.node_mut(path).expanded = true;
                debug!(path = %path, children, "children loaded");
                self.refresh();
                Ok(Completion::Expanded {
                    path: path.clone(),
                    children,
                })
            }
            LoadOutcome::Failed { partial, reason } => {
                warn!(path = %path, %reason, partial = partial.len(), "load failed");
                let node = self.store.node_mut(path);
                if !path.is_root() {
                    node.expanded = false;
                }
                node.load = LoadState::Failed {
                    generation: ticket.generation,
                    reason: reason.clone(),
                };
                Ok(Completion::Failed(LoadFailure {
                    path: path.clone(),
                    reason,
                    partial: partial.len(),
                }))
            }
        }
    }

    /// Record new viewport geometry and recompute the window.
    ///
    /// The tree shape is unchanged, so no flatten pass runs. Returns `None`
    /// when the spacers came out identical and suppression is enabled.
    pub fn scroll(&mut self, geometry: ViewportGeometry) -> Option<ViewFrame> {
        self.geometry = geometry;
        let changed = self.recompute_window();
        if !changed && self.config.suppress_unchanged_scroll {
            trace!(scroll = geometry.scroll_offset, "scroll: spacers unchanged");
            return None;
        }
        Some(self.frame())
    }

    /// Build the render output for the current state.
    #[must_use]
    pub fn frame(&self) -> ViewFrame {
        let total = self.deployment.len();
        let root = match self.store.root().load_state() {
            LoadState::Unloaded => None,
            load => Some(NodeStatus::of(load)),
        };
        ViewFrame {
            rows: collect_rows(
                &self.store,
                self.edges.render_window(total),
                self.config.clip_mode,
            ),
            spacers: self.spacers,
            edges: self.edges,
            deployed_count: total,
            root,
        }
    }

    fn issue(&mut self, path: &TreePath) -> LoadTicket {
        let generation = self.next_generation;
        self.next_generation += 1;
        let node = self.store.node_mut(path);
        if !path.is_root() {
            // Shown expanded with a loading placeholder until children arrive.
            node.expanded = true;
        }
        node.load = LoadState::Loading { generation };
        debug!(path = %path, generation, "load requested");
        LoadTicket {
            path: path.clone(),
            generation,
        }
    }

    /// Flatten, then recompute occlusion and spacers.
    fn refresh(&mut self) {
        let _span = debug_span!("refresh").entered();
        self.deployment = flatten(&mut self.store);
        self.recompute_window();
    }

    /// Returns whether the spacers changed.
    fn recompute_window(&mut self) -> bool {
        let flags = apply_occlusion(&mut self.store, self.geometry, self.config.node_height);
        self.edges = viewport_edges(&flags);
        let spacers = spacer_heights(self.edges, flags.len(), self.config.node_height);
        let changed = spacers != self.spacers;
        self.spacers = spacers;
        changed
    }
}
