#![forbid(unsafe_code)]

//! Tree state store.
//!
//! The store owns every node that has ever been loaded. It is a persistent
//! tree: children are held behind [`Arc`], and every write clones only the
//! nodes along the written path (`Arc::make_mut`). A store returned by
//! [`TreeStore::write`] therefore shares all untouched subtrees with the
//! store it was derived from, and both remain valid snapshots.
//!
//! Writing to a path that does not exist yet creates placeholder nodes on
//! the way down. This allows optimistic writes, such as marking a node
//! expanded before its children have arrived.
//!
//! # Example
//!
//! ```
//! use lazytree_core::path::TreePath;
//! use lazytree_core::store::{NodeFlag, TreeStore, Update};
//!
//! let mut store = TreeStore::new();
//! store.set_children(&TreePath::root(), ["a", "b"], true);
//!
//! let next = store.write(&TreePath::from([1]), NodeFlag::Expanded, Update::Toggle);
//! assert!(next.read(&TreePath::from([1])).unwrap().is_expanded());
//! assert!(!store.read(&TreePath::from([1])).unwrap().is_expanded());
//! ```

use std::sync::Arc;

use tracing::debug;

use crate::error::TreeError;
use crate::path::TreePath;

/// Fetch state of a node's own children.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum LoadState {
    /// Children have never been requested.
    #[default]
    Unloaded,
    /// A load is in flight; only a completion carrying `generation` applies.
    Loading { generation: u64 },
    /// Children are cached on the node.
    Loaded,
    /// The last load attempt failed.
    Failed { generation: u64, reason: String },
}

impl LoadState {
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        matches!(self, Self::Loaded)
    }

    #[must_use]
    pub fn is_loading(&self) -> bool {
        matches!(self, Self::Loading { .. })
    }
}

/// Boolean node fields addressable through [`TreeStore::write`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeFlag {
    Expanded,
    Deployed,
    Occluded,
}

/// A write applied to a [`NodeFlag`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Update {
    Set(bool),
    Toggle,
}

impl Update {
    #[must_use]
    pub fn apply(self, current: bool) -> bool {
        match self {
            Self::Set(value) => value,
            Self::Toggle => !current,
        }
    }
}

/// A node in the tree hierarchy.
#[derive(Debug, Clone, Default)]
pub struct TreeNode {
    label: String,
    pub(crate) children: Vec<Arc<TreeNode>>,
    pub(crate) expanded: bool,
    pub(crate) deployed: bool,
    pub(crate) position: usize,
    pub(crate) subtree_end: usize,
    pub(crate) occluded: bool,
    pub(crate) load: LoadState,
}

impl TreeNode {
    /// Create an unloaded, collapsed, undeployed node.
    #[must_use]
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            ..Self::default()
        }
    }

    /// Add a child node. Marks this node as loaded.
    #[must_use]
    pub fn child(mut self, node: TreeNode) -> Self {
        self.children.push(Arc::new(node));
        self.load = LoadState::Loaded;
        self
    }

    #[must_use]
    pub fn with_expanded(mut self, expanded: bool) -> Self {
        self.expanded = expanded;
        self
    }

    #[must_use]
    pub fn with_deployed(mut self, deployed: bool) -> Self {
        self.deployed = deployed;
        self
    }

    #[must_use]
    pub fn with_load(mut self, load: LoadState) -> Self {
        self.load = load;
        self
    }

    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    #[must_use]
    pub fn children(&self) -> &[Arc<TreeNode>] {
        &self.children
    }

    #[must_use]
    pub fn child_at(&self, index: usize) -> Option<&TreeNode> {
        self.children.get(index).map(Arc::as_ref)
    }

    #[must_use]
    pub fn is_expanded(&self) -> bool {
        self.expanded
    }

    #[must_use]
    pub fn is_deployed(&self) -> bool {
        self.deployed
    }

    #[must_use]
    pub fn is_occluded(&self) -> bool {
        self.occluded
    }

    /// Flattened position. Only meaningful right after a flatten pass.
    #[must_use]
    pub fn position(&self) -> usize {
        self.position
    }

    /// Position of the last deployed node in this node's subtree.
    #[must_use]
    pub fn subtree_end(&self) -> usize {
        self.subtree_end
    }

    #[must_use]
    pub fn load_state(&self) -> &LoadState {
        &self.load
    }

    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.load.is_loaded()
    }

    #[must_use]
    pub fn flag(&self, flag: NodeFlag) -> bool {
        match flag {
            NodeFlag::Expanded => self.expanded,
            NodeFlag::Deployed => self.deployed,
            NodeFlag::Occluded => self.occluded,
        }
    }

    fn flag_mut(&mut self, flag: NodeFlag) -> &mut bool {
        match flag {
            NodeFlag::Expanded => &mut self.expanded,
            NodeFlag::Deployed => &mut self.deployed,
            NodeFlag::Occluded => &mut self.occluded,
        }
    }

    /// Count this node and every node below it.
    #[must_use]
    pub fn subtree_len(&self) -> usize {
        1 + self
            .children
            .iter()
            .map(|child| child.subtree_len())
            .sum::<usize>()
    }

    /// Mark every descendant undeployed.
    ///
    /// Stops at children that are already undeployed: their own
    /// descendants cannot be deployed.
    pub(crate) fn undeploy_descendants(&mut self) {
        for child in &mut self.children {
            if !child.deployed {
                continue;
            }
            let child = Arc::make_mut(child);
            child.deployed = false;
            child.undeploy_descendants();
        }
    }

    /// Mark the immediate children deployed, then redeploy the subtree of
    /// every child that was left expanded.
    pub(crate) fn deploy_children(&mut self) {
        for child in &mut self.children {
            let child = Arc::make_mut(child);
            child.deployed = true;
            if child.expanded {
                child.deploy_children();
            }
        }
    }
}

/// Persistent store of the full known tree.
#[derive(Debug, Clone)]
pub struct TreeStore {
    root: Arc<TreeNode>,
}

impl Default for TreeStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TreeStore {
    /// Create a store holding an unloaded root.
    #[must_use]
    pub fn new() -> Self {
        Self::from_root(TreeNode::default())
    }

    /// Create a store from a prebuilt tree. The root is always deployed and
    /// expanded.
    #[must_use]
    pub fn from_root(mut root: TreeNode) -> Self {
        root.deployed = true;
        root.expanded = true;
        Self {
            root: Arc::new(root),
        }
    }

    #[must_use]
    pub fn root(&self) -> &TreeNode {
        &self.root
    }

    /// Read the node at `path`.
    #[must_use]
    pub fn read(&self, path: &TreePath) -> Option<&TreeNode> {
        let mut node: &TreeNode = &self.root;
        for &index in path.indices() {
            node = &**node.children.get(index)?;
        }
        Some(node)
    }

    /// Return a new store with `flag` of the node at `path` updated.
    ///
    /// The root is not writable through this method; passing the root path
    /// returns an unchanged store.
    #[must_use]
    pub fn write(&self, path: &TreePath, flag: NodeFlag, update: Update) -> Self {
        self.write_with(path, |node| {
            let slot = node.flag_mut(flag);
            *slot = update.apply(*slot);
        })
    }

    /// Return a new store with `transform` applied to the node at `path`.
    #[must_use]
    pub fn write_with(&self, path: &TreePath, transform: impl FnOnce(&mut TreeNode)) -> Self {
        let mut next = self.clone();
        if let Err(err) = next.update(path, transform) {
            debug!(%err, "ignored write");
        }
        next
    }

    /// Return a new store with `flag` updated on every immediate child of
    /// `parent`. The root is a valid parent.
    #[must_use]
    pub fn write_all_children(&self, parent: &TreePath, flag: NodeFlag, update: Update) -> Self {
        let mut next = self.clone();
        next.update_all_children(parent, flag, update);
        next
    }

    /// Apply `transform` to the node at `path` in place.
    pub fn update(
        &mut self,
        path: &TreePath,
        transform: impl FnOnce(&mut TreeNode),
    ) -> Result<(), TreeError> {
        if path.is_root() {
            return Err(TreeError::MalformedPath {
                path: path.clone(),
                operation: "write",
            });
        }
        transform(self.node_mut(path));
        Ok(())
    }

    /// Update `flag` on every immediate child of `parent` in place.
    pub fn update_all_children(&mut self, parent: &TreePath, flag: NodeFlag, update: Update) {
        for child in &mut self.node_mut(parent).children {
            let child = Arc::make_mut(child);
            let slot = child.flag_mut(flag);
            *slot = update.apply(*slot);
        }
    }

    /// Replace the children of `parent` with one fresh node per label, in
    /// order, and mark `parent` loaded.
    pub fn set_children<I, S>(&mut self, parent: &TreePath, labels: I, deployed: bool)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let node = self.node_mut(parent);
        node.children = labels
            .into_iter()
            .map(|label| Arc::new(TreeNode::new(label).with_deployed(deployed)))
            .collect();
        node.load = LoadState::Loaded;
    }

    /// Mutable access to the node at `path`, creating placeholders for any
    /// missing node along the way.
    ///
    /// A placeholder is deployed iff its parent is deployed, expanded and
    /// loaded, so siblings always agree on deployment.
    pub(crate) fn node_mut(&mut self, path: &TreePath) -> &mut TreeNode {
        let mut node = Arc::make_mut(&mut self.root);
        for &index in path.indices() {
            if node.children.len() <= index {
                let deployed = node.deployed && node.expanded && node.is_loaded();
                node.children.resize_with(index + 1, || {
                    Arc::new(TreeNode::default().with_deployed(deployed))
                });
            }
            node = Arc::make_mut(&mut node.children[index]);
        }
        node
    }

    pub(crate) fn root_mut(&mut self) -> &mut TreeNode {
        Arc::make_mut(&mut self.root)
    }

    /// Whether `self` and `other` share the same allocation at `path`.
    #[must_use]
    pub fn shares_node(&self, other: &TreeStore, path: &TreePath) -> bool {
        fn arc_at<'a>(root: &'a Arc<TreeNode>, path: &TreePath) -> Option<&'a Arc<TreeNode>> {
            let mut node = root;
            for &index in path.indices() {
                node = node.children.get(index)?;
            }
            Some(node)
        }
        match (arc_at(&self.root, path), arc_at(&other.root, path)) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Number of known nodes, excluding the root.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.root.subtree_len() - 1
    }
}
