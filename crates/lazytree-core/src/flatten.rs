#![forbid(unsafe_code)]

//! Deployment ordering.
//!
//! Flattening walks the store depth-first in pre-order, starting at the
//! root's children and entering only deployed nodes. Each node is followed
//! immediately by its own deployed subtree, then by its next sibling. This
//! is the visual stacking order, and it makes the positions of any node's
//! subtree a contiguous increasing block, which the windowing math relies on.

use std::sync::Arc;

use tracing::{debug_span, trace};

use crate::path::TreePath;
use crate::store::{TreeNode, TreeStore};

/// The ordered sequence of deployed nodes produced by one flatten pass.
///
/// `paths()[i]` is the node whose `position` is `i`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Deployment {
    paths: Vec<TreePath>,
}

impl Deployment {
    #[must_use]
    pub fn len(&self) -> usize {
        self.paths.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    #[must_use]
    pub fn paths(&self) -> &[TreePath] {
        &self.paths
    }

    /// Path of the node at `position`.
    #[must_use]
    pub fn path_at(&self, position: usize) -> Option<&TreePath> {
        self.paths.get(position)
    }

    /// Position of `path` in this deployment, if it is deployed.
    ///
    /// Paths are emitted in pre-order, which is also their `Ord` order, so
    /// this is a binary search.
    #[must_use]
    pub fn position_of(&self, path: &TreePath) -> Option<usize> {
        self.paths.binary_search(path).ok()
    }
}

/// Flatten the store and assign `position` and `subtree_end` to every
/// emitted node in the same pass.
pub fn flatten(store: &mut TreeStore) -> Deployment {
    let _span = debug_span!("flatten").entered();
    let mut paths = Vec::new();
    let mut prefix = Vec::new();
    assign(store.root_mut(), &mut prefix, &mut paths);
    trace!(deployed = paths.len(), "flatten pass complete");
    Deployment { paths }
}

fn assign(node: &mut TreeNode, prefix: &mut Vec<usize>, out: &mut Vec<TreePath>) {
    for (index, child) in node.children.iter_mut().enumerate() {
        if !child.deployed {
            continue;
        }
        prefix.push(index);
        let mark = out.len();
        if !collect_current(child, prefix, out) {
            out.truncate(mark);
            let child = Arc::make_mut(child);
            child.position = out.len();
            out.push(TreePath::from(prefix.as_slice()));
            assign(child, prefix, out);
            child.subtree_end = out.len() - 1;
        }
        prefix.pop();
    }
}

/// Emit the paths of an already laid-out subtree without copying it.
///
/// Returns `false` as soon as a stored position disagrees with the one the
/// node would get now; the caller then discards what was pushed.
fn collect_current(node: &TreeNode, prefix: &mut Vec<usize>, out: &mut Vec<TreePath>) -> bool {
    if node.position != out.len() {
        return false;
    }
    out.push(TreePath::from(prefix.as_slice()));
    for (index, child) in node.children.iter().enumerate() {
        if !child.deployed {
            continue;
        }
        prefix.push(index);
        let current = collect_current(child, prefix, out);
        prefix.pop();
        if !current {
            return false;
        }
    }
    node.subtree_end == out.len() - 1
}

/// The deployed paths of `store` in flatten order, without touching it.
#[cfg(test)]
fn deployed_paths(store: &TreeStore) -> Vec<TreePath> {
    fn walk(node: &TreeNode, prefix: &mut Vec<usize>, out: &mut Vec<TreePath>) {
        for (index, child) in node.children().iter().enumerate() {
            if !child.is_deployed() {
                continue;
            }
            prefix.push(index);
            out.push(TreePath::from(prefix.as_slice()));
            walk(child, prefix, out);
            prefix.pop();
        }
    }

    let mut out = Vec::new();
    walk(store.root(), &mut Vec::new(), &mut out);
    out
}
