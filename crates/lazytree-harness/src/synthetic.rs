#![forbid(unsafe_code)]

//! Deterministic synthetic loader.
//!
//! Child counts are derived from the seed and the path, so the same
//! command line always produces the same tree. Top-level nodes get up to
//! `max_top` children, every deeper node up to `max_children`; each node
//! has at least one child.

use std::thread;
use std::time::Duration;

use lazytree_core::{LoadReply, Loader, TreePath};
use tracing::debug;

/// Slowest simulated answer, in children worth of delay.
const MAX_DELAY_CHILDREN: u64 = 10;

#[derive(Debug, Clone)]
pub struct SyntheticLoader {
    seed: u64,
    max_top: usize,
    max_children: usize,
    fail: Vec<TreePath>,
    delay: Option<Duration>,
}

impl SyntheticLoader {
    #[must_use]
    pub fn new(seed: u64, max_top: usize, max_children: usize) -> Self {
        Self {
            seed,
            max_top: max_top.max(1),
            max_children: max_children.max(1),
            fail: Vec::new(),
            delay: None,
        }
    }

    /// Loads of these paths fail after producing half their labels.
    #[must_use]
    pub fn failing(mut self, paths: Vec<TreePath>) -> Self {
        self.fail = paths;
        self
    }

    /// Answer from a background thread after `per_child` times the child
    /// count.
    #[must_use]
    pub fn delayed(mut self, per_child: Duration) -> Self {
        self.delay = (!per_child.is_zero()).then_some(per_child);
        self
    }

    /// Number of children of the node at `path`.
    #[must_use]
    pub fn child_count(&self, path: &TreePath) -> usize {
        let max = if path.is_root() {
            self.max_top
        } else {
            self.max_children
        };
        let hash = path
            .indices()
            .iter()
            .fold(splitmix(self.seed), |acc, &i| splitmix(acc ^ i as u64));
        ((hash % max as u64) as usize).max(1)
    }
}

/// Display label of the node at `path`: its indices joined by `", "`.
#[must_use]
pub fn label(path: &TreePath) -> String {
    path.indices()
        .iter()
        .map(usize::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

fn splitmix(mut x: u64) -> u64 {
    x = x.wrapping_add(0x9E37_79B9_7F4A_7C15);
    x = (x ^ (x >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    x = (x ^ (x >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    x ^ (x >> 31)
}

impl Loader for SyntheticLoader {
    fn load(&mut self, path: &TreePath, reply: LoadReply) {
        let count = self.child_count(path);
        let labels: Vec<String> = (0..count).map(|i| label(&path.child(i))).collect();
        let fail = self.fail.contains(path);
        debug!(path = %path, count, fail, "synthetic load");

        let answer = move || {
            if fail {
                let partial = labels[..labels.len() / 2].to_vec();
                reply.fail(partial, "synthetic failure");
            } else {
                reply.succeed(labels);
            }
        };
        match self.delay {
            Some(per_child) => {
                let children = (count as u64).min(MAX_DELAY_CHILDREN);
                let wait = per_child.saturating_mul(children as u32);
                thread::spawn(move || {
                    thread::sleep(wait);
                    answer();
                });
            }
            None => answer(),
        }
    }
}
