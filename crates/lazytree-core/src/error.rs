#![forbid(unsafe_code)]

//! Error taxonomy for tree operations.
//!
//! None of these are fatal. Each one concerns a single node and leaves the
//! rest of the tree untouched:
//!
//! - [`TreeError::MalformedPath`] is recovered locally as a no-op.
//! - [`TreeError::LoadFailure`] is surfaced to the render consumer through
//!   [`NodeStatus::Failed`](crate::view::NodeStatus::Failed).
//! - [`TreeError::StaleCompletion`] is returned to the caller and the
//!   completion is discarded.

use std::fmt;

use crate::path::TreePath;

/// Errors produced by the tree engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeError {
    /// An operation that needs a concrete node was given the root path or a
    /// path that does not resolve.
    MalformedPath { path: TreePath, operation: &'static str },
    /// The loader reported failure for `path`.
    LoadFailure(LoadFailure),
    /// A completion arrived for a load that is no longer current.
    StaleCompletion { path: TreePath, generation: u64 },
    /// A textual path could not be parsed.
    PathParse { input: String },
}

/// Details of a failed child load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadFailure {
    /// Node whose children failed to load.
    pub path: TreePath,
    /// Loader-provided reason.
    pub reason: String,
    /// Number of labels delivered before the failure. They are discarded.
    pub partial: usize,
}

impl fmt::Display for LoadFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "failed to load children of [{}]: {} ({} partial labels discarded)",
            self.path, self.reason, self.partial
        )
    }
}

impl fmt::Display for TreeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MalformedPath { path, operation } => {
                write!(f, "{operation}: path [{path}] does not address a node")
            }
            Self::LoadFailure(failure) => failure.fmt(f),
            Self::StaleCompletion { path, generation } => write!(
                f,
                "stale completion for [{path}] (generation {generation} is no longer current)"
            ),
            Self::PathParse { input } => write!(f, "invalid tree path {input:?}"),
        }
    }
}

impl std::error::Error for TreeError {}

impl From<LoadFailure> for TreeError {
    fn from(failure: LoadFailure) -> Self {
        Self::LoadFailure(failure)
    }
}
