#![forbid(unsafe_code)]

//! Lazily-populated, virtualized tree state.
//!
//! Children are fetched on first expansion and cached. Only the deployed
//! nodes that reach into the viewport are handed to the renderer; two
//! spacers stand in for everything above and below.
//!
//! The usual entry point is [`TreeSession`], or [`TreeDriver`] when a
//! [`Loader`] should be called automatically.

pub mod config;
pub mod error;
pub mod flatten;
pub mod loader;
pub mod occlusion;
pub mod path;
pub mod session;
pub mod spacer;
pub mod store;
pub mod view;
pub mod viewport;

pub use config::{ConfigError, TreeConfig, TreeConfigParse};
pub use error::{LoadFailure, TreeError};
pub use flatten::{Deployment, flatten};
pub use loader::{LoadReply, LoadResponse, Loader, TreeDriver};
pub use occlusion::{ViewportEdges, ViewportGeometry, is_occluded};
pub use path::TreePath;
pub use session::{Completion, ExpansionState, LoadOutcome, LoadTicket, ToggleEffect, TreeSession};
pub use spacer::{SpacerHeights, spacer_heights};
pub use store::{LoadState, NodeFlag, TreeNode, TreeStore, Update};
pub use view::{NodeStatus, RowKind, ViewFrame, ViewRow};
pub use viewport::{ClipMode, child_render_range, search_last};
