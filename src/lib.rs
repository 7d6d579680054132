//! treepad: a two-pane hierarchical notes workspace.
//!
//! The [`Workspace`] mirrors a tree owned by an external [`Authority`],
//! applies edits optimistically and reconciles with authoritative snapshots.

pub mod authority;
pub mod command;
pub mod error;
pub mod model;
pub mod msg;
pub mod view;
pub mod workspace;

pub use authority::{Authority, AuthorityError, MemoryAuthority};
pub use error::WorkspaceError;
pub use model::config::AppConfig;
pub use model::node::{NoteId, NoteNode};
pub use msg::{Completion, Msg};
pub use workspace::{OpenOptions, Workspace};
