use thiserror::Error;

use crate::authority::AuthorityError;
use crate::model::node::NoteId;

/// Why a workspace command was refused or failed.
#[derive(Debug, Error)]
pub enum WorkspaceError {
    /// Rejected before reaching the authority; no state changed.
    #[error("invalid request: {0}")]
    Validation(String),

    /// The id is not in the mirror (usually deleted since it was shown).
    #[error("note {0} not found")]
    NotFound(NoteId),

    /// An authority call came back with an error.
    #[error("{op}: {source}")]
    Authority {
        op: &'static str,
        source: AuthorityError,
    },
}

impl WorkspaceError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }
}
