//! The persistence authority: the external source of truth for tree shape and
//! content. The workspace only ever talks to it through [`Authority`].

pub mod memory;

use thiserror::Error;

use crate::model::node::{DeletedNote, NoteId, NoteNode, SearchHit};

pub use memory::{MemoryAuthority, Op};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AuthorityError {
    /// Transport or process-boundary failure; retrying may succeed.
    #[error("authority unavailable: {0}")]
    Io(String),

    #[error("note {0} not found")]
    NotFound(NoteId),

    /// The authority refused the request (e.g. a move that would form a cycle).
    #[error("rejected: {0}")]
    Rejected(String),
}

pub type AuthorityResult<T> = Result<T, AuthorityError>;

/// Operations the workspace consumes. Every call may fail.
pub trait Authority: Send + Sync {
    fn get_tree_snapshot(&self) -> AuthorityResult<Vec<NoteNode>>;

    /// Most recently opened first.
    fn get_open_list(&self, limit: usize) -> AuthorityResult<Vec<NoteId>>;

    fn touch_open(&self, id: &NoteId) -> AuthorityResult<()>;

    fn update_note(&self, id: &NoteId, content: &str) -> AuthorityResult<()>;

    fn rename_note(&self, id: &NoteId, title: &str) -> AuthorityResult<()>;

    /// New note next to `selected`, or a new root when nothing is selected.
    fn create_sibling(&self, selected: Option<&NoteId>) -> AuthorityResult<NoteNode>;

    fn create_child(&self, parent: Option<&NoteId>) -> AuthorityResult<NoteNode>;

    fn soft_delete_note(&self, id: &NoteId) -> AuthorityResult<()>;

    /// Irreversible; callers confirm before invoking.
    fn hard_delete_note(&self, id: &NoteId) -> AuthorityResult<()>;

    fn restore_note(&self, id: &NoteId) -> AuthorityResult<()>;

    fn get_deleted_notes(&self) -> AuthorityResult<Vec<DeletedNote>>;

    /// Reparent/reorder. `before` ends up directly above the note, `after`
    /// directly below; with neither the note is appended.
    fn move_note(
        &self,
        id: &NoteId,
        new_parent: Option<&NoteId>,
        before: Option<&NoteId>,
        after: Option<&NoteId>,
    ) -> AuthorityResult<()>;

    /// Returns the resulting pinned state.
    fn toggle_pin_note(&self, id: &NoteId) -> AuthorityResult<bool>;

    fn search_notes(&self, query: &str, limit: usize) -> AuthorityResult<Vec<SearchHit>>;
}
