use crate::authority::AuthorityResult;
use crate::model::node::{DeletedNote, NoteId, NoteNode, SearchHit};
use crate::model::ordering::DropDirection;
use crate::model::panes::PaneId;

/// All possible messages that drive state transitions.
#[derive(Debug)]
pub enum Msg {
    // -- Lifecycle
    Initialize,
    Tick,
    Quit,

    // -- Selection, panes, history
    SelectNode(NoteId),
    OpenNote {
        id: NoteId,
        pane: PaneId,
        focus_editor: bool,
    },
    OpenInOtherPane(NoteId),
    GoBack,
    GoForward,
    SetFocusedPane(PaneId),
    TriggerEditorFocus,
    ToggleExpanded(NoteId),

    // -- Content
    EditContent {
        id: NoteId,
        content: String,
    },
    CloseEditor(NoteId),
    FlushEdits,

    // -- Tree mutations
    /// Sibling of the current selection (a root when nothing is selected).
    CreateSibling,
    CreateChild(Option<NoteId>),
    Rename {
        id: NoteId,
        title: String,
    },
    TogglePin(NoteId),
    DeleteNote(NoteId),
    MoveNote {
        id: NoteId,
        new_parent: Option<NoteId>,
        anchor: Option<NoteId>,
    },
    DropNote {
        id: NoteId,
        target: NoteId,
        direction: DropDirection,
    },

    // -- Trash
    LoadTrash,
    RestoreNote(NoteId),
    HardDeleteNote {
        id: NoteId,
        confirmed: bool,
    },

    // -- Search
    Search(String),

    // -- Authority responses
    Completed(Completion),
}

/// Result of a background authority call, delivered back to the owner loop.
#[derive(Debug)]
pub enum Completion {
    Initialized(AuthorityResult<(Vec<NoteNode>, Vec<NoteId>)>),
    Snapshot(AuthorityResult<Vec<NoteNode>>),
    OpenList(AuthorityResult<Vec<NoteId>>),
    ContentSaved {
        id: NoteId,
        result: AuthorityResult<()>,
    },
    Renamed {
        id: NoteId,
        result: AuthorityResult<()>,
    },
    PinToggled {
        id: NoteId,
        result: AuthorityResult<bool>,
    },
    Created {
        /// Parent to reveal once the note exists (child creation only).
        expand: Option<NoteId>,
        result: AuthorityResult<NoteNode>,
    },
    Deleted {
        id: NoteId,
        result: AuthorityResult<()>,
    },
    Moved {
        id: NoteId,
        result: AuthorityResult<()>,
    },
    Restored {
        id: NoteId,
        result: AuthorityResult<()>,
    },
    Purged {
        id: NoteId,
        result: AuthorityResult<()>,
    },
    Trash(AuthorityResult<Vec<DeletedNote>>),
    SearchResults {
        query: String,
        result: AuthorityResult<Vec<SearchHit>>,
    },
}
