use super::node::NoteId;

/// One of the two editor panes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PaneId {
    #[default]
    One,
    Two,
}

impl PaneId {
    pub fn other(self) -> Self {
        match self {
            PaneId::One => PaneId::Two,
            PaneId::Two => PaneId::One,
        }
    }

    pub fn number(self) -> u8 {
        match self {
            PaneId::One => 1,
            PaneId::Two => 2,
        }
    }

    pub fn from_number(n: u8) -> Option<Self> {
        match n {
            1 => Some(PaneId::One),
            2 => Some(PaneId::Two),
            _ => None,
        }
    }

    fn slot(self) -> usize {
        match self {
            PaneId::One => 0,
            PaneId::Two => 1,
        }
    }
}

/// One-shot request for the presentation layer to put keyboard focus into a
/// pane's editor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FocusRequest {
    pub target_note: Option<NoteId>,
    pub target_pane: PaneId,
    pub trigger: u64,
}

/// Active note per pane, the focused pane, and the pending focus request.
#[derive(Debug, Clone, Default)]
pub struct PaneState {
    active: [Option<NoteId>; 2],
    focused: PaneId,
    request: Option<FocusRequest>,
    trigger: u64,
    consumed: u64,
}

impl PaneState {
    pub fn active(&self, pane: PaneId) -> Option<&NoteId> {
        self.active[pane.slot()].as_ref()
    }

    pub fn focused(&self) -> PaneId {
        self.focused
    }

    pub fn focused_note(&self) -> Option<&NoteId> {
        self.active(self.focused)
    }

    pub fn focus_request(&self) -> Option<&FocusRequest> {
        self.request.as_ref()
    }

    /// Focus `pane` and always raise a request for whatever it shows, so an
    /// explicit focus is distinguishable from an incidental re-render.
    pub fn set_focused_pane(&mut self, pane: PaneId) {
        self.focused = pane;
        self.raise(pane);
    }

    /// Show `id` in `pane` and focus that pane.
    pub fn activate(&mut self, pane: PaneId, id: NoteId, focus_editor: bool) {
        self.active[pane.slot()] = Some(id);
        self.focused = pane;
        if focus_editor {
            self.raise(pane);
        }
    }

    /// Re-raise a request for the focused pane without touching anything else.
    pub fn trigger_editor_focus(&mut self) {
        self.raise(self.focused);
    }

    /// Hand out the pending request once per trigger value.
    pub fn consume_focus_request(&mut self) -> Option<FocusRequest> {
        let request = self.request.as_ref()?;
        if request.trigger <= self.consumed {
            return None;
        }
        self.consumed = request.trigger;
        Some(request.clone())
    }

    fn raise(&mut self, pane: PaneId) {
        self.trigger += 1;
        self.request = Some(FocusRequest {
            target_note: self.active(pane).cloned(),
            target_pane: pane,
            trigger: self.trigger,
        });
    }
}
