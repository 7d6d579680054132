use crate::error::WorkspaceError;

use super::node::NoteId;
use super::tree::TreeMirror;

/// Which way a row was dragged relative to the row it was dropped on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropDirection {
    Up,
    Down,
}

/// The optimistic outcome of a move, plus the neighbour ids the authority
/// expects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MovePlan {
    pub note: NoteId,
    pub new_parent: Option<NoteId>,
    /// Destination siblings in their new order, with renumbered keys.
    pub group: Vec<(NoteId, i64)>,
    /// Same-pin-group sibling that ends up directly above the moved note.
    pub before: Option<NoteId>,
    /// Same-pin-group sibling that ends up directly below the moved note.
    pub after: Option<NoteId>,
}

impl MovePlan {
    pub fn order(&self) -> Vec<&NoteId> {
        self.group.iter().map(|(id, _)| id).collect()
    }
}

/// Pick the anchor for a drop of `dragged` onto `target`.
///
/// Dragging up anchors on the target itself so the note takes the target's
/// slot. Dragging down anchors on the target's next sibling so the note lands
/// after the target; with no next sibling the note is appended.
pub fn anchor_for_drop(
    mirror: &TreeMirror,
    dragged: &NoteId,
    target: &NoteId,
    direction: DropDirection,
) -> Option<NoteId> {
    match direction {
        DropDirection::Up => Some(target.clone()),
        DropDirection::Down => match mirror.next_sibling(target)? {
            next if next == dragged => mirror.next_sibling(dragged).cloned(),
            next => Some(next.clone()),
        },
    }
}

/// Compute where `note` lands under `new_parent`, inserted before `anchor`
/// (or appended), and renumber the destination group at `step` spacing.
///
/// The insertion index is clamped into the note's own pin group: pinned
/// notes always stay ahead of unpinned ones whatever the anchor says.
pub fn plan_move(
    mirror: &TreeMirror,
    note: &NoteId,
    new_parent: Option<&NoteId>,
    anchor: Option<&NoteId>,
    step: i64,
) -> Result<MovePlan, WorkspaceError> {
    let Some(moving) = mirror.get(note) else {
        return Err(WorkspaceError::NotFound(note.clone()));
    };
    if new_parent == Some(note) {
        return Err(WorkspaceError::validation("cannot move a note into itself"));
    }
    if let Some(parent) = new_parent
        && !mirror.contains(parent)
    {
        return Err(WorkspaceError::NotFound(parent.clone()));
    }

    let mut siblings: Vec<NoteId> = mirror
        .children(new_parent)
        .iter()
        .filter(|id| *id != note)
        .cloned()
        .collect();

    let pinned_count = siblings
        .iter()
        .take_while(|id| mirror.get(id).is_some_and(|n| n.pinned))
        .count();

    let requested = anchor
        .filter(|a| *a != note)
        .and_then(|a| siblings.iter().position(|s| s == a))
        .unwrap_or(siblings.len());

    let index = if moving.pinned {
        requested.min(pinned_count)
    } else {
        requested.max(pinned_count)
    };

    siblings.insert(index, note.clone());

    // Neighbours from the other pin group say nothing about key placement.
    let same_group = |id: &NoteId| mirror.get(id).is_some_and(|n| n.pinned == moving.pinned);
    let before = index
        .checked_sub(1)
        .map(|i| siblings[i].clone())
        .filter(|id| same_group(id));
    let after = siblings.get(index + 1).cloned().filter(|id| same_group(id));
    let group = siblings
        .into_iter()
        .enumerate()
        .map(|(i, id)| (id, i as i64 * step))
        .collect();

    Ok(MovePlan {
        note: note.clone(),
        new_parent: new_parent.cloned(),
        group,
        before,
        after,
    })
}
