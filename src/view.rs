//! Plain-text rendering of a [`Workspace`] for the line shell.

use crate::model::node::NoteId;
use crate::model::panes::PaneId;
use crate::workspace::Workspace;

/// Visible tree rows: roots plus the children of expanded notes.
pub fn tree_lines(ws: &Workspace) -> Vec<String> {
    let mut lines = Vec::new();
    for root in ws.mirror().roots() {
        push_rows(ws, root, 0, &mut lines);
    }
    if lines.is_empty() {
        lines.push("(no notes)".to_string());
    }
    lines
}

fn push_rows(ws: &Workspace, id: &NoteId, depth: usize, lines: &mut Vec<String>) {
    let Some(node) = ws.mirror().get(id) else {
        return;
    };
    // A cycle in a stale optimistic mirror must not recurse forever.
    if depth > ws.mirror().len() {
        return;
    }

    let children = ws.mirror().children(Some(id));
    let expanded = ws.is_expanded(id);
    let cursor = if ws.selected() == Some(id) { ">" } else { " " };
    let indent = "  ".repeat(depth);
    let prefix = match (children.is_empty() && !node.has_children, expanded) {
        (true, _) => "  ",
        (false, true) => "▾ ",
        (false, false) => "▸ ",
    };
    let pin = if node.pinned { "*" } else { "" };

    lines.push(format!("{cursor}{indent}{prefix}{pin}{} [{id}]", node.title));

    if expanded {
        for child in children {
            push_rows(ws, child, depth + 1, lines);
        }
    }
}

/// One line per pane: what it shows, with the focused pane marked.
pub fn pane_lines(ws: &Workspace) -> Vec<String> {
    [PaneId::One, PaneId::Two]
        .into_iter()
        .map(|pane| {
            let marker = if ws.panes().focused() == pane { "*" } else { " " };
            let shown = match ws.panes().active(pane) {
                Some(id) => {
                    let crumbs = ws.breadcrumb(id);
                    if crumbs.is_empty() {
                        format!("[{id}] (gone)")
                    } else {
                        format!("{} [{id}]", crumbs.join(" / "))
                    }
                }
                None => "(empty)".to_string(),
            };
            format!("{marker}pane {}: {shown}", pane.number())
        })
        .collect()
}

pub fn status_line(ws: &Workspace) -> String {
    let history = ws.history();
    let position = match history.index() {
        Some(i) => format!("{}/{}", i + 1, history.len()),
        None => "-".to_string(),
    };
    let back = if history.can_go_back() { "<" } else { " " };
    let forward = if history.can_go_forward() { ">" } else { " " };

    let mut line = format!(
        "{} | {} notes | {} open | history {back}{position}{forward}",
        ws.save_status().label(),
        ws.mirror().len(),
        ws.open_ids().len()
    );
    if ws.pending_edits() > 0 {
        line.push_str(&format!(" | {} unsaved", ws.pending_edits()));
    }
    if ws.in_flight() > 0 {
        line.push_str(&format!(" | {} pending", ws.in_flight()));
    }
    line
}

/// The content of the note shown in the focused pane, if any. Unsaved
/// editor text wins over the mirror.
pub fn editor_lines(ws: &Workspace) -> Vec<String> {
    let Some(node) = ws.panes().focused_note().and_then(|id| ws.mirror().get(id)) else {
        return Vec::new();
    };
    let content = ws.pending_content(&node.id).unwrap_or(&node.content);
    let mut lines = vec![format!("── {} ──", node.title)];
    lines.extend(content.lines().map(str::to_string));
    lines
}
