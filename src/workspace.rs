use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, mpsc};
use std::time::Instant;

use fuzzy_matcher::FuzzyMatcher;
use fuzzy_matcher::skim::SkimMatcherV2;

use crate::authority::{Authority, AuthorityError};
use crate::error::WorkspaceError;
use crate::model::config::AppConfig;
use crate::model::history::NavHistory;
use crate::model::node::{DeletedNote, NoteId, NoteNode, SearchHit, now_ms};
use crate::model::ordering::{DropDirection, anchor_for_drop, plan_move};
use crate::model::panes::{FocusRequest, PaneId, PaneState};
use crate::model::save::{EditDebouncer, SaveStatus};
use crate::model::tree::TreeMirror;
use crate::msg::{Completion, Msg};

const MAX_NOTIFICATIONS: usize = 8;

/// How an open behaves besides activating the note.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OpenOptions {
    /// Raise a focus request for the pane's editor.
    pub focus_editor: bool,
    /// Leave the navigation history untouched (back/forward, programmatic).
    pub skip_history: bool,
}

impl OpenOptions {
    pub fn focused() -> Self {
        Self {
            focus_editor: true,
            skip_history: false,
        }
    }
}

/// The client-side workspace: tree mirror, panes, history and the
/// reconciliation with the authority.
///
/// State is owned by one thread and only changes through [`Workspace::update`]
/// (or the typed methods it forwards to). Authority calls run on worker
/// threads and come back as [`Msg::Completed`].
pub struct Workspace {
    pub config: AppConfig,
    authority: Arc<dyn Authority>,
    event_tx: mpsc::Sender<Msg>,
    mirror: TreeMirror,
    panes: PaneState,
    history: NavHistory,
    selected: Option<NoteId>,
    expanded: HashSet<NoteId>,
    open_ids: Vec<NoteId>,
    debouncer: EditDebouncer,
    save_status: SaveStatus,
    saves_in_flight: usize,
    trash: Option<Vec<DeletedNote>>,
    search_query: String,
    search_results: Vec<SearchHit>,
    notifications: VecDeque<String>,
    in_flight: usize,
    initialized: bool,
    pub should_quit: bool,
}

impl Workspace {
    pub fn new(
        config: AppConfig,
        authority: Arc<dyn Authority>,
        event_tx: mpsc::Sender<Msg>,
    ) -> Self {
        let history = NavHistory::new(config.general.history_limit);
        let debouncer = EditDebouncer::new(config.debounce());

        Self {
            config,
            authority,
            event_tx,
            mirror: TreeMirror::default(),
            panes: PaneState::default(),
            history,
            selected: None,
            expanded: HashSet::new(),
            open_ids: Vec::new(),
            debouncer,
            save_status: SaveStatus::Saved,
            saves_in_flight: 0,
            trash: None,
            search_query: String::new(),
            search_results: Vec::new(),
            notifications: VecDeque::new(),
            in_flight: 0,
            initialized: false,
            should_quit: false,
        }
    }

    // ── Read access ──────────────────────────────────────────────

    pub fn mirror(&self) -> &TreeMirror {
        &self.mirror
    }

    pub fn panes(&self) -> &PaneState {
        &self.panes
    }

    pub fn history(&self) -> &NavHistory {
        &self.history
    }

    pub fn selected(&self) -> Option<&NoteId> {
        self.selected.as_ref()
    }

    pub fn is_expanded(&self, id: &NoteId) -> bool {
        self.expanded.contains(id)
    }

    pub fn is_open(&self, id: &NoteId) -> bool {
        self.open_ids.contains(id)
    }

    pub fn open_ids(&self) -> &[NoteId] {
        &self.open_ids
    }

    pub fn save_status(&self) -> SaveStatus {
        self.save_status
    }

    pub fn has_pending_edit(&self, id: &NoteId) -> bool {
        self.debouncer.is_pending(id)
    }

    /// Editor text not yet committed for `id`.
    pub fn pending_content(&self, id: &NoteId) -> Option<&str> {
        self.debouncer.pending_content(id)
    }

    /// Notes with edits waiting on the debounce.
    pub fn pending_edits(&self) -> usize {
        self.debouncer.pending_count()
    }

    pub fn trash(&self) -> Option<&[DeletedNote]> {
        self.trash.as_deref()
    }

    pub fn search_results(&self) -> &[SearchHit] {
        &self.search_results
    }

    pub fn notifications(&self) -> impl Iterator<Item = &String> {
        self.notifications.iter()
    }

    pub fn drain_notifications(&mut self) -> Vec<String> {
        self.notifications.drain(..).collect()
    }

    /// Authority calls dispatched but not yet applied.
    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn breadcrumb(&self, id: &NoteId) -> Vec<String> {
        self.mirror.breadcrumb(id)
    }

    /// Hand the pending focus request to the presentation layer, once.
    pub fn take_focus_request(&mut self) -> Option<FocusRequest> {
        self.panes.consume_focus_request()
    }

    // ── MVU: Update ──────────────────────────────────────────────

    pub fn update(&mut self, msg: Msg) {
        let outcome = match msg {
            Msg::Initialize => {
                self.initialize();
                Ok(())
            }
            Msg::Tick => {
                self.tick_at(Instant::now());
                Ok(())
            }
            Msg::Quit => {
                self.flush_edits();
                self.should_quit = true;
                Ok(())
            }
            Msg::SelectNode(id) => self.select_node(&id),
            Msg::OpenNote {
                id,
                pane,
                focus_editor,
            } => self.open_note(
                &id,
                pane,
                OpenOptions {
                    focus_editor,
                    skip_history: false,
                },
            ),
            Msg::OpenInOtherPane(id) => self.open_in_other_pane(&id),
            Msg::GoBack => self.go_back(),
            Msg::GoForward => self.go_forward(),
            Msg::SetFocusedPane(pane) => {
                self.set_focused_pane(pane);
                Ok(())
            }
            Msg::TriggerEditorFocus => {
                self.trigger_editor_focus();
                Ok(())
            }
            Msg::ToggleExpanded(id) => {
                self.toggle_expanded(&id);
                Ok(())
            }
            Msg::EditContent { id, content } => self.edit_content(&id, content),
            Msg::CloseEditor(id) => {
                self.close_editor(&id);
                Ok(())
            }
            Msg::FlushEdits => {
                self.flush_edits();
                Ok(())
            }
            Msg::CreateSibling => self.create_sibling(self.selected.clone()),
            Msg::CreateChild(parent) => self.create_child(parent),
            Msg::Rename { id, title } => self.rename_note(&id, &title),
            Msg::TogglePin(id) => self.toggle_pin(&id),
            Msg::DeleteNote(id) => self.delete_note(&id),
            Msg::MoveNote {
                id,
                new_parent,
                anchor,
            } => self.move_note(&id, new_parent.as_ref(), anchor.as_ref()),
            Msg::DropNote {
                id,
                target,
                direction,
            } => self.drop_note(&id, &target, direction),
            Msg::LoadTrash => {
                self.load_trash();
                Ok(())
            }
            Msg::RestoreNote(id) => {
                self.restore_note(&id);
                Ok(())
            }
            Msg::HardDeleteNote { id, confirmed } => self.hard_delete_note(&id, confirmed),
            Msg::Search(query) => {
                self.search(&query);
                Ok(())
            }
            Msg::Completed(completion) => {
                self.in_flight = self.in_flight.saturating_sub(1);
                self.apply_completion(completion);
                Ok(())
            }
        };

        if let Err(err) = outcome {
            self.report(err);
        }
    }

    fn report(&mut self, err: WorkspaceError) {
        match &err {
            WorkspaceError::NotFound(id) => {
                tracing::warn!("ignoring stale reference to note {id}");
            }
            WorkspaceError::Validation(reason) => {
                tracing::warn!("rejected: {reason}");
                self.push_notification(err.to_string());
            }
            WorkspaceError::Authority {
                op,
                source: AuthorityError::NotFound(id),
            } => {
                tracing::warn!("{op}: note {id} is gone, ignoring");
            }
            WorkspaceError::Authority { op, source } => {
                tracing::error!("{op} failed: {source}");
                self.push_notification(err.to_string());
            }
        }
    }

    fn push_notification(&mut self, message: String) {
        self.notifications.push_back(message);
        while self.notifications.len() > MAX_NOTIFICATIONS {
            self.notifications.pop_front();
        }
    }

    // ── Dispatch ─────────────────────────────────────────────────

    /// Run `job` against the authority off-thread; its completion comes back
    /// through the event channel.
    fn dispatch<F>(&mut self, label: &'static str, job: F)
    where
        F: FnOnce(&dyn Authority) -> Completion + Send + 'static,
    {
        self.in_flight += 1;
        tracing::debug!(job = label, in_flight = self.in_flight, "dispatch");

        let authority = Arc::clone(&self.authority);
        let tx = self.event_tx.clone();
        std::thread::spawn(move || {
            let completion = job(authority.as_ref());
            if tx.send(Msg::Completed(completion)).is_err() {
                tracing::warn!(job = label, "workspace dropped before completion");
            }
        });
    }

    fn refresh_snapshot(&mut self) {
        self.dispatch("get_tree_snapshot", |auth| {
            Completion::Snapshot(auth.get_tree_snapshot())
        });
    }

    // ── Lifecycle ────────────────────────────────────────────────

    pub fn initialize(&mut self) {
        let limit = self.config.general.open_list_limit;
        self.dispatch("initialize", move |auth| {
            let result = auth
                .get_tree_snapshot()
                .and_then(|nodes| Ok((nodes, auth.get_open_list(limit)?)));
            Completion::Initialized(result)
        });
    }

    /// Commit every debounced edit whose idle period has elapsed by `now`.
    pub fn tick_at(&mut self, now: Instant) {
        for (id, content) in self.debouncer.take_due(now) {
            if let Err(err) = self.update_note_content(&id, content) {
                self.report(err);
            }
        }
    }

    // ── Selection, panes, history ────────────────────────────────

    pub fn select_node(&mut self, id: &NoteId) -> Result<(), WorkspaceError> {
        if !self.mirror.contains(id) {
            return Err(WorkspaceError::NotFound(id.clone()));
        }
        self.selected = Some(id.clone());
        Ok(())
    }

    /// Show `id` in `pane`, focus the pane, select the note, reveal its
    /// ancestors and (unless skipped) record it in the history.
    pub fn open_note(
        &mut self,
        id: &NoteId,
        pane: PaneId,
        options: OpenOptions,
    ) -> Result<(), WorkspaceError> {
        if !self.mirror.contains(id) {
            return Err(WorkspaceError::NotFound(id.clone()));
        }

        self.panes.activate(pane, id.clone(), options.focus_editor);
        self.selected = Some(id.clone());
        self.expanded.extend(self.mirror.ancestors(id));
        if !options.skip_history {
            self.history.record(id);
        }

        let target = id.clone();
        let limit = self.config.general.open_list_limit;
        self.dispatch("touch_open", move |auth| {
            Completion::OpenList(
                auth.touch_open(&target)
                    .and_then(|_| auth.get_open_list(limit)),
            )
        });

        Ok(())
    }

    pub fn open_in_other_pane(&mut self, id: &NoteId) -> Result<(), WorkspaceError> {
        let pane = self.panes.focused().other();
        self.open_note(id, pane, OpenOptions::default())
    }

    pub fn go_back(&mut self) -> Result<(), WorkspaceError> {
        let Some(id) = self.history.back() else {
            return Ok(());
        };
        self.open_from_history(&id)
    }

    pub fn go_forward(&mut self) -> Result<(), WorkspaceError> {
        let Some(id) = self.history.forward() else {
            return Ok(());
        };
        self.open_from_history(&id)
    }

    fn open_from_history(&mut self, id: &NoteId) -> Result<(), WorkspaceError> {
        let pane = self.panes.focused();
        self.open_note(
            id,
            pane,
            OpenOptions {
                focus_editor: false,
                skip_history: true,
            },
        )
    }

    pub fn set_focused_pane(&mut self, pane: PaneId) {
        self.panes.set_focused_pane(pane);
    }

    pub fn trigger_editor_focus(&mut self) {
        self.panes.trigger_editor_focus();
    }

    pub fn toggle_expanded(&mut self, id: &NoteId) {
        if !self.expanded.remove(id) {
            self.expanded.insert(id.clone());
        }
    }

    /// Fuzzy title filter over the mirror, best match first.
    pub fn filter_titles(&self, query: &str) -> Vec<NoteId> {
        let limit = self.config.search.max_results;
        let query = query.trim();

        if query.is_empty() {
            let mut all: Vec<&NoteNode> = self.mirror.nodes().collect();
            all.sort_by(|a, b| a.title.cmp(&b.title).then_with(|| a.id.cmp(&b.id)));
            return all.into_iter().take(limit).map(|n| n.id.clone()).collect();
        }

        let matcher = SkimMatcherV2::default();
        let mut scored: Vec<(i64, &NoteNode)> = self
            .mirror
            .nodes()
            .filter_map(|node| {
                matcher
                    .fuzzy_match(&node.title, query)
                    .map(|score| (score, node))
            })
            .collect();

        scored.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.id.cmp(&b.1.id)));
        scored
            .into_iter()
            .take(limit)
            .map(|(_, node)| node.id.clone())
            .collect()
    }

    // ── Content ──────────────────────────────────────────────────

    /// Record an editor change; it is committed after the idle period.
    pub fn edit_content(&mut self, id: &NoteId, content: String) -> Result<(), WorkspaceError> {
        if !self.mirror.contains(id) {
            return Err(WorkspaceError::NotFound(id.clone()));
        }
        self.debouncer.schedule(id.clone(), content, Instant::now());
        Ok(())
    }

    /// The editing surface for `id` went away; drop its unsaved timer.
    pub fn close_editor(&mut self, id: &NoteId) {
        if self.debouncer.cancel(id) {
            tracing::debug!("cancelled pending save for {id}");
        }
    }

    pub fn flush_edits(&mut self) {
        for (id, content) in self.debouncer.take_all() {
            if let Err(err) = self.update_note_content(&id, content) {
                self.report(err);
            }
        }
    }

    /// Apply `content` locally and persist it. A failed save keeps the local
    /// text and flips the save status to `Error`.
    pub fn update_note_content(
        &mut self,
        id: &NoteId,
        content: String,
    ) -> Result<(), WorkspaceError> {
        if !self.mirror.set_content(id, &content, now_ms()) {
            return Err(WorkspaceError::NotFound(id.clone()));
        }

        self.saves_in_flight += 1;
        self.save_status = SaveStatus::Saving;

        let target = id.clone();
        self.dispatch("update_note", move |auth| {
            let result = auth.update_note(&target, &content);
            Completion::ContentSaved { id: target, result }
        });
        Ok(())
    }

    pub fn rename_note(&mut self, id: &NoteId, title: &str) -> Result<(), WorkspaceError> {
        let title = title.trim();
        if title.is_empty() {
            return Err(WorkspaceError::validation("title must not be empty"));
        }
        if !self.mirror.set_title(id, title, now_ms()) {
            return Err(WorkspaceError::NotFound(id.clone()));
        }

        let target = id.clone();
        let title = title.to_string();
        self.dispatch("rename_note", move |auth| {
            let result = auth.rename_note(&target, &title);
            Completion::Renamed { id: target, result }
        });
        Ok(())
    }

    pub fn toggle_pin(&mut self, id: &NoteId) -> Result<(), WorkspaceError> {
        let Some(pinned) = self.mirror.get(id).map(|n| n.pinned) else {
            return Err(WorkspaceError::NotFound(id.clone()));
        };
        self.mirror.set_pinned(id, !pinned);

        let target = id.clone();
        self.dispatch("toggle_pin_note", move |auth| {
            let result = auth.toggle_pin_note(&target);
            Completion::PinToggled { id: target, result }
        });
        Ok(())
    }

    // ── Structure ────────────────────────────────────────────────

    /// New note after `selected` (a root when `None`); opened once created.
    pub fn create_sibling(&mut self, selected: Option<NoteId>) -> Result<(), WorkspaceError> {
        if let Some(id) = &selected
            && !self.mirror.contains(id)
        {
            return Err(WorkspaceError::NotFound(id.clone()));
        }

        self.dispatch("create_sibling", move |auth| Completion::Created {
            expand: None,
            result: auth.create_sibling(selected.as_ref()),
        });
        Ok(())
    }

    /// New last child of `parent` (a root when `None`); opened once created.
    pub fn create_child(&mut self, parent: Option<NoteId>) -> Result<(), WorkspaceError> {
        if let Some(id) = &parent
            && !self.mirror.contains(id)
        {
            return Err(WorkspaceError::NotFound(id.clone()));
        }

        self.dispatch("create_child", move |auth| {
            let result = auth.create_child(parent.as_ref());
            Completion::Created {
                expand: parent,
                result,
            }
        });
        Ok(())
    }

    /// Soft delete: the subtree leaves the mirror now, the authority keeps
    /// it in the trash.
    pub fn delete_note(&mut self, id: &NoteId) -> Result<(), WorkspaceError> {
        if !self.mirror.contains(id) {
            return Err(WorkspaceError::NotFound(id.clone()));
        }

        let mut next = self.mirror.clone();
        for gone in next.subtree(id) {
            self.debouncer.cancel(&gone);
        }
        next.remove_subtree(id);
        self.install_mirror(next);

        let target = id.clone();
        self.dispatch("soft_delete_note", move |auth| {
            let result = auth.soft_delete_note(&target);
            Completion::Deleted { id: target, result }
        });
        Ok(())
    }

    /// Reparent/reorder `id` under `new_parent`, before `anchor` (or last).
    pub fn move_note(
        &mut self,
        id: &NoteId,
        new_parent: Option<&NoteId>,
        anchor: Option<&NoteId>,
    ) -> Result<(), WorkspaceError> {
        let plan = plan_move(
            &self.mirror,
            id,
            new_parent,
            anchor,
            self.config.general.order_step,
        )?;

        let mut next = self.mirror.clone();
        next.apply_group_order(&plan.note, plan.new_parent.as_ref(), &plan.group, now_ms());
        self.install_mirror(next);

        tracing::debug!(
            note = %plan.note,
            before = ?plan.before,
            after = ?plan.after,
            "optimistic move applied"
        );

        self.dispatch("move_note", move |auth| {
            let result = auth.move_note(
                &plan.note,
                plan.new_parent.as_ref(),
                plan.before.as_ref(),
                plan.after.as_ref(),
            );
            Completion::Moved {
                id: plan.note,
                result,
            }
        });
        Ok(())
    }

    /// Drag-and-drop of `id` onto the row of `target`.
    pub fn drop_note(
        &mut self,
        id: &NoteId,
        target: &NoteId,
        direction: DropDirection,
    ) -> Result<(), WorkspaceError> {
        if id == target {
            return Err(WorkspaceError::validation("cannot drop a note onto itself"));
        }
        let Some(target_node) = self.mirror.get(target) else {
            return Err(WorkspaceError::NotFound(target.clone()));
        };

        let new_parent = target_node.parent_id.clone();
        let anchor = anchor_for_drop(&self.mirror, id, target, direction);
        self.move_note(id, new_parent.as_ref(), anchor.as_ref())
    }

    // ── Trash ────────────────────────────────────────────────────

    pub fn load_trash(&mut self) {
        self.dispatch("get_deleted_notes", |auth| {
            Completion::Trash(auth.get_deleted_notes())
        });
    }

    pub fn restore_note(&mut self, id: &NoteId) {
        let target = id.clone();
        self.dispatch("restore_note", move |auth| {
            let result = auth.restore_note(&target);
            Completion::Restored { id: target, result }
        });
    }

    /// Purge a trashed note for good. The caller must have confirmed.
    pub fn hard_delete_note(&mut self, id: &NoteId, confirmed: bool) -> Result<(), WorkspaceError> {
        if !confirmed {
            return Err(WorkspaceError::validation(format!(
                "permanent delete of {id} needs confirmation"
            )));
        }

        let target = id.clone();
        self.dispatch("hard_delete_note", move |auth| {
            let result = auth.hard_delete_note(&target);
            Completion::Purged { id: target, result }
        });
        Ok(())
    }

    // ── Search ───────────────────────────────────────────────────

    pub fn search(&mut self, query: &str) {
        let query = query.trim().to_string();
        self.search_query.clone_from(&query);

        if query.is_empty() {
            self.search_results.clear();
            return;
        }

        let limit = self.config.search.max_results;
        self.dispatch("search_notes", move |auth| {
            let result = auth.search_notes(&query, limit);
            Completion::SearchResults { query, result }
        });
    }

    // ── Reconciliation ───────────────────────────────────────────

    fn install_mirror(&mut self, mirror: TreeMirror) {
        self.mirror = mirror;
        if self
            .selected
            .as_ref()
            .is_some_and(|id| !self.mirror.contains(id))
        {
            self.selected = None;
        }
        let mirror = &self.mirror;
        self.expanded.retain(|id| mirror.contains(id));
    }

    fn apply_completion(&mut self, completion: Completion) {
        match completion {
            Completion::Initialized(Ok((nodes, open))) => {
                self.install_mirror(TreeMirror::from_snapshot(nodes));
                self.initialized = true;

                if self.panes.active(PaneId::One).is_none()
                    && let Some(first) = open.first().filter(|id| self.mirror.contains(id))
                {
                    self.panes.activate(PaneId::One, first.clone(), false);
                    self.selected = Some(first.clone());
                }
                self.open_ids = open;
                tracing::info!(notes = self.mirror.len(), "workspace initialized");
            }
            Completion::Initialized(Err(e)) => {
                self.authority_failed("initialize", e);
            }
            Completion::Snapshot(Ok(nodes)) => {
                self.install_mirror(TreeMirror::from_snapshot(nodes));
            }
            Completion::Snapshot(Err(e)) => {
                self.authority_failed("get_tree_snapshot", e);
            }
            Completion::OpenList(Ok(open)) => self.open_ids = open,
            Completion::OpenList(Err(e)) => {
                self.authority_failed("touch_open", e);
            }
            Completion::ContentSaved { result, .. } => {
                self.saves_in_flight = self.saves_in_flight.saturating_sub(1);
                match result {
                    Ok(()) => {
                        if self.saves_in_flight == 0 {
                            self.save_status = SaveStatus::Saved;
                        }
                    }
                    Err(e) => {
                        self.save_status = SaveStatus::Error;
                        self.authority_failed("update_note", e);
                    }
                }
            }
            Completion::Renamed { result, .. } => {
                if let Err(e) = result {
                    self.authority_failed("rename_note", e);
                }
            }
            Completion::PinToggled { id, result } => match result {
                Ok(pinned) => {
                    self.mirror.set_pinned(&id, pinned);
                }
                Err(e) => self.authority_failed("toggle_pin_note", e),
            },
            Completion::Created { expand, result } => {
                match result {
                    Ok(node) => self.adopt_created(node, expand),
                    Err(e) => self.authority_failed("create_note", e),
                }
                self.refresh_snapshot();
            }
            Completion::Deleted { result, .. } => {
                if let Err(e) = result {
                    self.authority_failed("soft_delete_note", e);
                }
                self.refresh_snapshot();
                if self.trash.is_some() {
                    self.load_trash();
                }
            }
            Completion::Moved { result, .. } => {
                if let Err(e) = result {
                    self.authority_failed("move_note", e);
                }
                self.refresh_snapshot();
            }
            Completion::Restored { result, .. } => {
                if let Err(e) = result {
                    self.authority_failed("restore_note", e);
                }
                self.refresh_snapshot();
                self.load_trash();
            }
            Completion::Purged { result, .. } => {
                if let Err(e) = result {
                    self.authority_failed("hard_delete_note", e);
                }
                self.load_trash();
                self.refresh_snapshot();
            }
            Completion::Trash(Ok(deleted)) => self.trash = Some(deleted),
            Completion::Trash(Err(e)) => {
                self.authority_failed("get_deleted_notes", e);
            }
            Completion::SearchResults { query, result } => {
                if query != self.search_query {
                    tracing::debug!("dropping results for superseded query {query:?}");
                    return;
                }
                match result {
                    Ok(hits) => self.search_results = hits,
                    Err(e) => self.authority_failed("search_notes", e),
                }
            }
        }
    }

    fn adopt_created(&mut self, node: NoteNode, expand: Option<NoteId>) {
        let id = node.id.clone();
        self.mirror.insert(node);
        self.selected = Some(id.clone());
        if let Some(parent) = expand {
            self.expanded.insert(parent);
        }

        let pane = self.panes.focused();
        if let Err(err) = self.open_note(&id, pane, OpenOptions::focused()) {
            self.report(err);
        }
    }

    fn authority_failed(&mut self, op: &'static str, source: AuthorityError) {
        self.report(WorkspaceError::Authority { op, source });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authority::{MemoryAuthority, Op};
    use std::time::Duration;

    fn node(id: &str, parent: Option<&str>, key: i64) -> NoteNode {
        NoteNode {
            id: NoteId::from(id),
            parent_id: parent.map(NoteId::from),
            title: format!("Note {id}"),
            content: String::new(),
            order_key: key,
            pinned: false,
            has_children: false,
            created_at: 1,
            updated_at: 1,
        }
    }

    struct Harness {
        ws: Workspace,
        rx: mpsc::Receiver<Msg>,
        auth: Arc<MemoryAuthority>,
    }

    impl Harness {
        fn new(nodes: Vec<NoteNode>) -> Self {
            let auth = Arc::new(MemoryAuthority::from_nodes(nodes));
            let (tx, rx) = mpsc::channel();
            let config = AppConfig::defaults().unwrap();
            let ws = Workspace::new(config, auth.clone(), tx);
            let mut h = Self { ws, rx, auth };
            h.ws.update(Msg::Initialize);
            h.settle();
            h
        }

        fn settle(&mut self) {
            while self.ws.in_flight() > 0 {
                let msg = self
                    .rx
                    .recv_timeout(Duration::from_secs(5))
                    .expect("authority job timed out");
                self.ws.update(msg);
            }
        }

        fn send(&mut self, msg: Msg) {
            self.ws.update(msg);
            self.settle();
        }

        fn order(&self, parent: Option<&str>) -> Vec<String> {
            let parent = parent.map(NoteId::from);
            self.ws
                .mirror()
                .children(parent.as_ref())
                .iter()
                .map(|id| id.0.clone())
                .collect()
        }
    }

    fn abc() -> Vec<NoteNode> {
        vec![
            node("1", None, 0),
            node("2", Some("1"), 0),
            node("3", Some("1"), 1000),
        ]
    }

    #[test]
    fn initialize_loads_tree_and_activates_most_recent_open() {
        let auth = MemoryAuthority::from_nodes(abc());
        auth.touch_open(&"3".into()).unwrap();
        let auth = Arc::new(auth);
        let (tx, rx) = mpsc::channel();
        let mut h = Harness {
            ws: Workspace::new(AppConfig::defaults().unwrap(), auth.clone(), tx),
            rx,
            auth,
        };
        h.send(Msg::Initialize);

        assert!(h.ws.is_initialized());
        assert_eq!(h.ws.mirror().len(), 3);
        assert_eq!(h.ws.panes().active(PaneId::One), Some(&NoteId::from("3")));
        assert_eq!(h.ws.selected(), Some(&NoteId::from("3")));
        assert!(h.ws.history().is_empty());
        assert!(h.ws.is_open(&"3".into()));
    }

    #[test]
    fn open_note_updates_panes_history_and_expansion() {
        let mut h = Harness::new(vec![
            node("1", None, 0),
            node("2", Some("1"), 0),
            node("3", Some("2"), 0),
        ]);
        h.send(Msg::OpenNote {
            id: "3".into(),
            pane: PaneId::Two,
            focus_editor: true,
        });

        let ws = &mut h.ws;
        assert_eq!(ws.panes().active(PaneId::Two), Some(&NoteId::from("3")));
        assert_eq!(ws.panes().focused(), PaneId::Two);
        assert_eq!(ws.selected(), Some(&NoteId::from("3")));
        assert!(ws.is_expanded(&"1".into()));
        assert!(ws.is_expanded(&"2".into()));
        assert_eq!(ws.history().current(), Some(&NoteId::from("3")));
        assert!(ws.is_open(&"3".into()));

        let req = ws.take_focus_request().unwrap();
        assert_eq!(req.target_pane, PaneId::Two);
        assert_eq!(req.target_note, Some("3".into()));
        assert!(ws.take_focus_request().is_none());
    }

    #[test]
    fn reopening_active_note_does_not_grow_history() {
        let mut h = Harness::new(abc());
        for _ in 0..3 {
            h.ws.open_note(&"2".into(), PaneId::One, OpenOptions::default())
                .unwrap();
        }
        h.settle();
        assert_eq!(h.ws.history().len(), 1);
    }

    #[test]
    fn back_and_forward_open_without_recording_or_focus() {
        let mut h = Harness::new(abc());
        for id in ["1", "2", "3"] {
            h.ws.open_note(&id.into(), PaneId::One, OpenOptions::default())
                .unwrap();
        }
        h.settle();
        h.ws.take_focus_request();

        h.send(Msg::GoBack);
        assert_eq!(h.ws.panes().active(PaneId::One), Some(&NoteId::from("2")));
        assert_eq!(h.ws.history().index(), Some(1));
        assert_eq!(h.ws.history().len(), 3);
        assert!(h.ws.take_focus_request().is_none());

        h.send(Msg::GoForward);
        assert_eq!(h.ws.panes().active(PaneId::One), Some(&NoteId::from("3")));
        assert_eq!(h.ws.history().index(), Some(2));

        h.send(Msg::GoForward);
        assert_eq!(h.ws.history().index(), Some(2));
    }

    #[test]
    fn back_navigation_follows_focused_pane() {
        let mut h = Harness::new(abc());
        h.ws.open_note(&"2".into(), PaneId::One, OpenOptions::default())
            .unwrap();
        h.ws.open_note(&"3".into(), PaneId::One, OpenOptions::default())
            .unwrap();
        h.ws.set_focused_pane(PaneId::Two);
        h.send(Msg::GoBack);

        assert_eq!(h.ws.panes().active(PaneId::Two), Some(&NoteId::from("2")));
        assert_eq!(h.ws.panes().active(PaneId::One), Some(&NoteId::from("3")));
    }

    #[test]
    fn open_unknown_note_is_a_no_op() {
        let mut h = Harness::new(abc());
        h.send(Msg::OpenNote {
            id: "zz".into(),
            pane: PaneId::One,
            focus_editor: true,
        });
        assert!(h.ws.history().is_empty());
        assert!(h.ws.take_focus_request().is_none());
        assert_eq!(h.ws.notifications().count(), 0);
    }

    #[test]
    fn drag_up_reorders_optimistically_and_reconciles() {
        let mut h = Harness::new(abc());
        h.ws.drop_note(&"3".into(), &"2".into(), DropDirection::Up)
            .unwrap();

        assert_eq!(h.order(Some("1")), ["3", "2"]);
        let keys: Vec<i64> = ["3", "2"]
            .iter()
            .map(|id| h.ws.mirror().get(&NoteId::from(*id)).unwrap().order_key)
            .collect();
        assert_eq!(keys, [0, 1000]);

        h.settle();
        assert_eq!(h.order(Some("1")), ["3", "2"]);
    }

    #[test]
    fn drag_down_past_last_sibling_appends() {
        let mut h = Harness::new(abc());
        h.ws.drop_note(&"2".into(), &"3".into(), DropDirection::Down)
            .unwrap();
        assert_eq!(h.order(Some("1")), ["3", "2"]);
        h.settle();
        assert_eq!(h.order(Some("1")), ["3", "2"]);
    }

    #[test]
    fn move_into_itself_is_rejected_without_side_effects() {
        let mut h = Harness::new(abc());
        h.send(Msg::MoveNote {
            id: "2".into(),
            new_parent: Some("2".into()),
            anchor: None,
        });
        assert_eq!(h.order(Some("1")), ["2", "3"]);
        assert_eq!(h.ws.notifications().count(), 1);
    }

    #[test]
    fn failed_move_still_reconciles_to_authority() {
        let mut h = Harness::new(abc());
        h.auth.fail_next(Op::Move);
        h.ws.move_note(&"3".into(), Some(&"1".into()), Some(&"2".into()))
            .unwrap();
        assert_eq!(h.order(Some("1")), ["3", "2"]);

        h.settle();
        assert_eq!(h.order(Some("1")), ["2", "3"]);
        assert!(h.ws.notifications().any(|n| n.starts_with("move_note")));
    }

    #[test]
    fn cycle_rejected_by_authority_is_undone_by_refetch() {
        let mut h = Harness::new(abc());
        h.ws.move_note(&"1".into(), Some(&"2".into()), None).unwrap();
        h.settle();
        assert_eq!(h.order(None), ["1"]);
        assert_eq!(h.order(Some("1")), ["2", "3"]);
    }

    #[test]
    fn debounced_edits_coalesce_into_one_save() {
        let mut h = Harness::new(abc());
        let id = NoteId::from("2");
        h.send(Msg::EditContent {
            id: id.clone(),
            content: "h".into(),
        });
        h.send(Msg::EditContent {
            id: id.clone(),
            content: "hello".into(),
        });
        assert!(h.ws.has_pending_edit(&id));
        assert_eq!(h.ws.mirror().get(&id).unwrap().content, "");

        h.ws.tick_at(Instant::now());
        assert!(h.ws.has_pending_edit(&id));

        h.ws.tick_at(Instant::now() + Duration::from_secs(1));
        assert_eq!(h.ws.save_status(), SaveStatus::Saving);
        assert_eq!(h.ws.mirror().get(&id).unwrap().content, "hello");
        h.settle();

        assert_eq!(h.ws.save_status(), SaveStatus::Saved);
        let snapshot = h.auth.get_tree_snapshot().unwrap();
        let saved = snapshot.iter().find(|n| n.id == id).unwrap();
        assert_eq!(saved.content, "hello");
    }

    #[test]
    fn closing_editor_cancels_pending_save() {
        let mut h = Harness::new(abc());
        let id = NoteId::from("2");
        h.ws.edit_content(&id, "draft".into()).unwrap();
        h.send(Msg::CloseEditor(id.clone()));
        h.ws.tick_at(Instant::now() + Duration::from_secs(5));
        assert_eq!(h.ws.in_flight(), 0);
        assert_eq!(h.ws.mirror().get(&id).unwrap().content, "");
    }

    #[test]
    fn rejected_content_save_keeps_local_edit() {
        let mut h = Harness::new(abc());
        let id = NoteId::from("2");
        h.auth.fail_next(Op::UpdateNote);
        h.ws.update_note_content(&id, "optimistic".into()).unwrap();
        h.settle();

        assert_eq!(h.ws.save_status(), SaveStatus::Error);
        assert_eq!(h.ws.mirror().get(&id).unwrap().content, "optimistic");

        h.ws.update_note_content(&id, "retry".into()).unwrap();
        h.settle();
        assert_eq!(h.ws.save_status(), SaveStatus::Saved);
    }

    #[test]
    fn quit_flushes_pending_edits() {
        let mut h = Harness::new(abc());
        h.ws.edit_content(&"3".into(), "bye".into()).unwrap();
        h.send(Msg::Quit);
        assert!(h.ws.should_quit);
        let snapshot = h.auth.get_tree_snapshot().unwrap();
        assert!(snapshot.iter().any(|n| n.content == "bye"));
    }

    #[test]
    fn rename_validates_and_applies_locally() {
        let mut h = Harness::new(abc());
        let err = h.ws.rename_note(&"2".into(), "   ").unwrap_err();
        assert!(matches!(err, WorkspaceError::Validation(_)));

        h.ws.rename_note(&"2".into(), "  Groceries ").unwrap();
        assert_eq!(h.ws.mirror().get(&"2".into()).unwrap().title, "Groceries");
        assert_eq!(h.ws.in_flight(), 1);
        h.settle();
        assert_eq!(h.ws.breadcrumb(&"2".into()), ["Note 1", "Groceries"]);
    }

    #[test]
    fn pin_toggle_regroups_and_takes_authority_answer() {
        let mut h = Harness::new(abc());
        h.send(Msg::TogglePin("3".into()));
        assert!(h.ws.mirror().get(&"3".into()).unwrap().pinned);
        assert_eq!(h.order(Some("1")), ["3", "2"]);
    }

    #[test]
    fn create_sibling_opens_new_note_in_focused_pane() {
        let mut h = Harness::new(abc());
        h.ws.set_focused_pane(PaneId::Two);
        h.ws.select_node(&"2".into()).unwrap();
        h.send(Msg::CreateSibling);

        let new_id = h.ws.history().current().cloned().unwrap();
        assert_eq!(h.ws.panes().active(PaneId::Two), Some(&new_id));
        assert_eq!(h.ws.selected(), Some(&new_id));
        assert_eq!(h.order(Some("1")), ["2", new_id.as_str(), "3"]);
        assert_eq!(h.ws.take_focus_request().unwrap().target_note, Some(new_id));
    }

    #[test]
    fn create_child_expands_parent() {
        let mut h = Harness::new(abc());
        h.send(Msg::CreateChild(Some("3".into())));
        assert!(h.ws.is_expanded(&"3".into()));
        assert!(h.ws.mirror().get(&"3".into()).unwrap().has_children);
        assert_eq!(h.ws.mirror().children(Some(&"3".into())).len(), 1);
    }

    #[test]
    fn failed_create_is_reported_and_reconciled() {
        let mut h = Harness::new(abc());
        h.auth.fail_next(Op::CreateChild);
        h.send(Msg::CreateChild(None));
        assert_eq!(h.ws.mirror().len(), 3);
        assert!(h.ws.notifications().any(|n| n.starts_with("create_note")));
    }

    #[test]
    fn delete_removes_subtree_and_lands_in_trash() {
        let mut h = Harness::new(abc());
        h.ws.select_node(&"2".into()).unwrap();
        h.ws.delete_note(&"1".into()).unwrap();
        assert!(h.ws.mirror().is_empty());
        assert_eq!(h.ws.selected(), None);

        h.settle();
        h.send(Msg::LoadTrash);
        let trash = h.ws.trash().unwrap();
        assert_eq!(trash.len(), 1);
        assert_eq!(trash[0].id, NoteId::from("1"));

        h.send(Msg::RestoreNote("1".into()));
        assert_eq!(h.ws.mirror().len(), 3);
        assert!(h.ws.trash().unwrap().is_empty());
    }

    #[test]
    fn hard_delete_requires_confirmation() {
        let mut h = Harness::new(abc());
        h.send(Msg::DeleteNote("3".into()));
        h.send(Msg::HardDeleteNote {
            id: "3".into(),
            confirmed: false,
        });
        assert_eq!(h.ws.in_flight(), 0);
        assert!(h.auth.get_deleted_notes().unwrap().len() == 1);

        h.send(Msg::HardDeleteNote {
            id: "3".into(),
            confirmed: true,
        });
        assert!(h.ws.trash().unwrap().is_empty());
        assert_eq!(h.ws.mirror().len(), 2);
    }

    #[test]
    fn search_results_follow_latest_query() {
        let mut nodes = abc();
        nodes[1].content = "meeting agenda".into();
        let mut h = Harness::new(nodes);

        h.send(Msg::Search("agenda".into()));
        assert_eq!(h.ws.search_results().len(), 1);
        assert!(h.ws.search_results()[0].snippet.contains("<b>agenda</b>"));

        h.send(Msg::Search("  ".into()));
        assert!(h.ws.search_results().is_empty());
    }

    #[test]
    fn filter_titles_ranks_fuzzy_matches() {
        let mut nodes = abc();
        nodes[0].title = "Project plan".into();
        nodes[1].title = "Groceries".into();
        nodes[2].title = "Plan B".into();
        let h = Harness::new(nodes);

        let hits = h.ws.filter_titles("plan");
        assert_eq!(hits.len(), 2);
        assert!(!hits.contains(&"2".into()));
        assert_eq!(h.ws.filter_titles("").len(), 3);
    }

    #[test]
    fn set_focused_pane_raises_request_for_its_note() {
        let mut h = Harness::new(abc());
        h.ws.open_note(&"2".into(), PaneId::Two, OpenOptions::default())
            .unwrap();
        h.settle();
        assert!(h.ws.take_focus_request().is_none());

        h.send(Msg::SetFocusedPane(PaneId::Two));
        let req = h.ws.take_focus_request().unwrap();
        assert_eq!(req.target_note, Some("2".into()));

        h.send(Msg::TriggerEditorFocus);
        assert!(h.ws.take_focus_request().is_some());
    }

    #[test]
    fn note_deleted_behind_the_mirror_is_a_silent_no_op() {
        let mut h = Harness::new(abc());
        let id = NoteId::from("2");
        h.auth.soft_delete_note(&id).unwrap();
        assert!(h.ws.mirror().contains(&id));

        h.ws.open_note(&id, PaneId::One, OpenOptions::default())
            .unwrap();
        h.send(Msg::Rename {
            id: id.clone(),
            title: "gone".into(),
        });
        h.ws.update_note_content(&id, "late".into()).unwrap();
        h.settle();

        assert_eq!(h.ws.notifications().count(), 0);
        assert_eq!(h.ws.save_status(), SaveStatus::Error);
    }

    #[test]
    fn other_authority_failures_are_reported_with_their_operation() {
        let mut h = Harness::new(abc());
        h.auth.fail_next(Op::Rename);
        h.send(Msg::Rename {
            id: "2".into(),
            title: "Later".into(),
        });

        let notes: Vec<&String> = h.ws.notifications().collect();
        assert_eq!(notes.len(), 1);
        assert!(notes[0].starts_with("rename_note: authority unavailable"));
    }

    #[test]
    fn notifications_are_bounded() {
        let mut h = Harness::new(abc());
        for _ in 0..20 {
            h.ws.update(Msg::Rename {
                id: "2".into(),
                title: String::new(),
            });
        }
        assert_eq!(h.ws.notifications().count(), MAX_NOTIFICATIONS);
    }
}
