use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use regex::{Regex, RegexBuilder};

use super::{Authority, AuthorityError, AuthorityResult};
use crate::model::node::{DeletedNote, NoteId, NoteNode, SearchHit, now_ms};

const KEY_STEP: i64 = 1024;
const DEFAULT_SNIPPET_RADIUS: usize = 32;

const WELCOME_TITLE: &str = "Welcome to treepad";
const WELCOME_BODY: &str = "# Welcome to treepad\n\n\
Notes live in a tree. Two panes can show two different notes.\n\n\
## Commands\n\
- `new`: sibling of the selected note (root when nothing is selected)\n\
- `child`: child of the selected note\n\
- `open <id> [1|2]`, `other <id>`: open in a pane\n\
- `back` / `forward`: walk the open history\n\
- `drop <id> <target> up|down`: drag-and-drop reorder\n\
- `search <text>`: full-text search\n";

/// Authority operations, for fault injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    Snapshot,
    OpenList,
    TouchOpen,
    UpdateNote,
    Rename,
    CreateSibling,
    CreateChild,
    SoftDelete,
    HardDelete,
    Restore,
    DeletedList,
    Move,
    TogglePin,
    Search,
}

#[derive(Debug, Clone)]
struct Row {
    node: NoteNode,
    deleted_at: Option<i64>,
}

#[derive(Debug, Default)]
struct Store {
    rows: HashMap<NoteId, Row>,
    next_id: u64,
    /// note → open sequence number; larger is more recent.
    open: HashMap<NoteId, u64>,
    open_seq: u64,
    clock: i64,
    failures: HashMap<Op, usize>,
}

/// Thread-safe in-process authority with the same ordering, trash and search
/// behaviour as the desktop backend.
#[derive(Debug)]
pub struct MemoryAuthority {
    store: Mutex<Store>,
    snippet_radius: usize,
}

impl Default for MemoryAuthority {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryAuthority {
    pub fn new() -> Self {
        Self {
            store: Mutex::new(Store {
                next_id: 1,
                ..Default::default()
            }),
            snippet_radius: DEFAULT_SNIPPET_RADIUS,
        }
    }

    /// An authority holding `nodes` as-is (ids, parents and keys preserved).
    pub fn from_nodes(nodes: Vec<NoteNode>) -> Self {
        let authority = Self::new();
        if let Ok(mut store) = authority.store.lock() {
            for node in nodes {
                if let Ok(n) = node.id.as_str().parse::<u64>() {
                    store.next_id = store.next_id.max(n + 1);
                }
                store.clock = store.clock.max(node.updated_at);
                store.rows.insert(
                    node.id.clone(),
                    Row {
                        node,
                        deleted_at: None,
                    },
                );
            }
        }
        authority
    }

    /// A fresh store with the welcome note, already marked open.
    pub fn with_welcome() -> Self {
        let authority = Self::new();
        if let Ok(mut store) = authority.store.lock() {
            let now = store.tick();
            let id = store.allocate_id();
            store.rows.insert(
                id.clone(),
                Row {
                    node: NoteNode {
                        id: id.clone(),
                        parent_id: None,
                        title: WELCOME_TITLE.to_string(),
                        content: WELCOME_BODY.to_string(),
                        order_key: KEY_STEP,
                        pinned: false,
                        has_children: false,
                        created_at: now,
                        updated_at: now,
                    },
                    deleted_at: None,
                },
            );
            store.mark_open(&id);
        }
        authority
    }

    pub fn with_snippet_radius(mut self, radius: usize) -> Self {
        self.snippet_radius = radius.max(1);
        self
    }

    /// Make the next call of `op` fail with a transient I/O error.
    pub fn fail_next(&self, op: Op) {
        if let Ok(mut store) = self.store.lock() {
            *store.failures.entry(op).or_default() += 1;
        }
    }

    fn lock(&self, op: Op) -> AuthorityResult<MutexGuard<'_, Store>> {
        let mut store = self
            .store
            .lock()
            .map_err(|_| AuthorityError::Io("store lock poisoned".to_string()))?;

        if let Some(remaining) = store.failures.get_mut(&op)
            && *remaining > 0
        {
            *remaining -= 1;
            return Err(AuthorityError::Io(format!("injected failure in {op:?}")));
        }

        Ok(store)
    }
}

impl Store {
    /// Epoch millis that never run backwards.
    fn tick(&mut self) -> i64 {
        self.clock = self.clock.max(now_ms());
        self.clock
    }

    fn allocate_id(&mut self) -> NoteId {
        loop {
            let id = NoteId::new(self.next_id.to_string());
            self.next_id += 1;
            if !self.rows.contains_key(&id) {
                return id;
            }
        }
    }

    fn mark_open(&mut self, id: &NoteId) {
        self.open_seq += 1;
        self.open.insert(id.clone(), self.open_seq);
    }

    /// Not deleted and no deleted ancestor.
    fn is_visible(&self, id: &NoteId) -> bool {
        let mut seen = HashSet::new();
        let mut current = Some(id.clone());
        while let Some(cur) = current {
            if !seen.insert(cur.clone()) {
                return false;
            }
            let Some(row) = self.rows.get(&cur) else {
                // Dangling parent link: treat the node as a root.
                return cur != *id;
            };
            if row.deleted_at.is_some() {
                return false;
            }
            current = row.node.parent_id.clone();
        }
        true
    }

    fn live(&self, id: &NoteId) -> AuthorityResult<&Row> {
        self.rows
            .get(id)
            .filter(|_| self.is_visible(id))
            .ok_or_else(|| AuthorityError::NotFound(id.clone()))
    }

    fn live_mut(&mut self, id: &NoteId) -> AuthorityResult<&mut Row> {
        if !self.is_visible(id) {
            return Err(AuthorityError::NotFound(id.clone()));
        }
        self.rows
            .get_mut(id)
            .ok_or_else(|| AuthorityError::NotFound(id.clone()))
    }

    /// Non-deleted siblings under `parent` sorted by key, excluding `skip`.
    fn siblings(&self, parent: Option<&NoteId>, skip: Option<&NoteId>) -> Vec<NoteId> {
        let mut rows: Vec<&Row> = self
            .rows
            .values()
            .filter(|r| r.deleted_at.is_none())
            .filter(|r| r.node.parent_id.as_ref() == parent)
            .filter(|r| Some(&r.node.id) != skip)
            .collect();
        rows.sort_by(|a, b| {
            a.node
                .order_key
                .cmp(&b.node.order_key)
                .then_with(|| a.node.id.cmp(&b.node.id))
        });
        rows.into_iter().map(|r| r.node.id.clone()).collect()
    }

    fn key_of(&self, id: Option<&NoteId>) -> Option<i64> {
        id.and_then(|id| self.rows.get(id)).map(|r| r.node.order_key)
    }

    /// A key strictly between `prev` and `next`; renumbers the group at
    /// `KEY_STEP` when the gap is exhausted.
    fn key_between(
        &mut self,
        parent: Option<&NoteId>,
        prev: Option<&NoteId>,
        next: Option<&NoteId>,
        skip: Option<&NoteId>,
    ) -> i64 {
        if let Some(key) = Self::candidate(self.key_of(prev), self.key_of(next)) {
            return key;
        }

        for (i, id) in self.siblings(parent, skip).into_iter().enumerate() {
            if let Some(row) = self.rows.get_mut(&id) {
                row.node.order_key = (i as i64 + 1) * KEY_STEP;
            }
        }

        Self::candidate(self.key_of(prev), self.key_of(next)).unwrap_or(KEY_STEP)
    }

    fn candidate(prev: Option<i64>, next: Option<i64>) -> Option<i64> {
        let key = match (prev, next) {
            (Some(p), Some(n)) => p + (n - p) / 2,
            (Some(p), None) => p.saturating_add(KEY_STEP),
            (None, Some(n)) => n.saturating_sub(KEY_STEP),
            (None, None) => KEY_STEP,
        };
        let above = prev.is_none_or(|p| key > p);
        let below = next.is_none_or(|n| key < n);
        (above && below).then_some(key)
    }

    fn insert_new(&mut self, parent: Option<NoteId>, title: &str, key: i64) -> NoteNode {
        let now = self.tick();
        let id = self.allocate_id();
        let node = NoteNode {
            id: id.clone(),
            parent_id: parent,
            title: title.to_string(),
            content: String::new(),
            order_key: key,
            pinned: false,
            has_children: false,
            created_at: now,
            updated_at: now,
        };
        self.rows.insert(
            id,
            Row {
                node: node.clone(),
                deleted_at: None,
            },
        );
        node
    }

    fn descendants(&self, id: &NoteId) -> Vec<NoteId> {
        let mut out = vec![id.clone()];
        let mut seen: HashSet<NoteId> = out.iter().cloned().collect();
        let mut i = 0;
        while i < out.len() {
            let current = out[i].clone();
            for row in self.rows.values() {
                if row.node.parent_id.as_ref() == Some(&current) && seen.insert(row.node.id.clone())
                {
                    out.push(row.node.id.clone());
                }
            }
            i += 1;
        }
        out
    }
}

impl Authority for MemoryAuthority {
    fn get_tree_snapshot(&self) -> AuthorityResult<Vec<NoteNode>> {
        let store = self.lock(Op::Snapshot)?;

        let visible: Vec<&Row> = store
            .rows
            .values()
            .filter(|r| store.is_visible(&r.node.id))
            .collect();
        let parents: HashSet<&NoteId> = visible
            .iter()
            .filter_map(|r| r.node.parent_id.as_ref())
            .collect();

        let mut nodes: Vec<NoteNode> = visible
            .iter()
            .map(|r| {
                let mut node = r.node.clone();
                node.has_children = parents.contains(&node.id);
                node
            })
            .collect();
        nodes.sort_by(|a, b| {
            a.parent_id
                .cmp(&b.parent_id)
                .then(a.order_key.cmp(&b.order_key))
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(nodes)
    }

    fn get_open_list(&self, limit: usize) -> AuthorityResult<Vec<NoteId>> {
        let store = self.lock(Op::OpenList)?;
        let mut open: Vec<(&NoteId, u64)> = store
            .open
            .iter()
            .filter(|(id, _)| store.is_visible(id))
            .map(|(id, seq)| (id, *seq))
            .collect();
        open.sort_by(|a, b| b.1.cmp(&a.1));
        Ok(open
            .into_iter()
            .take(limit)
            .map(|(id, _)| id.clone())
            .collect())
    }

    fn touch_open(&self, id: &NoteId) -> AuthorityResult<()> {
        let mut store = self.lock(Op::TouchOpen)?;
        store.live(id)?;
        store.mark_open(id);
        Ok(())
    }

    fn update_note(&self, id: &NoteId, content: &str) -> AuthorityResult<()> {
        let mut store = self.lock(Op::UpdateNote)?;
        let now = store.tick();
        let row = store.live_mut(id)?;
        row.node.content = content.to_string();
        row.node.touch(now);
        Ok(())
    }

    fn rename_note(&self, id: &NoteId, title: &str) -> AuthorityResult<()> {
        let title = title.trim();
        if title.is_empty() {
            return Err(AuthorityError::Rejected("title must not be empty".into()));
        }
        let mut store = self.lock(Op::Rename)?;
        let now = store.tick();
        let row = store.live_mut(id)?;
        row.node.title = title.to_string();
        row.node.touch(now);
        Ok(())
    }

    fn create_sibling(&self, selected: Option<&NoteId>) -> AuthorityResult<NoteNode> {
        let mut store = self.lock(Op::CreateSibling)?;

        let Some(selected) = selected else {
            let last = store.siblings(None, None).last().cloned();
            let key = store.key_between(None, last.as_ref(), None, None);
            return Ok(store.insert_new(None, "New Note", key));
        };

        let parent = store.live(selected)?.node.parent_id.clone();
        let siblings = store.siblings(parent.as_ref(), None);
        let next = siblings
            .iter()
            .position(|s| s == selected)
            .and_then(|i| siblings.get(i + 1))
            .cloned();
        let key = store.key_between(parent.as_ref(), Some(selected), next.as_ref(), None);
        Ok(store.insert_new(parent, "New Note", key))
    }

    fn create_child(&self, parent: Option<&NoteId>) -> AuthorityResult<NoteNode> {
        let mut store = self.lock(Op::CreateChild)?;
        if let Some(parent) = parent {
            store.live(parent)?;
        }
        let last = store.siblings(parent, None).last().cloned();
        let key = store.key_between(parent, last.as_ref(), None, None);
        Ok(store.insert_new(parent.cloned(), "New Child", key))
    }

    fn soft_delete_note(&self, id: &NoteId) -> AuthorityResult<()> {
        let mut store = self.lock(Op::SoftDelete)?;
        let now = store.tick();
        let row = store.live_mut(id)?;
        row.deleted_at = Some(now);
        row.node.touch(now);
        Ok(())
    }

    fn hard_delete_note(&self, id: &NoteId) -> AuthorityResult<()> {
        let mut store = self.lock(Op::HardDelete)?;
        if !store.rows.contains_key(id) {
            return Err(AuthorityError::NotFound(id.clone()));
        }
        for gone in store.descendants(id) {
            store.rows.remove(&gone);
            store.open.remove(&gone);
        }
        Ok(())
    }

    fn restore_note(&self, id: &NoteId) -> AuthorityResult<()> {
        let mut store = self.lock(Op::Restore)?;
        let row = store
            .rows
            .get_mut(id)
            .ok_or_else(|| AuthorityError::NotFound(id.clone()))?;
        row.deleted_at = None;
        Ok(())
    }

    fn get_deleted_notes(&self) -> AuthorityResult<Vec<DeletedNote>> {
        let store = self.lock(Op::DeletedList)?;
        let mut deleted: Vec<DeletedNote> = store
            .rows
            .values()
            .filter_map(|r| {
                r.deleted_at.map(|deleted_at| DeletedNote {
                    id: r.node.id.clone(),
                    title: r.node.title.clone(),
                    deleted_at,
                })
            })
            .collect();
        deleted.sort_by(|a, b| b.deleted_at.cmp(&a.deleted_at).then_with(|| a.id.cmp(&b.id)));
        Ok(deleted)
    }

    fn move_note(
        &self,
        id: &NoteId,
        new_parent: Option<&NoteId>,
        before: Option<&NoteId>,
        after: Option<&NoteId>,
    ) -> AuthorityResult<()> {
        let mut store = self.lock(Op::Move)?;
        store.live(id)?;

        if let Some(parent) = new_parent {
            if parent == id {
                return Err(AuthorityError::Rejected(
                    "cannot move a note into itself".into(),
                ));
            }
            store.live(parent)?;

            let mut seen = HashSet::new();
            let mut current = Some(parent.clone());
            while let Some(cur) = current {
                if cur == *id {
                    return Err(AuthorityError::Rejected(
                        "cannot move a note into its own descendant".into(),
                    ));
                }
                if !seen.insert(cur.clone()) {
                    break;
                }
                current = store.rows.get(&cur).and_then(|r| r.node.parent_id.clone());
            }
        }

        // Anchors that are not siblings at the destination are ignored.
        let siblings = store.siblings(new_parent, Some(id));
        let before = before.filter(|b| siblings.contains(b));
        let after = after.filter(|a| siblings.contains(a));
        let before = match (before, after) {
            (None, None) => siblings.last(),
            (b, _) => b,
        }
        .cloned();

        let key = store.key_between(new_parent, before.as_ref(), after, Some(id));
        let now = store.tick();
        let row = store.live_mut(id)?;
        row.node.parent_id = new_parent.cloned();
        row.node.order_key = key;
        row.node.touch(now);
        Ok(())
    }

    fn toggle_pin_note(&self, id: &NoteId) -> AuthorityResult<bool> {
        let mut store = self.lock(Op::TogglePin)?;
        let row = store.live_mut(id)?;
        row.node.pinned = !row.node.pinned;
        Ok(row.node.pinned)
    }

    fn search_notes(&self, query: &str, limit: usize) -> AuthorityResult<Vec<SearchHit>> {
        let store = self.lock(Op::Search)?;
        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }

        let pattern = RegexBuilder::new(&regex::escape(query))
            .case_insensitive(true)
            .build()
            .map_err(|e| AuthorityError::Rejected(format!("bad query: {e}")))?;

        let mut hits: Vec<(u8, i64, SearchHit)> = store
            .rows
            .values()
            .filter(|r| store.is_visible(&r.node.id))
            .filter_map(|r| {
                let in_title = pattern.is_match(&r.node.title);
                let in_content = pattern.is_match(&r.node.content);
                if !in_title && !in_content {
                    return None;
                }
                let rank = if in_title { 0 } else { 1 };
                Some((
                    rank,
                    r.node.updated_at,
                    SearchHit {
                        id: r.node.id.clone(),
                        title: r.node.title.clone(),
                        snippet: snippet(&r.node.content, &pattern, self.snippet_radius),
                    },
                ))
            })
            .collect();

        hits.sort_by(|a, b| {
            a.0.cmp(&b.0)
                .then(b.1.cmp(&a.1))
                .then_with(|| a.2.id.cmp(&b.2.id))
        });
        Ok(hits.into_iter().take(limit).map(|(_, _, hit)| hit).collect())
    }
}

/// Excerpt of `content` around the first match, matches wrapped in `<b>`.
fn snippet(content: &str, pattern: &Regex, radius: usize) -> String {
    let Some(m) = pattern.find(content) else {
        let end = content
            .char_indices()
            .nth(radius * 2)
            .map_or(content.len(), |(i, _)| i);
        let mut out = content[..end].to_string();
        if end < content.len() {
            out.push_str("...");
        }
        return out;
    };

    let start = content[..m.start()]
        .char_indices()
        .rev()
        .take(radius)
        .last()
        .map_or(m.start(), |(i, _)| i);
    let end = content[m.end()..]
        .char_indices()
        .take(radius)
        .last()
        .map_or(m.end(), |(i, c)| m.end() + i + c.len_utf8());

    let window = pattern.replace_all(&content[start..end], "<b>$0</b>");
    let mut out = String::with_capacity(window.len() + 6);
    if start > 0 {
        out.push_str("...");
    }
    out.push_str(&window);
    if end < content.len() {
        out.push_str("...");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

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

    fn child_order(auth: &MemoryAuthority, parent: Option<&str>) -> Vec<String> {
        let mut nodes: Vec<NoteNode> = auth
            .get_tree_snapshot()
            .unwrap()
            .into_iter()
            .filter(|n| n.parent_id.as_ref().map(NoteId::as_str) == parent)
            .collect();
        nodes.sort_by_key(|n| n.order_key);
        nodes.into_iter().map(|n| n.id.0).collect()
    }

    #[test]
    fn welcome_note_is_seeded_and_open() {
        let auth = MemoryAuthority::with_welcome();
        let nodes = auth.get_tree_snapshot().unwrap();
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].title, WELCOME_TITLE);
        assert_eq!(auth.get_open_list(50).unwrap(), vec![nodes[0].id.clone()]);
    }

    #[test]
    fn create_sibling_lands_right_after_selected() {
        let auth = MemoryAuthority::from_nodes(vec![
            node("1", None, 1024),
            node("2", None, 2048),
        ]);
        let created = auth.create_sibling(Some(&"1".into())).unwrap();
        assert_eq!(created.order_key, 1536);
        assert_eq!(created.title, "New Note");
        assert_eq!(child_order(&auth, None), ["1", created.id.as_str(), "2"]);
    }

    #[test]
    fn create_sibling_renumbers_exhausted_gap() {
        let auth = MemoryAuthority::from_nodes(vec![node("1", None, 5), node("2", None, 6)]);
        let created = auth.create_sibling(Some(&"1".into())).unwrap();
        assert_eq!(child_order(&auth, None), ["1", created.id.as_str(), "2"]);
    }

    #[test]
    fn create_child_appends_and_flags_parent() {
        let auth = MemoryAuthority::from_nodes(vec![node("1", None, 1024)]);
        let first = auth.create_child(Some(&"1".into())).unwrap();
        let second = auth.create_child(Some(&"1".into())).unwrap();
        assert_eq!(first.order_key, 1024);
        assert_eq!(second.order_key, 2048);

        let snapshot = auth.get_tree_snapshot().unwrap();
        let parent = snapshot.iter().find(|n| n.id.as_str() == "1").unwrap();
        assert!(parent.has_children);
    }

    #[test]
    fn create_sibling_of_missing_note_fails() {
        let auth = MemoryAuthority::new();
        let err = auth.create_sibling(Some(&"nope".into())).unwrap_err();
        assert_eq!(err, AuthorityError::NotFound("nope".into()));
    }

    #[test]
    fn move_between_neighbours() {
        let auth = MemoryAuthority::from_nodes(vec![
            node("1", None, 1024),
            node("2", None, 2048),
            node("3", None, 3072),
        ]);
        auth.move_note(&"3".into(), None, Some(&"1".into()), Some(&"2".into()))
            .unwrap();
        assert_eq!(child_order(&auth, None), ["1", "3", "2"]);

        auth.move_note(&"1".into(), None, None, None).unwrap();
        assert_eq!(child_order(&auth, None), ["3", "2", "1"]);

        auth.move_note(&"1".into(), None, None, Some(&"3".into()))
            .unwrap();
        assert_eq!(child_order(&auth, None), ["1", "3", "2"]);
    }

    #[test]
    fn move_rejects_cycles() {
        let auth = MemoryAuthority::from_nodes(vec![
            node("1", None, 0),
            node("2", Some("1"), 0),
            node("3", Some("2"), 0),
        ]);
        let err = auth.move_note(&"1".into(), Some(&"3".into()), None, None).unwrap_err();
        assert!(matches!(err, AuthorityError::Rejected(_)));
        let err = auth.move_note(&"1".into(), Some(&"1".into()), None, None).unwrap_err();
        assert!(matches!(err, AuthorityError::Rejected(_)));
    }

    #[test]
    fn soft_delete_hides_subtree_until_restored() {
        let auth = MemoryAuthority::from_nodes(vec![
            node("1", None, 0),
            node("2", Some("1"), 0),
        ]);
        auth.touch_open(&"2".into()).unwrap();
        auth.soft_delete_note(&"1".into()).unwrap();

        assert!(auth.get_tree_snapshot().unwrap().is_empty());
        assert!(auth.get_open_list(10).unwrap().is_empty());
        let trash = auth.get_deleted_notes().unwrap();
        assert_eq!(trash.len(), 1);
        assert_eq!(trash[0].id, NoteId::from("1"));

        auth.restore_note(&"1".into()).unwrap();
        assert_eq!(auth.get_tree_snapshot().unwrap().len(), 2);
        assert_eq!(auth.get_open_list(10).unwrap(), vec![NoteId::from("2")]);
    }

    #[test]
    fn hard_delete_purges_descendants() {
        let auth = MemoryAuthority::from_nodes(vec![
            node("1", None, 0),
            node("2", Some("1"), 0),
            node("3", None, 0),
        ]);
        auth.soft_delete_note(&"1".into()).unwrap();
        auth.hard_delete_note(&"1".into()).unwrap();
        assert!(auth.get_deleted_notes().unwrap().is_empty());
        assert!(auth.restore_note(&"2".into()).is_err());
        assert_eq!(auth.get_tree_snapshot().unwrap().len(), 1);
    }

    #[test]
    fn open_list_is_most_recent_first() {
        let auth = MemoryAuthority::from_nodes(vec![node("1", None, 0), node("2", None, 1)]);
        auth.touch_open(&"1".into()).unwrap();
        auth.touch_open(&"2".into()).unwrap();
        auth.touch_open(&"1".into()).unwrap();
        assert_eq!(
            auth.get_open_list(10).unwrap(),
            vec![NoteId::from("1"), NoteId::from("2")]
        );
        assert_eq!(auth.get_open_list(1).unwrap().len(), 1);
    }

    #[test]
    fn toggle_pin_reports_new_state() {
        let auth = MemoryAuthority::from_nodes(vec![node("1", None, 0)]);
        assert!(auth.toggle_pin_note(&"1".into()).unwrap());
        assert!(!auth.toggle_pin_note(&"1".into()).unwrap());
    }

    #[test]
    fn search_highlights_and_ranks_titles_first() {
        let mut body = node("1", None, 0);
        body.content = "lorem ipsum with a Rust keyword in the middle".into();
        let mut titled = node("2", None, 1);
        titled.title = "rust notes".into();
        let auth = MemoryAuthority::from_nodes(vec![body, titled]).with_snippet_radius(6);

        let hits = auth.search_notes("rust", 10).unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].id, NoteId::from("2"));
        assert_eq!(hits[1].snippet, "...ith a <b>Rust</b> keywo...");
        assert!(auth.search_notes("   ", 10).unwrap().is_empty());
    }

    #[test]
    fn search_escapes_regex_syntax() {
        let mut n = node("1", None, 0);
        n.content = "cost is $5 (approx)".into();
        let auth = MemoryAuthority::from_nodes(vec![n]);
        let hits = auth.search_notes("(approx", 10).unwrap();
        assert_eq!(hits.len(), 1);
        assert!(hits[0].snippet.contains("<b>(approx</b>"));
    }

    #[test]
    fn injected_failures_fire_once() {
        let auth = MemoryAuthority::from_nodes(vec![node("1", None, 0)]);
        auth.fail_next(Op::UpdateNote);
        assert!(matches!(
            auth.update_note(&"1".into(), "x"),
            Err(AuthorityError::Io(_))
        ));
        auth.update_note(&"1".into(), "x").unwrap();
    }

    #[test]
    fn rename_rejects_blank_titles() {
        let auth = MemoryAuthority::from_nodes(vec![node("1", None, 0)]);
        assert!(auth.rename_note(&"1".into(), "  ").is_err());
        auth.rename_note(&"1".into(), "  Fresh ").unwrap();
        let snapshot = auth.get_tree_snapshot().unwrap();
        assert_eq!(snapshot[0].title, "Fresh");
    }
}
