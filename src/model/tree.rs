use smallvec::SmallVec;
use std::collections::{HashMap, HashSet};

use super::node::{NoteId, NoteNode, sibling_cmp};

pub type ChildList = SmallVec<[NoteId; 8]>;

/// Flat mirror of the authority's forest plus a parent → children index.
///
/// The index is rebuilt whenever the shape changes; sibling lists are kept in
/// display order (pinned first, then ascending order key).
#[derive(Debug, Clone, Default)]
pub struct TreeMirror {
    nodes: HashMap<NoteId, NoteNode>,
    children: HashMap<Option<NoteId>, ChildList>,
}

impl TreeMirror {
    pub fn from_snapshot(nodes: Vec<NoteNode>) -> Self {
        let mut mirror = Self {
            nodes: nodes.into_iter().map(|n| (n.id.clone(), n)).collect(),
            children: HashMap::new(),
        };
        mirror.reindex();
        mirror
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get(&self, id: &NoteId) -> Option<&NoteNode> {
        self.nodes.get(id)
    }

    pub fn contains(&self, id: &NoteId) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &NoteNode> {
        self.nodes.values()
    }

    /// Children of `parent` (`None` = roots) in display order.
    pub fn children(&self, parent: Option<&NoteId>) -> &[NoteId] {
        self.children
            .get(&parent.cloned())
            .map(|list| list.as_slice())
            .unwrap_or(&[])
    }

    pub fn child_nodes(&self, parent: Option<&NoteId>) -> Vec<&NoteNode> {
        self.children(parent)
            .iter()
            .filter_map(|id| self.nodes.get(id))
            .collect()
    }

    pub fn roots(&self) -> &[NoteId] {
        self.children(None)
    }

    /// The sibling displayed right after `id`, if any.
    pub fn next_sibling(&self, id: &NoteId) -> Option<&NoteId> {
        let node = self.nodes.get(id)?;
        let siblings = self.children(node.parent_id.as_ref());
        let pos = siblings.iter().position(|s| s == id)?;
        siblings.get(pos + 1)
    }

    /// Ancestor ids, nearest first.
    ///
    /// Stops at the first parent id missing from the mirror and at any id seen
    /// twice, so a malformed chain costs at most O(depth) lookups.
    pub fn ancestors(&self, id: &NoteId) -> Vec<NoteId> {
        let mut out = Vec::new();
        let mut seen = HashSet::new();
        seen.insert(id.clone());

        let mut current = self.nodes.get(id).and_then(|n| n.parent_id.clone());
        while let Some(parent) = current {
            if !seen.insert(parent.clone()) {
                break;
            }
            let Some(node) = self.nodes.get(&parent) else {
                break;
            };
            current = node.parent_id.clone();
            out.push(parent);
        }

        out
    }

    /// Titles from the outermost known ancestor down to `id`.
    pub fn breadcrumb(&self, id: &NoteId) -> Vec<String> {
        let Some(node) = self.nodes.get(id) else {
            return Vec::new();
        };

        let mut path: Vec<String> = self
            .ancestors(id)
            .iter()
            .filter_map(|a| self.nodes.get(a).map(|n| n.title.clone()))
            .collect();
        path.reverse();
        path.push(node.title.clone());
        path
    }

    /// `id` plus every node reachable below it.
    pub fn subtree(&self, id: &NoteId) -> Vec<NoteId> {
        if !self.nodes.contains_key(id) {
            return Vec::new();
        }

        let mut out = vec![id.clone()];
        let mut seen: HashSet<NoteId> = out.iter().cloned().collect();
        let mut i = 0;
        while i < out.len() {
            let current = out[i].clone();
            for child in self.children(Some(&current)) {
                if seen.insert(child.clone()) {
                    out.push(child.clone());
                }
            }
            i += 1;
        }
        out
    }

    // ── Field edits (shape-preserving) ──────────────────────────

    pub fn set_title(&mut self, id: &NoteId, title: &str, now: i64) -> bool {
        let Some(node) = self.nodes.get_mut(id) else {
            return false;
        };
        node.title = title.to_string();
        node.touch(now);
        true
    }

    pub fn set_content(&mut self, id: &NoteId, content: &str, now: i64) -> bool {
        let Some(node) = self.nodes.get_mut(id) else {
            return false;
        };
        node.content = content.to_string();
        node.touch(now);
        true
    }

    pub fn set_pinned(&mut self, id: &NoteId, pinned: bool) -> bool {
        let Some(node) = self.nodes.get_mut(id) else {
            return false;
        };
        if node.pinned == pinned {
            return true;
        }
        node.pinned = pinned;
        let parent = node.parent_id.clone();
        self.sort_bucket(&parent);
        true
    }

    // ── Structural edits (optimistic) ───────────────────────────

    /// Insert or replace a node; the parent's child hint is raised.
    pub fn insert(&mut self, node: NoteNode) {
        let parent = node.parent_id.clone();
        self.nodes.insert(node.id.clone(), node);
        self.reindex();
        self.sync_child_hint(parent.as_ref());
    }

    /// Drop `id` and its descendants. Returns how many nodes left the mirror.
    pub fn remove_subtree(&mut self, id: &NoteId) -> usize {
        let parent = self.nodes.get(id).and_then(|n| n.parent_id.clone());
        let doomed = self.subtree(id);
        for gone in &doomed {
            self.nodes.remove(gone);
        }
        self.reindex();
        self.sync_child_hint(parent.as_ref());
        doomed.len()
    }

    /// Reparent `id` under `new_parent` and assign fresh keys to the whole
    /// destination group. `group` lists the destination siblings in their new
    /// order (including `id`) with their keys.
    pub fn apply_group_order(
        &mut self,
        id: &NoteId,
        new_parent: Option<&NoteId>,
        group: &[(NoteId, i64)],
        now: i64,
    ) -> bool {
        let Some(node) = self.nodes.get_mut(id) else {
            return false;
        };
        let old_parent = node.parent_id.clone();
        node.parent_id = new_parent.cloned();
        node.touch(now);

        for (sibling, key) in group {
            if let Some(n) = self.nodes.get_mut(sibling) {
                n.order_key = *key;
            }
        }

        self.reindex();
        self.sync_child_hint(old_parent.as_ref());
        self.sync_child_hint(new_parent);
        true
    }

    fn sync_child_hint(&mut self, parent: Option<&NoteId>) {
        let Some(parent) = parent else {
            return;
        };
        let has_children = !self.children(Some(parent)).is_empty();
        if let Some(node) = self.nodes.get_mut(parent) {
            node.has_children = has_children;
        }
    }

    fn reindex(&mut self) {
        let mut children: HashMap<Option<NoteId>, ChildList> = HashMap::new();
        for node in self.nodes.values() {
            children
                .entry(node.parent_id.clone())
                .or_default()
                .push(node.id.clone());
        }
        self.children = children;

        let parents: Vec<Option<NoteId>> = self.children.keys().cloned().collect();
        for parent in parents {
            self.sort_bucket(&parent);
        }
    }

    fn sort_bucket(&mut self, parent: &Option<NoteId>) {
        let Some(list) = self.children.get_mut(parent) else {
            return;
        };
        let nodes = &self.nodes;
        list.sort_by(|a, b| match (nodes.get(a), nodes.get(b)) {
            (Some(a), Some(b)) => sibling_cmp(a, b),
            _ => a.cmp(b),
        });
    }
}
