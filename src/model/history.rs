use super::node::NoteId;

pub const DEFAULT_HISTORY_LIMIT: usize = 50;

/// Browser-style back/forward list of opened notes.
#[derive(Debug, Clone)]
pub struct NavHistory {
    entries: Vec<NoteId>,
    /// `None` until the first open.
    index: Option<usize>,
    limit: usize,
}

impl Default for NavHistory {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_LIMIT)
    }
}

impl NavHistory {
    pub fn new(limit: usize) -> Self {
        Self {
            entries: Vec::new(),
            index: None,
            limit: limit.max(1),
        }
    }

    pub fn entries(&self) -> &[NoteId] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn index(&self) -> Option<usize> {
        self.index
    }

    pub fn current(&self) -> Option<&NoteId> {
        self.entries.get(self.index?)
    }

    pub fn can_go_back(&self) -> bool {
        self.index.is_some_and(|i| i > 0)
    }

    pub fn can_go_forward(&self) -> bool {
        self.index.is_some_and(|i| i + 1 < self.entries.len())
    }

    /// Push `id`, dropping any forward entries. Re-opening the current entry
    /// is a no-op. Returns whether the list changed.
    pub fn record(&mut self, id: &NoteId) -> bool {
        if self.current() == Some(id) {
            return false;
        }

        let keep = self.index.map_or(0, |i| i + 1);
        self.entries.truncate(keep);
        self.entries.push(id.clone());

        if self.entries.len() > self.limit {
            self.entries.remove(0);
        }
        self.index = Some(self.entries.len() - 1);
        true
    }

    /// Step back and return the entry to open.
    pub fn back(&mut self) -> Option<NoteId> {
        let i = self.index.filter(|i| *i > 0)? - 1;
        self.index = Some(i);
        self.entries.get(i).cloned()
    }

    /// Step forward and return the entry to open.
    pub fn forward(&mut self) -> Option<NoteId> {
        let i = self.index.filter(|i| i + 1 < self.entries.len())? + 1;
        self.index = Some(i);
        self.entries.get(i).cloned()
    }
}
