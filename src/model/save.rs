use std::collections::HashMap;
use std::time::{Duration, Instant};

use super::node::NoteId;

/// What the save indicator shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SaveStatus {
    #[default]
    Saved,
    Saving,
    Error,
}

impl SaveStatus {
    pub fn label(&self) -> &'static str {
        match self {
            SaveStatus::Saved => "saved",
            SaveStatus::Saving => "saving",
            SaveStatus::Error => "error",
        }
    }
}

#[derive(Debug, Clone)]
struct PendingEdit {
    content: String,
    deadline: Instant,
}

/// Per-note debounce of editor content. Every edit restarts the note's timer;
/// only the latest text is committed.
#[derive(Debug, Clone)]
pub struct EditDebouncer {
    delay: Duration,
    pending: HashMap<NoteId, PendingEdit>,
}

impl EditDebouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: HashMap::new(),
        }
    }

    pub fn schedule(&mut self, id: NoteId, content: String, now: Instant) {
        self.pending.insert(
            id,
            PendingEdit {
                content,
                deadline: now + self.delay,
            },
        );
    }

    pub fn is_pending(&self, id: &NoteId) -> bool {
        self.pending.contains_key(id)
    }

    /// The text waiting to be committed for `id`.
    pub fn pending_content(&self, id: &NoteId) -> Option<&str> {
        self.pending.get(id).map(|edit| edit.content.as_str())
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Drop a pending edit without committing it.
    pub fn cancel(&mut self, id: &NoteId) -> bool {
        self.pending.remove(id).is_some()
    }

    /// Remove and return every edit whose deadline has passed.
    pub fn take_due(&mut self, now: Instant) -> Vec<(NoteId, String)> {
        let due: Vec<NoteId> = self
            .pending
            .iter()
            .filter(|(_, edit)| now >= edit.deadline)
            .map(|(id, _)| id.clone())
            .collect();

        due.into_iter()
            .filter_map(|id| self.pending.remove(&id).map(|edit| (id, edit.content)))
            .collect()
    }

    /// Remove and return everything, due or not.
    pub fn take_all(&mut self) -> Vec<(NoteId, String)> {
        self.pending
            .drain()
            .map(|(id, edit)| (id, edit.content))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rapid_edits_coalesce_into_latest() {
        let start = Instant::now();
        let mut d = EditDebouncer::new(Duration::from_millis(500));
        let id = NoteId::from("a");

        d.schedule(id.clone(), "h".into(), start);
        d.schedule(id.clone(), "he".into(), start + Duration::from_millis(300));

        assert!(d.take_due(start + Duration::from_millis(600)).is_empty());
        let due = d.take_due(start + Duration::from_millis(800));
        assert_eq!(due, vec![(id.clone(), "he".to_string())]);
        assert!(!d.is_pending(&id));
    }

    #[test]
    fn cancel_drops_pending_edit() {
        let start = Instant::now();
        let mut d = EditDebouncer::new(Duration::from_millis(500));
        let id = NoteId::from("a");
        d.schedule(id.clone(), "x".into(), start);
        assert!(d.cancel(&id));
        assert!(!d.cancel(&id));
        assert!(d.take_due(start + Duration::from_secs(5)).is_empty());
    }

    #[test]
    fn take_all_ignores_deadlines() {
        let start = Instant::now();
        let mut d = EditDebouncer::new(Duration::from_secs(60));
        d.schedule("a".into(), "1".into(), start);
        d.schedule("b".into(), "2".into(), start);
        assert_eq!(d.take_all().len(), 2);
        assert_eq!(d.pending_count(), 0);
    }
}
