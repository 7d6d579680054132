use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// Opaque note identifier, stable across renames and moves.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NoteId(pub String);

impl NoteId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NoteId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// One note in the tree, as reported by the authority.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteNode {
    pub id: NoteId,
    pub parent_id: Option<NoteId>,
    pub title: String,
    pub content: String,
    pub order_key: i64,
    #[serde(default)]
    pub pinned: bool,
    /// Denormalized hint; may lag the real child set.
    #[serde(default)]
    pub has_children: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

impl NoteNode {
    /// Bump `updated_at` without ever moving it backwards.
    pub fn touch(&mut self, now: i64) {
        self.updated_at = self.updated_at.max(now);
    }
}

/// Sibling sort key: pinned first, then ascending order key.
pub fn sibling_cmp(a: &NoteNode, b: &NoteNode) -> std::cmp::Ordering {
    b.pinned
        .cmp(&a.pinned)
        .then(a.order_key.cmp(&b.order_key))
        .then_with(|| a.id.cmp(&b.id))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletedNote {
    pub id: NoteId,
    pub title: String,
    pub deleted_at: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchHit {
    pub id: NoteId,
    pub title: String,
    /// Content excerpt with matches wrapped in `<b>…</b>`.
    pub snippet: String,
}

/// Milliseconds since the Unix epoch.
pub fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
