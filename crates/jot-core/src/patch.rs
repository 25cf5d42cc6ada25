//! Partial note updates as an explicit patch structure.
//!
//! A `NotePatch` carries one optional field per patchable attribute.
//! Applying it is a pure function from (current row, patch) to the next
//! row, independent of the persistence layer, so the update semantics —
//! including the share-token coupling — are testable without a store.

use chrono::{DateTime, Utc};

use crate::models::Note;

/// Partial update for a note. Absent fields keep their prior values.
#[derive(Debug, Clone, Default)]
pub struct NotePatch {
    pub title: Option<String>,
    pub content: Option<String>,
    pub is_archived: Option<bool>,
    pub is_shared: Option<bool>,
    pub labels: Option<Vec<String>>,
}

impl NotePatch {
    /// True when no field is set. An empty patch still stamps
    /// `updated_at` when applied.
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.content.is_none()
            && self.is_archived.is_none()
            && self.is_shared.is_none()
            && self.labels.is_none()
    }

    /// Apply this patch to `current`, producing the next row.
    ///
    /// Setting `is_shared` to true (re)issues a token from `fresh_token`
    /// even if the note was already shared; setting it to false clears
    /// the token. `updated_at` is stamped to `now` unconditionally.
    pub fn apply<F>(&self, current: &Note, now: DateTime<Utc>, fresh_token: F) -> Note
    where
        F: FnOnce() -> String,
    {
        let mut next = current.clone();

        if let Some(title) = &self.title {
            next.title = title.clone();
        }
        if let Some(content) = &self.content {
            next.content = content.clone();
        }
        if let Some(archived) = self.is_archived {
            next.is_archived = archived;
        }
        if let Some(labels) = &self.labels {
            next.labels = labels.clone();
        }
        if let Some(shared) = self.is_shared {
            next.is_shared = shared;
            next.share_token = if shared { Some(fresh_token()) } else { None };
        }
        next.updated_at = now;

        next
    }
}
