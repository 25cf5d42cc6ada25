//! Note lifecycle views and trash retention math.
//!
//! A note is active, archived, or trashed. The trash state is entirely
//! derived: a note with `deleted_at` set belongs to the trash view until
//! the retention window elapses, after which it is expired from the
//! caller's perspective even if a purge has not physically removed it
//! yet. Everything here is a pure computation over `deleted_at` and a
//! caller-supplied "now" — nothing is stored.

use chrono::{DateTime, Utc};

/// Default retention in seconds for trashed notes.
pub const DEFAULT_RETENTION_SECS: i64 = 30;

/// How long a trashed note remains restorable before it is eligible for
/// purge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionWindow {
    secs: i64,
}

impl RetentionWindow {
    /// Create a window of the given length in seconds.
    pub const fn from_secs(secs: i64) -> Self {
        Self { secs }
    }

    /// Window length in seconds.
    pub const fn as_secs(&self) -> i64 {
        self.secs
    }
}

impl Default for RetentionWindow {
    fn default() -> Self {
        Self::from_secs(DEFAULT_RETENTION_SECS)
    }
}

/// Whether a note deleted at `deleted_at` has outlived the retention
/// window as of `now`. A note exactly at the window boundary is expired:
/// only strictly-younger rows stay visible in the trash.
pub fn is_expired(deleted_at: DateTime<Utc>, now: DateTime<Utc>, window: RetentionWindow) -> bool {
    let elapsed_ms = (now - deleted_at).num_milliseconds();
    elapsed_ms >= window.as_secs() * 1000
}

/// Seconds remaining before a trashed note expires, clamped at zero.
///
/// Elapsed time is floored to whole seconds, so a note deleted an
/// instant ago reports the full window.
pub fn time_left(deleted_at: DateTime<Utc>, now: DateTime<Utc>, window: RetentionWindow) -> i64 {
    let elapsed_secs = (now - deleted_at).num_seconds();
    (window.as_secs() - elapsed_secs).max(0)
}
