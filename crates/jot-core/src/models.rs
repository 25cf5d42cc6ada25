//! Core data models for jot.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A registered account, as stored. The password hash is an Argon2id PHC
/// string and never serializes.
#[derive(Debug, Clone)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// Public projection of a user, safe to return to clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserPublic {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserPublic {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            name: user.name,
            created_at: user.created_at,
        }
    }
}

/// A note row.
///
/// `share_token` is present iff `is_shared` is true; `deleted_at` is
/// non-null while the note sits in the trash. Labels are freestanding
/// names with no referential link into the labels table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Note {
    pub id: Uuid,
    pub title: String,
    pub content: String,
    pub user_id: Uuid,
    pub is_archived: bool,
    pub is_shared: bool,
    pub share_token: Option<String>,
    pub labels: Vec<String>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A trashed note annotated with the seconds remaining before it becomes
/// eligible for purge. `time_left` is derived from `deleted_at` and the
/// moment of the query; it is never stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrashedNote {
    #[serde(flatten)]
    pub note: Note,
    pub time_left: i64,
}

/// Public projection of a shared note, reachable by token without
/// authentication. Omits the owner id, the token itself, and anything
/// else a stranger has no business seeing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SharedNote {
    pub id: Uuid,
    pub title: String,
    pub content: String,
    pub labels: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub owner_name: String,
}

/// A label row. Uniqueness of `(name, user_id)` is enforced at creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Label {
    pub id: Uuid,
    pub name: String,
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
}

/// Request for creating a new user.
#[derive(Debug, Clone)]
pub struct CreateUserRequest {
    pub email: String,
    /// Argon2id PHC string, hashed by the caller.
    pub password_hash: String,
    pub name: String,
}

/// Request for creating a new note.
#[derive(Debug, Clone)]
pub struct CreateNoteRequest {
    pub title: Option<String>,
    pub content: String,
    pub labels: Option<Vec<String>>,
    pub user_id: Uuid,
}

/// Request for listing notes in the active or archived view.
#[derive(Debug, Clone)]
pub struct ListNotesRequest {
    pub user_id: Uuid,
    /// Case-insensitive substring match against title OR content.
    pub search: Option<String>,
    /// None lists all non-deleted notes; Some filters by the archived flag.
    pub archived: Option<bool>,
}

/// Request for creating a new label.
#[derive(Debug, Clone)]
pub struct CreateLabelRequest {
    pub name: String,
    pub user_id: Uuid,
}
