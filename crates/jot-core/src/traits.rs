//! Core traits for jot abstractions.
//!
//! These traits define the interfaces that concrete implementations
//! must satisfy, enabling pluggable backends and testability.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;
use crate::lifecycle::RetentionWindow;
use crate::models::*;
use crate::patch::NotePatch;

/// Repository for note CRUD and lifecycle operations.
#[async_trait]
pub trait NoteRepository: Send + Sync {
    /// Insert a new note. The note starts active, unarchived, unshared.
    async fn insert(&self, req: CreateNoteRequest) -> Result<Note>;

    /// Fetch a note by id. Soft-deleted notes are not found.
    async fn fetch(&self, id: Uuid) -> Result<Note>;

    /// List non-deleted notes for a user, optionally filtered by the
    /// archived flag and a substring search. Most recently updated first.
    async fn list(&self, req: ListNotesRequest) -> Result<Vec<Note>>;

    /// Apply a partial update. Soft-deleted and missing notes both
    /// surface as not-found.
    async fn update(&self, id: Uuid, patch: NotePatch) -> Result<Note>;

    /// Move a note to the trash. Fails as not-found if already deleted,
    /// so the retention clock is never re-stamped.
    async fn soft_delete(&self, id: Uuid) -> Result<()>;

    /// Bring a trashed note back. Fails as not-found if not deleted.
    async fn restore(&self, id: Uuid) -> Result<Note>;

    /// List a user's trashed notes that have not yet expired, most
    /// recently deleted first, each annotated with remaining seconds.
    async fn list_trash(&self, user_id: Uuid, window: RetentionWindow)
        -> Result<Vec<TrashedNote>>;

    /// Physically delete every note, across all users, whose deletion
    /// timestamp is older than the window. Returns the number removed.
    async fn purge_expired(&self, window: RetentionWindow) -> Result<u64>;

    /// Resolve a share token to the public projection of its note.
    async fn fetch_shared(&self, token: &str) -> Result<SharedNote>;

    /// Check if a note row exists (deleted or not).
    async fn exists(&self, id: Uuid) -> Result<bool>;
}

/// Repository for user accounts.
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Create a new user. A duplicate email is a conflict.
    async fn create(&self, req: CreateUserRequest) -> Result<UserPublic>;

    /// Look up a user by email, hash included, for credential checks.
    async fn find_by_email(&self, email: &str) -> Result<Option<User>>;

    /// Fetch the public projection of a user.
    async fn fetch(&self, id: Uuid) -> Result<UserPublic>;

    /// Check if a user exists.
    async fn exists(&self, id: Uuid) -> Result<bool>;
}

/// Repository for labels.
#[async_trait]
pub trait LabelRepository: Send + Sync {
    /// Create a label. A duplicate (name, user) pair is a conflict.
    async fn create(&self, req: CreateLabelRequest) -> Result<Label>;

    /// List a user's labels ordered by name.
    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<Label>>;
}
