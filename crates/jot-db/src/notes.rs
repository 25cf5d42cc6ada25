//! Note repository implementation.

use async_trait::async_trait;
use chrono::Utc;
use rand::Rng;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tracing::{debug, info};
use uuid::Uuid;

use jot_core::{
    is_expired, lifecycle, new_v7, CreateNoteRequest, Error, ListNotesRequest, Note,
    NotePatch, NoteRepository, Result, RetentionWindow, SharedNote, TrashedNote,
};

use crate::escape_like;

/// Length of the random share token in bytes; rendered as hex it comes
/// out twice as long.
const SHARE_TOKEN_BYTES: usize = 16;

/// Generate an opaque share token: random bytes as fixed-width hex.
///
/// No uniqueness retry; the share_token UNIQUE constraint is the
/// backstop against the negligible collision case.
pub fn generate_share_token() -> String {
    let bytes: [u8; SHARE_TOKEN_BYTES] = rand::thread_rng().gen();
    hex::encode(bytes)
}

/// Map a database row to a Note, expanding the labels JSON.
fn map_note_row(row: &SqliteRow) -> Result<Note> {
    let labels_json: String = row.get("labels");
    let labels: Vec<String> = serde_json::from_str(&labels_json)?;

    Ok(Note {
        id: row.get("id"),
        title: row.get("title"),
        content: row.get("content"),
        user_id: row.get("user_id"),
        is_archived: row.get("is_archived"),
        is_shared: row.get("is_shared"),
        share_token: row.get("share_token"),
        labels,
        deleted_at: row.get("deleted_at"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

/// SQLite implementation of NoteRepository.
#[derive(Clone)]
pub struct SqliteNoteRepository {
    pool: SqlitePool,
}

impl SqliteNoteRepository {
    /// Create a new SqliteNoteRepository with the given connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl NoteRepository for SqliteNoteRepository {
    async fn insert(&self, req: CreateNoteRequest) -> Result<Note> {
        let now = Utc::now();
        let note = Note {
            id: new_v7(),
            title: req.title.unwrap_or_default(),
            content: req.content,
            user_id: req.user_id,
            is_archived: false,
            is_shared: false,
            share_token: None,
            labels: req.labels.unwrap_or_default(),
            deleted_at: None,
            created_at: now,
            updated_at: now,
        };
        let labels_json = serde_json::to_string(&note.labels)?;

        sqlx::query(
            "INSERT INTO notes (id, title, content, user_id, is_archived, is_shared,
                                share_token, labels, deleted_at, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(note.id)
        .bind(&note.title)
        .bind(&note.content)
        .bind(note.user_id)
        .bind(note.is_archived)
        .bind(note.is_shared)
        .bind(note.share_token.as_deref())
        .bind(&labels_json)
        .bind(note.deleted_at)
        .bind(note.created_at)
        .bind(note.updated_at)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        debug!(
            subsystem = "database",
            component = "notes",
            op = "insert",
            note_id = %note.id,
            "Note created"
        );
        Ok(note)
    }

    async fn fetch(&self, id: Uuid) -> Result<Note> {
        let row = sqlx::query("SELECT * FROM notes WHERE id = ? AND deleted_at IS NULL")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?
            .ok_or(Error::NoteNotFound(id))?;

        map_note_row(&row)
    }

    async fn list(&self, req: ListNotesRequest) -> Result<Vec<Note>> {
        let mut sql =
            String::from("SELECT * FROM notes WHERE user_id = ? AND deleted_at IS NULL");
        if req.search.is_some() {
            sql.push_str(" AND (title LIKE ? ESCAPE '\\' OR content LIKE ? ESCAPE '\\')");
        }
        match req.archived {
            Some(true) => sql.push_str(" AND is_archived = 1"),
            Some(false) => sql.push_str(" AND is_archived = 0"),
            None => {}
        }
        sql.push_str(" ORDER BY updated_at DESC");

        let mut query = sqlx::query(&sql).bind(req.user_id);
        let pattern = req
            .search
            .as_deref()
            .map(|s| format!("%{}%", escape_like(s)));
        if let Some(pattern) = &pattern {
            query = query.bind(pattern).bind(pattern);
        }

        let rows = query
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)?;

        rows.iter().map(map_note_row).collect()
    }

    async fn update(&self, id: Uuid, patch: NotePatch) -> Result<Note> {
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;

        let row = sqlx::query("SELECT * FROM notes WHERE id = ? AND deleted_at IS NULL")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(Error::Database)?
            .ok_or(Error::NoteNotFound(id))?;
        let current = map_note_row(&row)?;

        let next = patch.apply(&current, Utc::now(), generate_share_token);
        let labels_json = serde_json::to_string(&next.labels)?;

        let result = sqlx::query(
            "UPDATE notes SET title = ?, content = ?, is_archived = ?, is_shared = ?,
                              share_token = ?, labels = ?, updated_at = ?
             WHERE id = ? AND deleted_at IS NULL",
        )
        .bind(&next.title)
        .bind(&next.content)
        .bind(next.is_archived)
        .bind(next.is_shared)
        .bind(next.share_token.as_deref())
        .bind(&labels_json)
        .bind(next.updated_at)
        .bind(id)
        .execute(&mut *tx)
        .await
        .map_err(Error::Database)?;

        if result.rows_affected() == 0 {
            return Err(Error::NoteNotFound(id));
        }

        tx.commit().await.map_err(Error::Database)?;

        debug!(
            subsystem = "database",
            component = "notes",
            op = "update",
            note_id = %id,
            "Note updated"
        );
        Ok(next)
    }

    async fn soft_delete(&self, id: Uuid) -> Result<()> {
        let now = Utc::now();
        // The deleted_at guard keeps a second delete from re-stamping
        // the retention clock.
        let result = sqlx::query(
            "UPDATE notes SET deleted_at = ?, updated_at = ? WHERE id = ? AND deleted_at IS NULL",
        )
        .bind(now)
        .bind(now)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        if result.rows_affected() == 0 {
            return Err(Error::NoteNotFound(id));
        }

        debug!(
            subsystem = "database",
            component = "notes",
            op = "soft_delete",
            note_id = %id,
            "Note moved to trash"
        );
        Ok(())
    }

    async fn restore(&self, id: Uuid) -> Result<Note> {
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;

        let result = sqlx::query(
            "UPDATE notes SET deleted_at = NULL, updated_at = ?
             WHERE id = ? AND deleted_at IS NOT NULL",
        )
        .bind(Utc::now())
        .bind(id)
        .execute(&mut *tx)
        .await
        .map_err(Error::Database)?;

        if result.rows_affected() == 0 {
            return Err(Error::NoteNotFound(id));
        }

        let row = sqlx::query("SELECT * FROM notes WHERE id = ?")
            .bind(id)
            .fetch_one(&mut *tx)
            .await
            .map_err(Error::Database)?;
        let note = map_note_row(&row)?;

        tx.commit().await.map_err(Error::Database)?;

        debug!(
            subsystem = "database",
            component = "notes",
            op = "restore",
            note_id = %id,
            "Note restored from trash"
        );
        Ok(note)
    }

    async fn list_trash(
        &self,
        user_id: Uuid,
        window: RetentionWindow,
    ) -> Result<Vec<TrashedNote>> {
        let rows = sqlx::query(
            "SELECT * FROM notes WHERE user_id = ? AND deleted_at IS NOT NULL
             ORDER BY deleted_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        // Expiry is derived from deleted_at and the current instant;
        // rows past the window stay invisible even before a purge runs.
        let now = Utc::now();
        let mut trash = Vec::new();
        for row in &rows {
            let note = map_note_row(row)?;
            let deleted_at = match note.deleted_at {
                Some(deleted_at) => deleted_at,
                None => continue,
            };
            if is_expired(deleted_at, now, window) {
                continue;
            }
            let time_left = lifecycle::time_left(deleted_at, now, window);
            trash.push(TrashedNote { note, time_left });
        }
        Ok(trash)
    }

    async fn purge_expired(&self, window: RetentionWindow) -> Result<u64> {
        let cutoff = Utc::now() - chrono::Duration::seconds(window.as_secs());
        let result =
            sqlx::query("DELETE FROM notes WHERE deleted_at IS NOT NULL AND deleted_at < ?")
                .bind(cutoff)
                .execute(&self.pool)
                .await
                .map_err(Error::Database)?;

        let removed = result.rows_affected();
        if removed > 0 {
            info!(
                subsystem = "database",
                component = "notes",
                op = "purge",
                result_count = removed,
                "Purged expired notes"
            );
        }
        Ok(removed)
    }

    async fn fetch_shared(&self, token: &str) -> Result<SharedNote> {
        let row = sqlx::query(
            "SELECT n.id, n.title, n.content, n.labels, n.created_at, n.updated_at,
                    u.name AS owner_name
             FROM notes n
             JOIN users u ON n.user_id = u.id
             WHERE n.share_token = ? AND n.is_shared = 1 AND n.deleted_at IS NULL",
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?
        .ok_or_else(|| Error::NotFound("Note does not exist or is not shared".to_string()))?;

        let labels_json: String = row.get("labels");
        let labels: Vec<String> = serde_json::from_str(&labels_json)?;

        Ok(SharedNote {
            id: row.get("id"),
            title: row.get("title"),
            content: row.get("content"),
            labels,
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
            owner_name: row.get("owner_name"),
        })
    }

    async fn exists(&self, id: Uuid) -> Result<bool> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM notes WHERE id = ?)")
            .bind(id)
            .fetch_one(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(exists)
    }
}
