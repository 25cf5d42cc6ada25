//! Label repository implementation.
//!
//! Labels are a per-user registry of names. Notes carry label names as a
//! freestanding list, so nothing here cascades into notes.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use jot_core::{new_v7, CreateLabelRequest, Error, Label, LabelRepository, Result};

/// SQLite implementation of LabelRepository.
#[derive(Clone)]
pub struct SqliteLabelRepository {
    pool: SqlitePool,
}

impl SqliteLabelRepository {
    /// Create a new SqliteLabelRepository with the given connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LabelRepository for SqliteLabelRepository {
    async fn create(&self, req: CreateLabelRequest) -> Result<Label> {
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;

        let existing: Option<Uuid> =
            sqlx::query_scalar("SELECT id FROM labels WHERE name = ? AND user_id = ?")
                .bind(&req.name)
                .bind(req.user_id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(Error::Database)?;
        if existing.is_some() {
            return Err(Error::Conflict("Label already exists".to_string()));
        }

        let label = Label {
            id: new_v7(),
            name: req.name,
            user_id: req.user_id,
            created_at: Utc::now(),
        };

        sqlx::query("INSERT INTO labels (id, name, user_id, created_at) VALUES (?, ?, ?, ?)")
            .bind(label.id)
            .bind(&label.name)
            .bind(label.user_id)
            .bind(label.created_at)
            .execute(&mut *tx)
            .await
            .map_err(Error::Database)?;

        tx.commit().await.map_err(Error::Database)?;
        Ok(label)
    }

    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<Label>> {
        let rows = sqlx::query("SELECT * FROM labels WHERE user_id = ? ORDER BY name")
            .bind(user_id)
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)?;

        let labels = rows
            .into_iter()
            .map(|row| Label {
                id: row.get("id"),
                name: row.get("name"),
                user_id: row.get("user_id"),
                created_at: row.get("created_at"),
            })
            .collect();

        Ok(labels)
    }
}
