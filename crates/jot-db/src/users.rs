//! User repository implementation.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Row, SqlitePool};
use tracing::info;
use uuid::Uuid;

use jot_core::{new_v7, CreateUserRequest, Error, Result, User, UserPublic, UserRepository};

/// SQLite implementation of UserRepository.
#[derive(Clone)]
pub struct SqliteUserRepository {
    pool: SqlitePool,
}

impl SqliteUserRepository {
    /// Create a new SqliteUserRepository with the given connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRepository for SqliteUserRepository {
    async fn create(&self, req: CreateUserRequest) -> Result<UserPublic> {
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;

        let existing: Option<Uuid> = sqlx::query_scalar("SELECT id FROM users WHERE email = ?")
            .bind(&req.email)
            .fetch_optional(&mut *tx)
            .await
            .map_err(Error::Database)?;
        if existing.is_some() {
            return Err(Error::Conflict("Email is already registered".to_string()));
        }

        let user = User {
            id: new_v7(),
            email: req.email,
            password_hash: req.password_hash,
            name: req.name,
            created_at: Utc::now(),
        };

        sqlx::query(
            "INSERT INTO users (id, email, password_hash, name, created_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(user.id)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.name)
        .bind(user.created_at)
        .execute(&mut *tx)
        .await
        .map_err(Error::Database)?;

        tx.commit().await.map_err(Error::Database)?;

        info!(
            subsystem = "database",
            component = "users",
            op = "create",
            user_id = %user.id,
            "User registered"
        );
        Ok(user.into())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let row = sqlx::query(
            "SELECT id, email, password_hash, name, created_at FROM users WHERE email = ?",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(row.map(|row| User {
            id: row.get("id"),
            email: row.get("email"),
            password_hash: row.get("password_hash"),
            name: row.get("name"),
            created_at: row.get("created_at"),
        }))
    }

    async fn fetch(&self, id: Uuid) -> Result<UserPublic> {
        let row = sqlx::query("SELECT id, email, name, created_at FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?
            .ok_or_else(|| Error::NotFound(format!("User {} not found", id)))?;

        Ok(UserPublic {
            id: row.get("id"),
            email: row.get("email"),
            name: row.get("name"),
            created_at: row.get("created_at"),
        })
    }

    async fn exists(&self, id: Uuid) -> Result<bool> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE id = ?)")
            .bind(id)
            .fetch_one(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(exists)
    }
}
