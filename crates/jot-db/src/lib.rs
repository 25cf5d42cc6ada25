//! # jot-db
//!
//! SQLite database layer for jot.
//!
//! This crate provides:
//! - Connection pool management (file-backed or in-memory)
//! - Repository implementations for users, notes, and labels
//! - The trash purge sweeper
//!
//! ## Example
//!
//! ```rust,ignore
//! use jot_db::Database;
//! use jot_core::{CreateNoteRequest, NoteRepository};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = Database::connect("sqlite:jot.db").await?;
//!     db.migrate().await?;
//!
//!     let note = db.notes.insert(CreateNoteRequest {
//!         title: None,
//!         content: "Hello, world!".to_string(),
//!         labels: None,
//!         user_id: some_user_id,
//!     }).await?;
//!
//!     println!("Created note: {}", note.id);
//!     db.close().await;
//!     Ok(())
//! }
//! ```

pub mod labels;
pub mod notes;
pub mod pool;
pub mod users;

// Re-export core types
pub use jot_core::*;

/// Escape LIKE wildcard characters (`%`, `_`, `\`) in user input.
pub fn escape_like(input: &str) -> String {
    input
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

// Re-export repository implementations
pub use labels::SqliteLabelRepository;
pub use notes::{generate_share_token, SqliteNoteRepository};
pub use pool::{
    create_memory_pool, create_pool, create_pool_with_config, log_pool_metrics, PoolConfig,
};
pub use users::SqliteUserRepository;

/// Combined database context with all repositories.
///
/// An explicitly constructed, injected handle with an open/close
/// lifecycle. Tests build a fresh in-memory instance per test via
/// [`Database::connect_memory`].
#[derive(Clone)]
pub struct Database {
    /// The underlying connection pool.
    pub pool: sqlx::SqlitePool,
    /// Note repository for CRUD and lifecycle operations.
    pub notes: SqliteNoteRepository,
    /// User repository for accounts and credential lookup.
    pub users: SqliteUserRepository,
    /// Label repository.
    pub labels: SqliteLabelRepository,
}

impl Database {
    /// Create a new Database instance from a connection pool.
    pub fn new(pool: sqlx::SqlitePool) -> Self {
        Self {
            notes: SqliteNoteRepository::new(pool.clone()),
            users: SqliteUserRepository::new(pool.clone()),
            labels: SqliteLabelRepository::new(pool.clone()),
            pool,
        }
    }

    /// Create a new Database instance by connecting to the given URL.
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = create_pool(url).await?;
        Ok(Self::new(pool))
    }

    /// Create with custom pool configuration.
    pub async fn connect_with_config(url: &str, config: PoolConfig) -> Result<Self> {
        let pool = create_pool_with_config(url, config).await?;
        Ok(Self::new(pool))
    }

    /// Connect to a fresh private in-memory database.
    pub async fn connect_memory() -> Result<Self> {
        let pool = create_memory_pool().await?;
        Ok(Self::new(pool))
    }

    /// Run pending migrations.
    #[cfg(feature = "migrations")]
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .map_err(|e| Error::Database(sqlx::Error::Migrate(Box::new(e))))?;
        Ok(())
    }

    /// Get the underlying connection pool.
    pub fn pool(&self) -> &sqlx::SqlitePool {
        &self.pool
    }

    /// Close the pool, waiting for in-flight statements to finish.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}
