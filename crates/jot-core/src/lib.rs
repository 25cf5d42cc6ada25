//! # jot-core
//!
//! Core types, traits, and abstractions for the jot note service.
//!
//! This crate provides the foundational data structures, the repository
//! trait definitions, and the pure note-lifecycle logic (patch
//! application, trash retention math) that the persistence and HTTP
//! crates depend on.

pub mod error;
pub mod lifecycle;
pub mod models;
pub mod patch;
pub mod traits;
pub mod uuid_utils;

// Re-export commonly used types at crate root
pub use error::{Error, Result};
pub use lifecycle::{is_expired, time_left, RetentionWindow};
pub use models::*;
pub use patch::NotePatch;
pub use traits::*;
pub use uuid_utils::new_v7;
