//! # Repository Pattern Implementation
//!
//! Repository traits and their SQLite implementations.
//!
//! - Traits define the interface consumed by the engine and the sync worker
//! - SQLite implementations use sqlx for async database access
//! - All operations return `Result<T>` for error handling

pub mod items;

pub use items::{CachedItemRepository, SqliteCachedItemRepository};
