//! # Local Cache Store
//!
//! Owns the on-device cache of the remote media catalog.
//!
//! ## Overview
//!
//! This module manages:
//! - Domain models (`CachedItem`, `ItemKind`, `MediaSource`, `UserData`)
//! - Column encoding with recover-to-default decoding for serialized blobs
//! - SQLite pool setup and migrations
//! - The `CachedItemRepository` used by the downloads engine and sync worker

pub mod converters;
pub mod db;
pub mod error;
pub mod models;
pub mod repositories;

pub use error::{LibraryError, Result};
pub use models::{CachedItem, Chapter, ItemKind, MediaSource, SourceType, UserData};
pub use repositories::{CachedItemRepository, SqliteCachedItemRepository};
