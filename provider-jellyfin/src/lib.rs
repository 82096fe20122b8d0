//! # Jellyfin Provider
//!
//! Implements the `MediaServer` bridge trait against the Jellyfin REST API.
//!
//! ## Overview
//!
//! This module provides:
//! - Unauthenticated reachability checks (`/System/Info/Public`)
//! - Per-item user data reads for the authenticated user
//! - Played, favorite and resume-position writes

pub mod connector;
pub mod error;
pub mod types;

pub use connector::JellyfinConnector;
pub use error::{JellyfinError, Result};
