//! # Core Runtime Module
//!
//! Foundational runtime infrastructure for the offline media core:
//! - Logging and tracing infrastructure
//! - Configuration management
//! - Event bus system
//!
//! Every other core crate depends on this one for its conventions: the
//! `tracing` setup, the `CoreConfig` builder and the broadcast event bus.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use error::{Error, Result};
