//! # Downloads Engine
//!
//! Turns the locally cached catalog into the offline "downloads" view:
//!
//! - [`aggregation`]: partitioning, virtual show synthesis, genre facets
//! - [`probe`]: fire-and-forget reachability check of the media server
//! - [`state`]: current snapshot plus transient notices
//! - [`engine`]: the caller-facing façade tying them together
//!
//! ```rust,ignore
//! let engine = DownloadsEngine::new(repository, server, DownloadsConfig::default());
//! let mut events = engine.take_events().expect("first call");
//! let (_probe, snapshot) = engine.start().await;
//! engine.select_genre(Some("Drama".into())).await;
//! ```

pub mod aggregation;
pub mod engine;
pub mod error;
pub mod probe;
pub mod state;

pub use aggregation::{CollectionSection, SectionKind};
pub use engine::{DownloadsConfig, DownloadsEngine};
pub use error::{DownloadsError, Result};
pub use probe::{ConnectivityProbe, ProbeOutcome};
pub use state::{DownloadsEvent, DownloadsEvents, DownloadsSnapshot, StateMachine, UiState};
