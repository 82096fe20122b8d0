//! # Host Bridge Traits
//!
//! Capability traits the offline media core requires from its host.
//!
//! ## Traits
//!
//! ### Networking
//! - [`HttpClient`](http::HttpClient) - Async HTTP operations with retry and TLS
//! - [`MediaServer`](remote::MediaServer) - Reachability and user-data calls against the media server
//! - [`NetworkMonitor`](network::NetworkMonitor) - Connectivity and metered network detection
//!
//! ### Platform Integration
//! - [`BackgroundExecutor`](background::BackgroundExecutor) - Unique named work respecting constraints
//! - [`SettingsStore`](settings::SettingsStore) - Key-value preferences such as offline mode
//!
//! ### Utilities
//! - [`Clock`](time::Clock) - Time source for deterministic testing
//! - [`LoggerSink`](time::LoggerSink) - Forward structured logs to host logging
//!
//! ## Fail-Fast Strategy
//!
//! The core refuses to start when a required capability is missing:
//!
//! ```ignore
//! let media_server = config.media_server
//!     .ok_or_else(|| Error::CapabilityMissing {
//!         capability: "MediaServer".to_string(),
//!         message: "Provide a server URL or inject a MediaServer implementation.".to_string(),
//!     })?;
//! ```
//!
//! ## Error Handling
//!
//! All bridge traits return [`BridgeError`](error::BridgeError). Implementations
//! convert platform errors into it and report requests that never produced a
//! response as [`BridgeError::Unreachable`].
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync` so they can be shared across tasks.

pub mod background;
pub mod error;
pub mod http;
pub mod network;
pub mod remote;
pub mod settings;
pub mod time;

pub use error::BridgeError;

// Re-export commonly used types
pub use background::{
    BackgroundExecutor, EnqueueOutcome, ExistingWorkPolicy, TaskConstraints, TaskHandler, TaskId,
    TaskStatus, WorkRequest,
};
pub use http::{HttpClient, HttpMethod, HttpRequest, HttpResponse, RetryPolicy};
pub use network::{NetworkInfo, NetworkMonitor, NetworkStatus, NetworkType};
pub use remote::{MediaServer, RemoteUserData, SystemInfo};
pub use settings::SettingsStore;
pub use time::{Clock, FixedClock, LogEntry, LogLevel, LoggerSink, SystemClock};
