//! # Desktop Bridge Implementations
//!
//! Default implementations of bridge traits for desktop platforms
//! (macOS, Windows, Linux):
//! - `HttpClient` using `reqwest`
//! - `NetworkMonitor` using a TCP reachability check
//! - `BackgroundExecutor` using Tokio tasks with a unique-work registry
//! - `SettingsStore` using a SQLite-backed key-value table
//!
//! ## Usage
//!
//! ```ignore
//! use std::sync::Arc;
//! use bridge_desktop::{DesktopNetworkMonitor, ReqwestHttpClient, TokioBackgroundExecutor};
//!
//! #[tokio::main]
//! async fn main() -> bridge_traits::error::Result<()> {
//!     let http_client = Arc::new(ReqwestHttpClient::new()?);
//!     let monitor = Arc::new(DesktopNetworkMonitor::new());
//!     let executor = TokioBackgroundExecutor::with_network_monitor(Some(monitor));
//!     // Use in core configuration
//!     Ok(())
//! }
//! ```

mod background;
mod http;
mod network;
mod settings;

pub use background::{TokioBackgroundExecutor, DEFAULT_CONSTRAINT_POLL_INTERVAL};
pub use http::ReqwestHttpClient;
pub use network::DesktopNetworkMonitor;
pub use settings::SqliteSettingsStore;
