//! # Core Configuration Module
//!
//! The configuration system uses a builder pattern to construct a `CoreConfig`
//! holding every dependency and setting the offline core needs. `build()`
//! fails fast with actionable messages when a capability is missing.
//!
//! ## Required
//!
//! - A database path
//! - A remote media server: either an injected `MediaServer`, or a server URL,
//!   user id and access token plus an `HttpClient` to build one from
//! - A `BackgroundExecutor` for user-data sync
//!
//! ## Optional
//!
//! - `NetworkMonitor` - gates sync work on connectivity
//! - `SettingsStore` - host preferences, including the `offline_mode` key
//!
//! When the `desktop-shims` feature is enabled, desktop defaults for
//! `HttpClient`, `NetworkMonitor` and `BackgroundExecutor` are injected
//! automatically if not provided.
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::CoreConfig;
//!
//! let config = CoreConfig::builder()
//!     .database_path("/path/to/offline.db")
//!     .server_url("https://media.example.com")
//!     .user_id(user_id)
//!     .access_token(token)
//!     .build()?;
//! ```

use crate::error::{Error, Result};
use crate::logging::redact_if_sensitive;
use bridge_traits::{BackgroundExecutor, HttpClient, MediaServer, NetworkMonitor, SettingsStore};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Pause after a successful reachability probe before it reports back.
pub const DEFAULT_PROBE_GRACE_DELAY: Duration = Duration::from_millis(100);

/// How often unmet sync constraints are re-checked.
pub const DEFAULT_CONSTRAINT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Core configuration for the offline media core.
///
/// Use [`CoreConfigBuilder`] to construct instances.
#[derive(Clone)]
pub struct CoreConfig {
    /// Path to the SQLite database file
    pub database_path: PathBuf,

    /// Base URL of the media server, when the core builds its own connector
    pub server_url: Option<String>,

    pub user_id: Option<Uuid>,

    pub access_token: Option<String>,

    /// Never contact the server, regardless of the settings store
    pub offline_mode: bool,

    pub probe_grace_delay: Duration,

    /// Only sync on unmetered WiFi/Ethernet
    pub sync_requires_wifi: bool,

    pub constraint_poll_interval: Duration,

    pub http_client: Option<Arc<dyn HttpClient>>,

    pub network_monitor: Option<Arc<dyn NetworkMonitor>>,

    pub background_executor: Arc<dyn BackgroundExecutor>,

    pub settings_store: Option<Arc<dyn SettingsStore>>,

    /// Injected server implementation; takes precedence over `server_url`
    pub media_server: Option<Arc<dyn MediaServer>>,
}

impl std::fmt::Debug for CoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreConfig")
            .field("database_path", &self.database_path)
            .field("server_url", &self.server_url)
            .field("user_id", &self.user_id)
            .field(
                "access_token",
                &self
                    .access_token
                    .as_deref()
                    .map(|t| redact_if_sensitive("access_token", t)),
            )
            .field("offline_mode", &self.offline_mode)
            .field("probe_grace_delay", &self.probe_grace_delay)
            .field("sync_requires_wifi", &self.sync_requires_wifi)
            .field("constraint_poll_interval", &self.constraint_poll_interval)
            .field("http_client", &self.http_client.is_some())
            .field("network_monitor", &self.network_monitor.is_some())
            .field("settings_store", &self.settings_store.is_some())
            .field("media_server", &self.media_server.is_some())
            .finish()
    }
}

impl CoreConfig {
    /// Creates a new builder for constructing a `CoreConfig`.
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }

    /// Validates the configuration and returns an error if invalid.
    ///
    /// This checks:
    /// - Database path is not empty
    /// - Server URL, when given, is an http(s) URL
    /// - A media server is injected or can be built from URL, credentials and HTTP client
    /// - Poll interval is non-zero
    pub fn validate(&self) -> Result<()> {
        if self.database_path.as_os_str().is_empty() {
            return Err(Error::Config("Database path cannot be empty".to_string()));
        }

        if let Some(url) = &self.server_url {
            validate_server_url(url)?;
        }

        if self.constraint_poll_interval.is_zero() {
            return Err(Error::Config(
                "Constraint poll interval must be greater than zero".to_string(),
            ));
        }

        if self.media_server.is_some() {
            return Ok(());
        }

        if self.server_url.is_none() {
            return Err(Error::CapabilityMissing {
                capability: "MediaServer".to_string(),
                message: "No media server available. Set .server_url() with a user id and \
                          access token, or inject a MediaServer implementation."
                    .to_string(),
            });
        }

        if self.user_id.is_none() || self.access_token.is_none() {
            return Err(Error::Config(
                "Server URL set without credentials. Use .user_id() and .access_token()."
                    .to_string(),
            ));
        }

        if self.http_client.is_none() {
            return Err(http_client_missing_error());
        }

        Ok(())
    }
}

fn validate_server_url(url: &str) -> Result<()> {
    let rest = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
        .ok_or_else(|| {
            Error::Config(format!(
                "Server URL '{}' must start with http:// or https://",
                url
            ))
        })?;

    if rest.trim_matches('/').is_empty() {
        return Err(Error::Config(format!("Server URL '{}' has no host", url)));
    }

    Ok(())
}

fn http_client_missing_error() -> Error {
    Error::CapabilityMissing {
        capability: "HttpClient".to_string(),
        message: "HttpClient implementation is required to reach the media server. \
                 Desktop: enable the 'desktop-shims' feature to use ReqwestHttpClient. \
                 Mobile: inject the platform-native HTTP adapter."
            .to_string(),
    }
}

#[cfg(not(feature = "desktop-shims"))]
fn background_executor_missing_error() -> Error {
    Error::CapabilityMissing {
        capability: "BackgroundExecutor".to_string(),
        message: "BackgroundExecutor implementation is required for user-data sync. \
                 Desktop: enable the 'desktop-shims' feature to use TokioBackgroundExecutor. \
                 Android: inject a WorkManager-backed executor."
            .to_string(),
    }
}

#[cfg(feature = "desktop-shims")]
fn provide_default_http_client() -> Result<Option<Arc<dyn HttpClient>>> {
    use bridge_desktop::ReqwestHttpClient;

    let client = ReqwestHttpClient::new()
        .map_err(|e| Error::Internal(format!("Failed to create default HttpClient: {}", e)))?;
    Ok(Some(Arc::new(client)))
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_http_client() -> Result<Option<Arc<dyn HttpClient>>> {
    Ok(None)
}

#[cfg(feature = "desktop-shims")]
fn provide_default_network_monitor() -> Option<Arc<dyn NetworkMonitor>> {
    Some(Arc::new(bridge_desktop::DesktopNetworkMonitor::new()))
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_network_monitor() -> Option<Arc<dyn NetworkMonitor>> {
    None
}

#[cfg(feature = "desktop-shims")]
fn provide_default_background_executor(
    monitor: Option<Arc<dyn NetworkMonitor>>,
    poll_interval: Duration,
) -> Result<Arc<dyn BackgroundExecutor>> {
    use bridge_desktop::TokioBackgroundExecutor;

    let executor =
        TokioBackgroundExecutor::with_network_monitor(monitor).with_constraint_poll_interval(poll_interval);
    Ok(Arc::new(executor))
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_background_executor(
    _monitor: Option<Arc<dyn NetworkMonitor>>,
    _poll_interval: Duration,
) -> Result<Arc<dyn BackgroundExecutor>> {
    Err(background_executor_missing_error())
}

/// Builder for [`CoreConfig`].
#[derive(Default)]
pub struct CoreConfigBuilder {
    database_path: Option<PathBuf>,
    server_url: Option<String>,
    user_id: Option<Uuid>,
    access_token: Option<String>,
    offline_mode: bool,
    probe_grace_delay: Option<Duration>,
    sync_requires_wifi: bool,
    constraint_poll_interval: Option<Duration>,
    http_client: Option<Arc<dyn HttpClient>>,
    network_monitor: Option<Arc<dyn NetworkMonitor>>,
    background_executor: Option<Arc<dyn BackgroundExecutor>>,
    settings_store: Option<Arc<dyn SettingsStore>>,
    media_server: Option<Arc<dyn MediaServer>>,
}

impl CoreConfigBuilder {
    /// Sets the path to the SQLite database file (required).
    pub fn database_path(mut self, path: impl AsRef<Path>) -> Self {
        self.database_path = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn server_url(mut self, url: impl Into<String>) -> Self {
        self.server_url = Some(url.into());
        self
    }

    pub fn user_id(mut self, user_id: Uuid) -> Self {
        self.user_id = Some(user_id);
        self
    }

    pub fn access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    /// Force offline mode; the probe is skipped and never touches the network.
    pub fn offline_mode(mut self, offline: bool) -> Self {
        self.offline_mode = offline;
        self
    }

    pub fn probe_grace_delay(mut self, delay: Duration) -> Self {
        self.probe_grace_delay = Some(delay);
        self
    }

    pub fn sync_requires_wifi(mut self, requires_wifi: bool) -> Self {
        self.sync_requires_wifi = requires_wifi;
        self
    }

    pub fn constraint_poll_interval(mut self, interval: Duration) -> Self {
        self.constraint_poll_interval = Some(interval);
        self
    }

    /// Sets the HTTP client (optional with `desktop-shims`).
    pub fn http_client(mut self, client: Arc<dyn HttpClient>) -> Self {
        self.http_client = Some(client);
        self
    }

    pub fn network_monitor(mut self, monitor: Arc<dyn NetworkMonitor>) -> Self {
        self.network_monitor = Some(monitor);
        self
    }

    /// Sets the background executor (optional with `desktop-shims`).
    pub fn background_executor(mut self, executor: Arc<dyn BackgroundExecutor>) -> Self {
        self.background_executor = Some(executor);
        self
    }

    pub fn settings_store(mut self, store: Arc<dyn SettingsStore>) -> Self {
        self.settings_store = Some(store);
        self
    }

    /// Inject a media server, bypassing the built-in connector.
    pub fn media_server(mut self, server: Arc<dyn MediaServer>) -> Self {
        self.media_server = Some(server);
        self
    }

    /// Builds the final `CoreConfig` instance.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] for missing or malformed values
    /// - [`Error::CapabilityMissing`] when a required bridge is absent and no
    ///   desktop default is available
    pub fn build(self) -> Result<CoreConfig> {
        let database_path = self.database_path.ok_or_else(|| {
            Error::Config("Database path is required. Use .database_path() to set it.".to_string())
        })?;

        let constraint_poll_interval = self
            .constraint_poll_interval
            .unwrap_or(DEFAULT_CONSTRAINT_POLL_INTERVAL);

        // Only build a default client when the core has to make its own connector.
        let http_client = match self.http_client {
            Some(client) => Some(client),
            None if self.media_server.is_none() => provide_default_http_client()?,
            None => None,
        };

        let network_monitor = self
            .network_monitor
            .or_else(provide_default_network_monitor);

        let background_executor = match self.background_executor {
            Some(executor) => executor,
            None => provide_default_background_executor(
                network_monitor.clone(),
                constraint_poll_interval,
            )?,
        };

        let config = CoreConfig {
            database_path,
            server_url: self.server_url,
            user_id: self.user_id,
            access_token: self.access_token,
            offline_mode: self.offline_mode,
            probe_grace_delay: self.probe_grace_delay.unwrap_or(DEFAULT_PROBE_GRACE_DELAY),
            sync_requires_wifi: self.sync_requires_wifi,
            constraint_poll_interval,
            http_client,
            network_monitor,
            background_executor,
            settings_store: self.settings_store,
            media_server: self.media_server,
        };

        config.validate()?;

        Ok(config)
    }
}
