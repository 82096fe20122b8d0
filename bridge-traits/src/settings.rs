//! Settings Store Abstraction
//!
//! Key-value preferences persisted by the host (Android `SharedPreferences`,
//! `UserDefaults`, or a SQLite table on desktop).

use async_trait::async_trait;

use crate::error::Result;

/// Well-known preference keys read by the core.
pub mod keys {
    /// When `true` the engine never contacts the remote server.
    pub const OFFLINE_MODE: &str = "offline_mode";
}

/// Settings store trait
///
/// Provides persistent key-value storage for user preferences. Values are
/// typed at the API boundary; implementations may store them as text.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::settings::{keys, SettingsStore};
///
/// async fn offline(settings: &dyn SettingsStore) -> bool {
///     settings.get_bool(keys::OFFLINE_MODE).await.ok().flatten().unwrap_or(false)
/// }
/// ```
#[async_trait]
pub trait SettingsStore: Send + Sync {
    /// Store a string value
    async fn set_string(&self, key: &str, value: &str) -> Result<()>;

    /// Retrieve a string value
    async fn get_string(&self, key: &str) -> Result<Option<String>>;

    /// Store a boolean value
    async fn set_bool(&self, key: &str, value: bool) -> Result<()>;

    /// Retrieve a boolean value
    async fn get_bool(&self, key: &str) -> Result<Option<bool>>;

    /// Delete a setting
    async fn delete(&self, key: &str) -> Result<()>;

    /// Check if a setting exists
    async fn has_key(&self, key: &str) -> Result<bool> {
        Ok(self.get_string(key).await?.is_some())
    }
}
