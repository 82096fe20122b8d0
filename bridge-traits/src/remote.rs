//! Remote Media Server Abstraction
//!
//! The subset of the remote catalog API the offline engine relies on:
//! reachability and per-item user data.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Result;

/// Public server information returned without authentication.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SystemInfo {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub server_name: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub product_name: Option<String>,
}

/// Per-user watch state of one item as held by the server.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteUserData {
    pub played: bool,
    pub favorite: bool,
    pub playback_position_ticks: i64,
    pub unplayed_item_count: Option<i32>,
}

/// Remote media server trait
///
/// Only success or failure of each call is relied upon by the core; a failed
/// call is a connectivity fault, never a reason to change cached content.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MediaServer: Send + Sync {
    /// Unauthenticated reachability check.
    async fn get_public_system_info(&self) -> Result<SystemInfo>;

    /// Fetch the current user's data for an item.
    async fn get_user_data(&self, item_id: Uuid) -> Result<RemoteUserData>;

    /// Push the current user's data for an item.
    async fn push_user_data(&self, item_id: Uuid, data: &RemoteUserData) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BridgeError;

    #[test]
    fn test_system_info_deserializes_pascal_case() {
        let json = r#"{"Id":"abc","ServerName":"home","Version":"10.8.13","LocalAddress":"x"}"#;
        let info: SystemInfo = serde_json::from_str(json).unwrap();

        assert_eq!(info.id.as_deref(), Some("abc"));
        assert_eq!(info.server_name.as_deref(), Some("home"));
        assert_eq!(info.version.as_deref(), Some("10.8.13"));
        assert_eq!(info.product_name, None);
    }

    #[tokio::test]
    async fn test_mock_media_server() {
        let mut server = MockMediaServer::new();
        server
            .expect_get_public_system_info()
            .returning(|| Err(BridgeError::Unreachable("refused".into())));

        let err = server.get_public_system_info().await.unwrap_err();
        assert!(err.is_connectivity());
    }
}
