//! Jellyfin API request and response types
//!
//! Only the fields the offline engine consumes are modeled; everything else
//! in the payloads is ignored.

use bridge_traits::remote::RemoteUserData;
use serde::{Deserialize, Serialize};

/// `UserItemDataDto` as embedded in item responses.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct UserItemData {
    #[serde(default)]
    pub played: bool,

    #[serde(default)]
    pub is_favorite: bool,

    #[serde(default)]
    pub playback_position_ticks: i64,

    #[serde(default)]
    pub unplayed_item_count: Option<i32>,
}

impl From<UserItemData> for RemoteUserData {
    fn from(data: UserItemData) -> Self {
        Self {
            played: data.played,
            favorite: data.is_favorite,
            playback_position_ticks: data.playback_position_ticks,
            unplayed_item_count: data.unplayed_item_count,
        }
    }
}

/// Subset of `BaseItemDto` returned by `GET /Users/{user}/Items/{item}`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ItemResponse {
    pub id: String,

    #[serde(default)]
    pub name: Option<String>,

    /// Absent when the server has no data for this user yet
    #[serde(default)]
    pub user_data: Option<UserItemData>,
}

/// Body of `POST /Sessions/Playing/Progress`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct PlaybackProgressInfo {
    pub item_id: String,
    pub position_ticks: i64,
    pub is_paused: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_response_with_user_data() {
        let json = r#"{
            "Id": "4b1f0c6e3a2d4e5f8a9b0c1d2e3f4a5b",
            "Name": "Pilot",
            "Type": "Episode",
            "UserData": {
                "Played": true,
                "IsFavorite": false,
                "PlaybackPositionTicks": 1200000000,
                "PlayCount": 2
            }
        }"#;

        let item: ItemResponse = serde_json::from_str(json).unwrap();
        let data: RemoteUserData = item.user_data.unwrap().into();

        assert!(data.played);
        assert!(!data.favorite);
        assert_eq!(data.playback_position_ticks, 1_200_000_000);
        assert_eq!(data.unplayed_item_count, None);
    }

    #[test]
    fn test_item_response_without_user_data() {
        let item: ItemResponse = serde_json::from_str(r#"{"Id":"abc"}"#).unwrap();

        assert!(item.user_data.is_none());
        assert!(item.name.is_none());
    }

    #[test]
    fn test_progress_body_is_pascal_case() {
        let body = PlaybackProgressInfo {
            item_id: "abc".to_string(),
            position_ticks: 42,
            is_paused: true,
        };

        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["ItemId"], "abc");
        assert_eq!(json["PositionTicks"], 42);
        assert_eq!(json["IsPaused"], true);
    }
}
