//! Domain models for the offline media cache
//!
//! `CachedItem` is a closed tagged variant: the shared catalog fields live on
//! the struct and the type-specific data lives in [`ItemKind`].

use bridge_traits::remote::RemoteUserData;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// =============================================================================
// Media sources
// =============================================================================

/// Where a media source lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SourceType {
    /// Fully downloaded to this device
    Local,
    /// Streamed from the server
    Remote,
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceType::Local => write!(f, "LOCAL"),
            SourceType::Remote => write!(f, "REMOTE"),
        }
    }
}

/// A playable file or stream backing an item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaSource {
    pub id: String,
    pub name: String,
    pub path: String,
    /// Size in bytes
    pub size: i64,
    pub source_type: SourceType,
}

impl MediaSource {
    pub fn local(id: impl Into<String>, path: impl Into<String>, size: i64) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            path: path.into(),
            size,
            source_type: SourceType::Local,
        }
    }

    pub fn remote(id: impl Into<String>, path: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            path: path.into(),
            size: 0,
            source_type: SourceType::Remote,
        }
    }

    pub fn is_local(&self) -> bool {
        self.source_type == SourceType::Local
    }
}

/// Chapter marker within an item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chapter {
    pub name: String,
    /// Offset from the start of the item, in ticks
    pub start_position_ticks: i64,
    pub image_path: Option<String>,
}

// =============================================================================
// User data
// =============================================================================

/// Per-item watch state exchanged with the server.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserData {
    pub played: bool,
    pub favorite: bool,
    pub playback_position_ticks: i64,
    pub unplayed_item_count: Option<i32>,
}

impl From<RemoteUserData> for UserData {
    fn from(remote: RemoteUserData) -> Self {
        Self {
            played: remote.played,
            favorite: remote.favorite,
            playback_position_ticks: remote.playback_position_ticks,
            unplayed_item_count: remote.unplayed_item_count,
        }
    }
}

impl From<&UserData> for RemoteUserData {
    fn from(data: &UserData) -> Self {
        Self {
            played: data.played,
            favorite: data.favorite,
            playback_position_ticks: data.playback_position_ticks,
            unplayed_item_count: data.unplayed_item_count,
        }
    }
}

// =============================================================================
// Cached items
// =============================================================================

/// Type-specific data of a cached item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ItemKind {
    Movie,
    Show {
        season_ids: Vec<Uuid>,
    },
    Episode {
        series_id: Uuid,
        series_name: String,
        season_id: Option<Uuid>,
        index_number: Option<i32>,
        parent_index_number: Option<i32>,
    },
}

impl ItemKind {
    /// Storage tag of the discriminant.
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemKind::Movie => "movie",
            ItemKind::Show { .. } => "show",
            ItemKind::Episode { .. } => "episode",
        }
    }
}

/// A catalog item held in the local cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedItem {
    pub id: Uuid,
    pub server_id: Option<String>,
    pub name: String,
    pub original_title: Option<String>,
    pub overview: String,
    /// Total runtime in ticks (100 ns units)
    pub run_time_ticks: i64,
    pub premiere_date: Option<DateTime<Utc>>,
    pub community_rating: Option<f32>,
    pub official_rating: Option<String>,
    /// Lifecycle status reported by the server ("Continuing", "Ended", ...)
    pub status: String,
    pub production_year: Option<i32>,
    pub end_date: Option<DateTime<Utc>>,
    pub chapters: Vec<Chapter>,
    pub genres: Vec<String>,
    pub played: bool,
    pub favorite: bool,
    pub can_play: bool,
    pub can_download: bool,
    /// Resume offset in ticks
    pub playback_position_ticks: i64,
    pub unplayed_item_count: Option<i32>,
    pub sources: Vec<MediaSource>,
    pub kind: ItemKind,
}

impl CachedItem {
    fn with_kind(id: Uuid, name: impl Into<String>, kind: ItemKind) -> Self {
        Self {
            id,
            server_id: None,
            name: name.into(),
            original_title: None,
            overview: String::new(),
            run_time_ticks: 0,
            premiere_date: None,
            community_rating: None,
            official_rating: None,
            status: String::new(),
            production_year: None,
            end_date: None,
            chapters: Vec::new(),
            genres: Vec::new(),
            played: false,
            favorite: false,
            can_play: true,
            can_download: true,
            playback_position_ticks: 0,
            unplayed_item_count: None,
            sources: Vec::new(),
            kind,
        }
    }

    pub fn movie(id: Uuid, name: impl Into<String>) -> Self {
        Self::with_kind(id, name, ItemKind::Movie)
    }

    pub fn show(id: Uuid, name: impl Into<String>) -> Self {
        Self::with_kind(
            id,
            name,
            ItemKind::Show {
                season_ids: Vec::new(),
            },
        )
    }

    pub fn episode(
        id: Uuid,
        name: impl Into<String>,
        series_id: Uuid,
        series_name: impl Into<String>,
    ) -> Self {
        Self::with_kind(
            id,
            name,
            ItemKind::Episode {
                series_id,
                series_name: series_name.into(),
                season_id: None,
                index_number: None,
                parent_index_number: None,
            },
        )
    }

    pub fn with_genres<I, S>(mut self, genres: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.genres = genres.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_source(mut self, source: MediaSource) -> Self {
        self.sources.push(source);
        self
    }

    pub fn with_run_time_ticks(mut self, ticks: i64) -> Self {
        self.run_time_ticks = ticks;
        self
    }

    /// An item is available offline iff at least one source is local.
    pub fn is_downloaded(&self) -> bool {
        self.sources.iter().any(MediaSource::is_local)
    }

    pub fn series_id(&self) -> Option<Uuid> {
        match &self.kind {
            ItemKind::Episode { series_id, .. } => Some(*series_id),
            _ => None,
        }
    }

    pub fn user_data(&self) -> UserData {
        UserData {
            played: self.played,
            favorite: self.favorite,
            playback_position_ticks: self.playback_position_ticks,
            unplayed_item_count: self.unplayed_item_count,
        }
    }

    pub fn apply_user_data(&mut self, data: &UserData) {
        self.played = data.played;
        self.favorite = data.favorite;
        self.playback_position_ticks = data.playback_position_ticks;
        self.unplayed_item_count = data.unplayed_item_count;
    }

    /// Validate the item before it is written.
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("Item name cannot be empty".to_string());
        }
        if self.run_time_ticks < 0 {
            return Err("Runtime cannot be negative".to_string());
        }
        if self.playback_position_ticks < 0 {
            return Err("Playback position cannot be negative".to_string());
        }
        if let Some(rating) = self.community_rating {
            if !rating.is_finite() {
                return Err("Community rating must be a finite number".to_string());
            }
        }
        Ok(())
    }
}
