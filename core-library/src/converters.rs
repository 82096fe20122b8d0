//! Encoding between domain values and their column representation
//!
//! Identifiers and enumerations are strict: a value that cannot be decoded is
//! a store fault. Serialized blobs (chapters, genres, season references) are
//! lenient: a malformed blob decodes to its empty default with a warning.

use crate::error::{LibraryError, Result};
use crate::models::{CachedItem, Chapter, ItemKind, MediaSource, SourceType};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use sqlx::FromRow;
use tracing::warn;
use uuid::Uuid;

fn invalid(column: &str, message: impl Into<String>) -> LibraryError {
    LibraryError::InvalidData {
        column: column.to_string(),
        message: message.into(),
    }
}

// =============================================================================
// Scalars
// =============================================================================

/// Canonical lowercase hyphenated form.
pub fn uuid_to_db(id: Uuid) -> String {
    id.as_hyphenated().to_string()
}

pub fn uuid_from_db(column: &str, value: &str) -> Result<Uuid> {
    Uuid::parse_str(value).map_err(|e| invalid(column, format!("{}: {}", value, e)))
}

fn optional_uuid_from_db(column: &str, value: Option<&str>) -> Result<Option<Uuid>> {
    value.map(|v| uuid_from_db(column, v)).transpose()
}

/// Epoch seconds, UTC.
pub fn timestamp_to_db(value: Option<DateTime<Utc>>) -> Option<i64> {
    value.map(|ts| ts.timestamp())
}

/// Out-of-range values decode to `None`.
pub fn timestamp_from_db(value: Option<i64>) -> Option<DateTime<Utc>> {
    value.and_then(|secs| DateTime::from_timestamp(secs, 0))
}

pub fn source_type_to_db(source_type: SourceType) -> &'static str {
    match source_type {
        SourceType::Local => "local",
        SourceType::Remote => "remote",
    }
}

pub fn source_type_from_db(value: &str) -> Result<SourceType> {
    match value {
        "local" => Ok(SourceType::Local),
        "remote" => Ok(SourceType::Remote),
        other => Err(invalid("source_type", format!("unknown source type {}", other))),
    }
}

// =============================================================================
// Blobs
// =============================================================================

pub fn encode_blob<T: Serialize + ?Sized>(column: &str, value: &T) -> Result<String> {
    serde_json::to_string(value).map_err(|e| LibraryError::InvalidInput {
        field: column.to_string(),
        message: e.to_string(),
    })
}

pub fn decode_blob<T: DeserializeOwned + Default>(column: &str, value: Option<&str>) -> T {
    let Some(raw) = value.filter(|raw| !raw.is_empty()) else {
        return T::default();
    };

    match serde_json::from_str(raw) {
        Ok(decoded) => decoded,
        Err(e) => {
            warn!(column = column, error = %e, "Malformed stored blob, using empty value");
            T::default()
        }
    }
}

pub fn chapters_to_db(chapters: &[Chapter]) -> Result<String> {
    encode_blob("chapters", chapters)
}

pub fn chapters_from_db(value: Option<&str>) -> Vec<Chapter> {
    decode_blob("chapters", value)
}

// =============================================================================
// Rows
// =============================================================================

/// One row of `cached_items`.
#[derive(Debug, Clone, FromRow)]
pub struct CachedItemRow {
    pub id: String,
    pub kind: String,
    pub server_id: Option<String>,
    pub name: String,
    pub original_title: Option<String>,
    pub overview: String,
    pub run_time_ticks: i64,
    pub premiere_date: Option<i64>,
    pub community_rating: Option<f64>,
    pub official_rating: Option<String>,
    pub status: String,
    pub production_year: Option<i32>,
    pub end_date: Option<i64>,
    pub chapters: Option<String>,
    pub genres: Option<String>,
    pub season_ids: Option<String>,
    pub series_id: Option<String>,
    pub series_name: Option<String>,
    pub season_id: Option<String>,
    pub index_number: Option<i32>,
    pub parent_index_number: Option<i32>,
    pub played: bool,
    pub favorite: bool,
    pub can_play: bool,
    pub can_download: bool,
    pub playback_position_ticks: i64,
    pub unplayed_item_count: Option<i32>,
}

/// One row of `media_sources`.
#[derive(Debug, Clone, FromRow)]
pub struct MediaSourceRow {
    pub id: String,
    pub item_id: String,
    pub name: String,
    pub path: String,
    pub size: i64,
    pub source_type: String,
}

impl TryFrom<MediaSourceRow> for MediaSource {
    type Error = LibraryError;

    fn try_from(row: MediaSourceRow) -> Result<Self> {
        Ok(Self {
            source_type: source_type_from_db(&row.source_type)?,
            id: row.id,
            name: row.name,
            path: row.path,
            size: row.size,
        })
    }
}

/// Kind-specific columns of an item, flattened for binding.
#[derive(Debug, Default)]
pub struct KindColumns {
    pub season_ids: Option<String>,
    pub series_id: Option<String>,
    pub series_name: Option<String>,
    pub season_id: Option<String>,
    pub index_number: Option<i32>,
    pub parent_index_number: Option<i32>,
}

pub fn kind_to_db(kind: &ItemKind) -> Result<KindColumns> {
    Ok(match kind {
        ItemKind::Movie => KindColumns::default(),
        ItemKind::Show { season_ids } => {
            let ids: Vec<String> = season_ids.iter().copied().map(uuid_to_db).collect();
            KindColumns {
                season_ids: Some(encode_blob("season_ids", &ids)?),
                ..KindColumns::default()
            }
        }
        ItemKind::Episode {
            series_id,
            series_name,
            season_id,
            index_number,
            parent_index_number,
        } => KindColumns {
            series_id: Some(uuid_to_db(*series_id)),
            series_name: Some(series_name.clone()),
            season_id: season_id.map(uuid_to_db),
            index_number: *index_number,
            parent_index_number: *parent_index_number,
            ..KindColumns::default()
        },
    })
}

fn kind_from_row(row: &CachedItemRow) -> Result<ItemKind> {
    match row.kind.as_str() {
        "movie" => Ok(ItemKind::Movie),
        "show" => {
            let raw: Vec<String> = decode_blob("season_ids", row.season_ids.as_deref());
            let mut season_ids = Vec::with_capacity(raw.len());
            for id in raw {
                match Uuid::parse_str(&id) {
                    Ok(id) => season_ids.push(id),
                    Err(e) => warn!(season_id = %id, error = %e, "Skipping malformed season id"),
                }
            }
            Ok(ItemKind::Show { season_ids })
        }
        "episode" => {
            let series_id = row
                .series_id
                .as_deref()
                .ok_or_else(|| invalid("series_id", "episode without series"))?;
            Ok(ItemKind::Episode {
                series_id: uuid_from_db("series_id", series_id)?,
                series_name: row.series_name.clone().unwrap_or_default(),
                season_id: optional_uuid_from_db("season_id", row.season_id.as_deref())?,
                index_number: row.index_number,
                parent_index_number: row.parent_index_number,
            })
        }
        other => Err(invalid("kind", format!("unknown item kind {}", other))),
    }
}

/// Assemble an item from its row and already-decoded sources.
pub fn item_from_row(row: CachedItemRow, sources: Vec<MediaSource>) -> Result<CachedItem> {
    let kind = kind_from_row(&row)?;

    Ok(CachedItem {
        id: uuid_from_db("id", &row.id)?,
        server_id: row.server_id,
        name: row.name,
        original_title: row.original_title,
        overview: row.overview,
        run_time_ticks: row.run_time_ticks,
        premiere_date: timestamp_from_db(row.premiere_date),
        community_rating: row.community_rating.map(|r| r as f32),
        official_rating: row.official_rating,
        status: row.status,
        production_year: row.production_year,
        end_date: timestamp_from_db(row.end_date),
        chapters: chapters_from_db(row.chapters.as_deref()),
        genres: decode_blob("genres", row.genres.as_deref()),
        played: row.played,
        favorite: row.favorite,
        can_play: row.can_play,
        can_download: row.can_download,
        playback_position_ticks: row.playback_position_ticks,
        unplayed_item_count: row.unplayed_item_count,
        sources,
        kind,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uuid_is_canonical_lowercase() {
        let id = Uuid::parse_str("A1B2C3D4-E5F6-4788-99AA-BBCCDDEEFF00").unwrap();
        assert_eq!(uuid_to_db(id), "a1b2c3d4-e5f6-4788-99aa-bbccddeeff00");
    }

    #[test]
    fn test_malformed_uuid_is_store_fault() {
        let err = uuid_from_db("id", "not-a-uuid").unwrap_err();
        assert!(matches!(err, LibraryError::InvalidData { ref column, .. } if column == "id"));
    }

    #[test]
    fn test_timestamp_out_of_range_is_none() {
        assert_eq!(timestamp_from_db(Some(i64::MAX)), None);
        assert_eq!(timestamp_from_db(None), None);

        let ts = DateTime::from_timestamp(1_700_000_000, 0);
        assert_eq!(timestamp_from_db(timestamp_to_db(ts)), ts);
    }

    #[test]
    fn test_malformed_chapter_blob_is_empty() {
        assert!(chapters_from_db(Some("{not json")).is_empty());
        assert!(chapters_from_db(Some("")).is_empty());
        assert!(chapters_from_db(None).is_empty());
    }

    #[test]
    fn test_chapter_blob() {
        let chapters = vec![
            Chapter {
                name: "Opening".to_string(),
                start_position_ticks: 0,
                image_path: None,
            },
            Chapter {
                name: "Heist".to_string(),
                start_position_ticks: 36_000_000_000,
                image_path: Some("/chapters/2.jpg".to_string()),
            },
        ];
        let blob = chapters_to_db(&chapters).unwrap();
        assert_eq!(chapters_from_db(Some(&blob)), chapters);
    }

    #[test]
    fn test_unknown_source_type_is_store_fault() {
        assert_eq!(source_type_from_db("local").unwrap(), SourceType::Local);
        assert!(source_type_from_db("LOCAL").is_err());
    }

    #[test]
    fn test_episode_row_without_series_is_rejected() {
        let row = CachedItemRow {
            id: uuid_to_db(Uuid::new_v4()),
            kind: "episode".to_string(),
            server_id: None,
            name: "Pilot".to_string(),
            original_title: None,
            overview: String::new(),
            run_time_ticks: 0,
            premiere_date: None,
            community_rating: None,
            official_rating: None,
            status: String::new(),
            production_year: None,
            end_date: None,
            chapters: None,
            genres: Some("[\"Drama\"]".to_string()),
            season_ids: None,
            series_id: None,
            series_name: None,
            season_id: None,
            index_number: Some(1),
            parent_index_number: Some(1),
            played: false,
            favorite: false,
            can_play: true,
            can_download: true,
            playback_position_ticks: 0,
            unplayed_item_count: None,
        };

        assert!(item_from_row(row, Vec::new()).is_err());
    }
}
