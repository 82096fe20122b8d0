//! Cached item repository trait and implementation

use crate::converters::{
    chapters_to_db, encode_blob, item_from_row, kind_to_db, source_type_to_db, timestamp_to_db,
    uuid_to_db, CachedItemRow, MediaSourceRow,
};
use crate::error::{LibraryError, Result};
use crate::models::{CachedItem, MediaSource, UserData};
use async_trait::async_trait;
use sqlx::SqlitePool;
use std::collections::HashMap;
use tracing::{debug, instrument};
use uuid::Uuid;

/// Cached item repository interface
#[async_trait]
pub trait CachedItemRepository: Send + Sync {
    /// Find an item by its identifier
    ///
    /// # Returns
    /// - `Ok(Some(item))` if found
    /// - `Ok(None)` if not found
    /// - `Err` if database error occurs
    async fn get(&self, id: Uuid) -> Result<Option<CachedItem>>;

    /// Insert or replace an item together with its media sources.
    ///
    /// The item row and its sources are written in one transaction. The
    /// item's `pending_sync` flag is left untouched on replace.
    async fn upsert(&self, item: &CachedItem) -> Result<()>;

    /// Items with at least one local source, ordered by name
    /// (case-insensitive) then id.
    async fn list_downloaded(&self) -> Result<Vec<CachedItem>>;

    /// Delete an item and its sources.
    ///
    /// # Returns
    /// - `Ok(true)` if the item was deleted
    /// - `Ok(false)` if the item was not found
    async fn delete(&self, id: Uuid) -> Result<bool>;

    /// Every cached item, in the same order as `list_downloaded`.
    async fn list_all(&self) -> Result<Vec<CachedItem>>;

    /// Items whose user data changed locally and has not been pushed.
    async fn list_pending_sync(&self) -> Result<Vec<CachedItem>>;

    /// Overwrite an item's user data and set its `pending_sync` flag.
    ///
    /// # Errors
    /// `LibraryError::NotFound` if the item does not exist.
    async fn update_user_data(&self, id: Uuid, data: &UserData, pending_sync: bool)
        -> Result<()>;

    /// Clear `pending_sync` only if the stored user data still equals `pushed`.
    ///
    /// Returns `false` when the row changed after `pushed` was read (or is
    /// gone); the flag then stays set so the newer change is pushed later.
    async fn mark_synced(&self, id: Uuid, pushed: &UserData) -> Result<bool>;

    /// Write server-side user data unless a local change is pending.
    ///
    /// Returns `false` when the item is pending or no longer exists.
    async fn apply_remote_user_data(&self, id: Uuid, data: &UserData) -> Result<bool>;

    async fn count(&self) -> Result<i64>;
}

const LOCAL_SOURCE_FILTER: &str = "EXISTS (SELECT 1 FROM media_sources s \
     WHERE s.item_id = cached_items.id AND s.source_type = 'local')";

/// SQLite implementation of CachedItemRepository
pub struct SqliteCachedItemRepository {
    pool: SqlitePool,
}

impl SqliteCachedItemRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Load matching rows and their sources from one read snapshot.
    async fn fetch_items(&self, filter: Option<&str>) -> Result<Vec<CachedItem>> {
        let where_clause = filter
            .map(|filter| format!(" WHERE {}", filter))
            .unwrap_or_default();
        let items_sql = format!(
            "SELECT * FROM cached_items{} ORDER BY name COLLATE NOCASE, id",
            where_clause
        );
        let sources_sql = format!(
            "SELECT * FROM media_sources WHERE item_id IN \
             (SELECT id FROM cached_items{}) ORDER BY item_id, rowid",
            where_clause
        );

        let mut tx = self.pool.begin().await?;
        let rows = sqlx::query_as::<_, CachedItemRow>(&items_sql)
            .fetch_all(&mut *tx)
            .await?;
        let source_rows = sqlx::query_as::<_, MediaSourceRow>(&sources_sql)
            .fetch_all(&mut *tx)
            .await?;
        tx.commit().await?;

        let mut sources = group_sources(source_rows)?;
        rows.into_iter()
            .map(|row| {
                let item_sources = sources.remove(&row.id).unwrap_or_default();
                item_from_row(row, item_sources)
            })
            .collect()
    }
}

fn group_sources(rows: Vec<MediaSourceRow>) -> Result<HashMap<String, Vec<MediaSource>>> {
    let mut grouped: HashMap<String, Vec<MediaSource>> = HashMap::new();
    for row in rows {
        let item_id = row.item_id.clone();
        grouped
            .entry(item_id)
            .or_default()
            .push(MediaSource::try_from(row)?);
    }
    Ok(grouped)
}

#[async_trait]
impl CachedItemRepository for SqliteCachedItemRepository {
    #[instrument(skip(self))]
    async fn get(&self, id: Uuid) -> Result<Option<CachedItem>> {
        let id = uuid_to_db(id);

        let mut tx = self.pool.begin().await?;
        let row = sqlx::query_as::<_, CachedItemRow>("SELECT * FROM cached_items WHERE id = ?")
            .bind(&id)
            .fetch_optional(&mut *tx)
            .await?;
        let Some(row) = row else {
            return Ok(None);
        };
        let source_rows = sqlx::query_as::<_, MediaSourceRow>(
            "SELECT * FROM media_sources WHERE item_id = ? ORDER BY rowid",
        )
        .bind(&id)
        .fetch_all(&mut *tx)
        .await?;
        tx.commit().await?;

        let sources = source_rows
            .into_iter()
            .map(MediaSource::try_from)
            .collect::<Result<Vec<_>>>()?;
        item_from_row(row, sources).map(Some)
    }

    #[instrument(skip(self, item), fields(item_id = %item.id))]
    async fn upsert(&self, item: &CachedItem) -> Result<()> {
        item.validate().map_err(|message| LibraryError::InvalidInput {
            field: "item".to_string(),
            message,
        })?;

        let id = uuid_to_db(item.id);
        let kind = kind_to_db(&item.kind)?;
        let chapters = chapters_to_db(&item.chapters)?;
        let genres = encode_blob("genres", &item.genres)?;

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO cached_items (
                id, kind, server_id, name, original_title, overview, run_time_ticks,
                premiere_date, community_rating, official_rating, status, production_year,
                end_date, chapters, genres, season_ids, series_id, series_name, season_id,
                index_number, parent_index_number, played, favorite, can_play, can_download,
                playback_position_ticks, unplayed_item_count, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                kind = excluded.kind,
                server_id = excluded.server_id,
                name = excluded.name,
                original_title = excluded.original_title,
                overview = excluded.overview,
                run_time_ticks = excluded.run_time_ticks,
                premiere_date = excluded.premiere_date,
                community_rating = excluded.community_rating,
                official_rating = excluded.official_rating,
                status = excluded.status,
                production_year = excluded.production_year,
                end_date = excluded.end_date,
                chapters = excluded.chapters,
                genres = excluded.genres,
                season_ids = excluded.season_ids,
                series_id = excluded.series_id,
                series_name = excluded.series_name,
                season_id = excluded.season_id,
                index_number = excluded.index_number,
                parent_index_number = excluded.parent_index_number,
                played = excluded.played,
                favorite = excluded.favorite,
                can_play = excluded.can_play,
                can_download = excluded.can_download,
                playback_position_ticks = excluded.playback_position_ticks,
                unplayed_item_count = excluded.unplayed_item_count,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&id)
        .bind(item.kind.as_str())
        .bind(&item.server_id)
        .bind(&item.name)
        .bind(&item.original_title)
        .bind(&item.overview)
        .bind(item.run_time_ticks)
        .bind(timestamp_to_db(item.premiere_date))
        .bind(item.community_rating.map(f64::from))
        .bind(&item.official_rating)
        .bind(&item.status)
        .bind(item.production_year)
        .bind(timestamp_to_db(item.end_date))
        .bind(chapters)
        .bind(genres)
        .bind(kind.season_ids)
        .bind(kind.series_id)
        .bind(kind.series_name)
        .bind(kind.season_id)
        .bind(kind.index_number)
        .bind(kind.parent_index_number)
        .bind(item.played)
        .bind(item.favorite)
        .bind(item.can_play)
        .bind(item.can_download)
        .bind(item.playback_position_ticks)
        .bind(item.unplayed_item_count)
        .bind(chrono::Utc::now().timestamp())
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM media_sources WHERE item_id = ?")
            .bind(&id)
            .execute(&mut *tx)
            .await?;

        for source in &item.sources {
            sqlx::query(
                r#"
                INSERT INTO media_sources (item_id, id, name, path, size, source_type)
                VALUES (?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&id)
            .bind(&source.id)
            .bind(&source.name)
            .bind(&source.path)
            .bind(source.size)
            .bind(source_type_to_db(source.source_type))
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        debug!(sources = item.sources.len(), "Upserted cached item");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn list_downloaded(&self) -> Result<Vec<CachedItem>> {
        let items = self.fetch_items(Some(LOCAL_SOURCE_FILTER)).await?;
        debug!(count = items.len(), "Listed downloaded items");
        Ok(items)
    }

    #[instrument(skip(self))]
    async fn delete(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM cached_items WHERE id = ?")
            .bind(uuid_to_db(id))
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self))]
    async fn list_all(&self) -> Result<Vec<CachedItem>> {
        self.fetch_items(None).await
    }

    #[instrument(skip(self))]
    async fn list_pending_sync(&self) -> Result<Vec<CachedItem>> {
        self.fetch_items(Some("pending_sync = 1")).await
    }

    #[instrument(skip(self, data))]
    async fn update_user_data(
        &self,
        id: Uuid,
        data: &UserData,
        pending_sync: bool,
    ) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE cached_items SET
                played = ?, favorite = ?, playback_position_ticks = ?,
                unplayed_item_count = ?, pending_sync = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(data.played)
        .bind(data.favorite)
        .bind(data.playback_position_ticks)
        .bind(data.unplayed_item_count)
        .bind(pending_sync)
        .bind(chrono::Utc::now().timestamp())
        .bind(uuid_to_db(id))
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(LibraryError::NotFound {
                entity_type: "CachedItem".to_string(),
                id: id.to_string(),
            });
        }
        Ok(())
    }

    #[instrument(skip(self, pushed))]
    async fn mark_synced(&self, id: Uuid, pushed: &UserData) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE cached_items SET pending_sync = 0
            WHERE id = ? AND pending_sync = 1
                AND played = ? AND favorite = ? AND playback_position_ticks = ?
                AND unplayed_item_count IS ?
            "#,
        )
        .bind(uuid_to_db(id))
        .bind(pushed.played)
        .bind(pushed.favorite)
        .bind(pushed.playback_position_ticks)
        .bind(pushed.unplayed_item_count)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, data))]
    async fn apply_remote_user_data(&self, id: Uuid, data: &UserData) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE cached_items SET
                played = ?, favorite = ?, playback_position_ticks = ?,
                unplayed_item_count = ?, updated_at = ?
            WHERE id = ? AND pending_sync = 0
            "#,
        )
        .bind(data.played)
        .bind(data.favorite)
        .bind(data.playback_position_ticks)
        .bind(data.unplayed_item_count)
        .bind(chrono::Utc::now().timestamp())
        .bind(uuid_to_db(id))
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self))]
    async fn count(&self) -> Result<i64> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM cached_items")
            .fetch_one(&self.pool)
            .await?;
        Ok(count.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::create_test_pool;
    use crate::models::{Chapter, ItemKind};
    use chrono::{DateTime, Utc};
    use std::sync::Arc;

    async fn repository() -> SqliteCachedItemRepository {
        SqliteCachedItemRepository::new(create_test_pool().await.unwrap())
    }

    fn local(id: &str) -> MediaSource {
        MediaSource::local(id, format!("/media/{}.mkv", id), 4096)
    }

    #[tokio::test]
    async fn test_upsert_and_get() {
        let repo = repository().await;
        let series = Uuid::new_v4();
        let mut item = CachedItem::episode(Uuid::new_v4(), "Pilot", series, "Lost")
            .with_genres(["Drama", "Mystery"])
            .with_source(local("pilot"))
            .with_source(MediaSource::remote("stream", "http://server/stream"));
        item.community_rating = Some(8.5);
        item.premiere_date = DateTime::from_timestamp(1_095_811_200, 0);
        item.chapters = vec![Chapter {
            name: "Crash".to_string(),
            start_position_ticks: 1_200_000_000,
            image_path: None,
        }];

        repo.upsert(&item).await.unwrap();

        let stored = repo.get(item.id).await.unwrap().unwrap();
        assert_eq!(stored, item);
    }

    #[tokio::test]
    async fn test_get_missing_returns_none() {
        let repo = repository().await;
        assert!(repo.get(Uuid::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_upsert_replaces_sources() {
        let repo = repository().await;
        let item = CachedItem::movie(Uuid::new_v4(), "Heat").with_source(local("a"));
        repo.upsert(&item).await.unwrap();

        let mut updated = item.clone();
        updated.name = "Heat (1995)".to_string();
        updated.sources = vec![MediaSource::remote("b", "http://server/b")];
        repo.upsert(&updated).await.unwrap();

        let stored = repo.get(item.id).await.unwrap().unwrap();
        assert_eq!(stored.name, "Heat (1995)");
        assert_eq!(stored.sources, updated.sources);
        assert_eq!(repo.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_upsert_rejects_invalid_item() {
        let repo = repository().await;
        let item = CachedItem::movie(Uuid::new_v4(), "");
        assert!(matches!(
            repo.upsert(&item).await,
            Err(LibraryError::InvalidInput { .. })
        ));
    }

    #[tokio::test]
    async fn test_list_downloaded_filters_and_orders() {
        let repo = repository().await;
        let zulu = CachedItem::movie(Uuid::new_v4(), "zulu").with_source(local("z"));
        let alpha = CachedItem::movie(Uuid::new_v4(), "Alpha").with_source(local("a"));
        let streamed = CachedItem::movie(Uuid::new_v4(), "Beta")
            .with_source(MediaSource::remote("b", "http://server/b"));

        for item in [&zulu, &alpha, &streamed] {
            repo.upsert(item).await.unwrap();
        }

        let names: Vec<String> = repo
            .list_downloaded()
            .await
            .unwrap()
            .into_iter()
            .map(|item| item.name)
            .collect();
        assert_eq!(names, vec!["Alpha", "zulu"]);
        assert_eq!(repo.list_all().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_delete_cascades_sources() {
        let repo = repository().await;
        let item = CachedItem::movie(Uuid::new_v4(), "Heat").with_source(local("a"));
        repo.upsert(&item).await.unwrap();

        assert!(repo.delete(item.id).await.unwrap());
        assert!(!repo.delete(item.id).await.unwrap());

        let orphans: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM media_sources")
            .fetch_one(&repo.pool)
            .await
            .unwrap();
        assert_eq!(orphans.0, 0);
    }

    #[tokio::test]
    async fn test_update_user_data_and_pending_sync() {
        let repo = repository().await;
        let item = CachedItem::movie(Uuid::new_v4(), "Heat").with_source(local("a"));
        repo.upsert(&item).await.unwrap();
        assert!(repo.list_pending_sync().await.unwrap().is_empty());

        let watched = UserData {
            played: true,
            favorite: true,
            playback_position_ticks: 0,
            unplayed_item_count: None,
        };
        repo.update_user_data(item.id, &watched, true).await.unwrap();

        let pending = repo.list_pending_sync().await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].user_data(), watched);

        // A later catalog refresh keeps the flag.
        let mut refreshed = pending[0].clone();
        refreshed.overview = "Refreshed".to_string();
        repo.upsert(&refreshed).await.unwrap();
        assert_eq!(repo.list_pending_sync().await.unwrap().len(), 1);

        repo.update_user_data(item.id, &watched, false).await.unwrap();
        assert!(repo.list_pending_sync().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_user_data_missing_item() {
        let repo = repository().await;
        let result = repo
            .update_user_data(Uuid::new_v4(), &UserData::default(), true)
            .await;
        assert!(matches!(result, Err(LibraryError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_malformed_chapters_decode_empty() {
        let repo = repository().await;
        let item = CachedItem::movie(Uuid::new_v4(), "Heat").with_source(local("a"));
        repo.upsert(&item).await.unwrap();

        sqlx::query("UPDATE cached_items SET chapters = '[{broken' WHERE id = ?")
            .bind(uuid_to_db(item.id))
            .execute(&repo.pool)
            .await
            .unwrap();

        let stored = repo.get(item.id).await.unwrap().unwrap();
        assert!(stored.chapters.is_empty());
    }

    #[tokio::test]
    async fn test_malformed_identifier_is_store_fault() {
        let repo = repository().await;
        sqlx::query(
            "INSERT INTO cached_items (id, kind, name, updated_at) VALUES ('garbage', 'movie', 'X', 0)",
        )
        .execute(&repo.pool)
        .await
        .unwrap();

        assert!(matches!(
            repo.list_all().await,
            Err(LibraryError::InvalidData { .. })
        ));
    }

    #[tokio::test]
    async fn test_show_season_ids_round_trip() {
        let repo = repository().await;
        let seasons = vec![Uuid::new_v4(), Uuid::new_v4()];
        let mut show = CachedItem::show(Uuid::new_v4(), "Lost");
        show.kind = ItemKind::Show {
            season_ids: seasons.clone(),
        };
        show.end_date = Some(Utc::now());
        repo.upsert(&show).await.unwrap();

        let stored = repo.get(show.id).await.unwrap().unwrap();
        assert_eq!(stored.kind, ItemKind::Show { season_ids: seasons });
        assert_eq!(
            stored.end_date.map(|d| d.timestamp()),
            show.end_date.map(|d| d.timestamp())
        );
    }

    fn favorite_at(position: i64) -> UserData {
        UserData {
            played: false,
            favorite: true,
            playback_position_ticks: position,
            unplayed_item_count: None,
        }
    }

    #[tokio::test]
    async fn test_mark_synced_only_when_unchanged() {
        let repo = repository().await;
        let item = CachedItem::movie(Uuid::new_v4(), "Heat").with_source(local("h"));
        repo.upsert(&item).await.unwrap();
        repo.update_user_data(item.id, &favorite_at(10), true)
            .await
            .unwrap();

        // A newer local change lands after position 10 was read for pushing.
        repo.update_user_data(item.id, &favorite_at(999), true)
            .await
            .unwrap();
        assert!(!repo.mark_synced(item.id, &favorite_at(10)).await.unwrap());
        assert_eq!(repo.list_pending_sync().await.unwrap().len(), 1);

        assert!(repo.mark_synced(item.id, &favorite_at(999)).await.unwrap());
        assert!(repo.list_pending_sync().await.unwrap().is_empty());
        let stored = repo.get(item.id).await.unwrap().unwrap();
        assert_eq!(stored.playback_position_ticks, 999);
    }

    #[tokio::test]
    async fn test_apply_remote_skips_pending_items() {
        let repo = repository().await;
        let pending = CachedItem::movie(Uuid::new_v4(), "Heat").with_source(local("h"));
        let clean = CachedItem::movie(Uuid::new_v4(), "Amour").with_source(local("a"));
        repo.upsert(&pending).await.unwrap();
        repo.upsert(&clean).await.unwrap();
        repo.update_user_data(pending.id, &favorite_at(42), true)
            .await
            .unwrap();

        let remote = UserData {
            played: true,
            ..UserData::default()
        };
        assert!(!repo.apply_remote_user_data(pending.id, &remote).await.unwrap());
        assert!(repo.apply_remote_user_data(clean.id, &remote).await.unwrap());
        assert!(!repo
            .apply_remote_user_data(Uuid::new_v4(), &remote)
            .await
            .unwrap());

        let kept = repo.get(pending.id).await.unwrap().unwrap();
        assert_eq!(kept.user_data(), favorite_at(42));
        assert!(repo.get(clean.id).await.unwrap().unwrap().played);
    }

    #[tokio::test]
    async fn test_large_cache_lists_every_source() {
        let repo = repository().await;
        for index in 0..1_200 {
            let item = CachedItem::movie(Uuid::new_v4(), format!("Movie {:04}", index))
                .with_source(local(&format!("m{}", index)));
            repo.upsert(&item).await.unwrap();
        }

        let items = repo.list_downloaded().await.unwrap();
        assert_eq!(items.len(), 1_200);
        assert!(items.iter().all(|item| item.sources.len() == 1));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_reads_never_mix_row_and_sources_across_writes() {
        let path = std::env::temp_dir().join(format!("items-{}.db", Uuid::new_v4()));
        let pool = crate::db::create_pool(crate::db::DatabaseConfig::new(&path))
            .await
            .unwrap();
        let repo = Arc::new(SqliteCachedItemRepository::new(pool));

        let id = Uuid::new_v4();
        let version_a = CachedItem::movie(id, "A").with_source(local("a"));
        let version_b =
            CachedItem::movie(id, "B").with_source(MediaSource::remote("b", "http://server/b"));
        repo.upsert(&version_a).await.unwrap();

        let writer = {
            let repo = Arc::clone(&repo);
            tokio::spawn(async move {
                for round in 0..200 {
                    let next = if round % 2 == 0 { &version_b } else { &version_a };
                    repo.upsert(next).await.unwrap();
                }
            })
        };

        for _ in 0..200 {
            for item in repo.list_all().await.unwrap() {
                let expected = if item.name == "A" { "a" } else { "b" };
                assert_eq!(item.sources.len(), 1);
                assert_eq!(item.sources[0].id, expected);
            }
            let item = repo.get(id).await.unwrap().unwrap();
            let expected = if item.name == "A" { "a" } else { "b" };
            assert_eq!(item.sources[0].id, expected);
        }

        writer.await.unwrap();
        let _ = std::fs::remove_file(&path);
    }
}
