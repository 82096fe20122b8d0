//! End-to-end scenarios for the downloads engine against an in-memory store.

use async_trait::async_trait;
use bridge_desktop::SqliteSettingsStore;
use bridge_traits::error::{BridgeError, Result as BridgeResult};
use bridge_traits::remote::{MediaServer, RemoteUserData, SystemInfo};
use bridge_traits::settings::{keys, SettingsStore};
use core_downloads::{
    DownloadsConfig, DownloadsEngine, DownloadsEvent, ProbeOutcome, SectionKind, UiState,
};
use core_library::db::create_test_pool;
use core_library::models::{CachedItem, MediaSource, UserData};
use core_library::{CachedItemRepository, LibraryError, SqliteCachedItemRepository};
use mockall::mock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use uuid::Uuid;

mock! {
    Server {}

    #[async_trait]
    impl MediaServer for Server {
        async fn get_public_system_info(&self) -> BridgeResult<SystemInfo>;
        async fn get_user_data(&self, item_id: Uuid) -> BridgeResult<RemoteUserData>;
        async fn push_user_data(&self, item_id: Uuid, data: &RemoteUserData) -> BridgeResult<()>;
    }
}

mock! {
    Repo {}

    #[async_trait]
    impl CachedItemRepository for Repo {
        async fn get(&self, id: Uuid) -> core_library::Result<Option<CachedItem>>;
        async fn upsert(&self, item: &CachedItem) -> core_library::Result<()>;
        async fn list_downloaded(&self) -> core_library::Result<Vec<CachedItem>>;
        async fn delete(&self, id: Uuid) -> core_library::Result<bool>;
        async fn list_all(&self) -> core_library::Result<Vec<CachedItem>>;
        async fn list_pending_sync(&self) -> core_library::Result<Vec<CachedItem>>;
        async fn update_user_data(&self, id: Uuid, data: &UserData, pending_sync: bool) -> core_library::Result<()>;
        async fn mark_synced(&self, id: Uuid, pushed: &UserData) -> core_library::Result<bool>;
        async fn apply_remote_user_data(&self, id: Uuid, data: &UserData) -> core_library::Result<bool>;
        async fn count(&self) -> core_library::Result<i64>;
    }
}

fn reachable_server() -> MockServer {
    let mut server = MockServer::new();
    server
        .expect_get_public_system_info()
        .returning(|| Ok(SystemInfo::default()));
    server
}

fn unreachable_server() -> MockServer {
    let mut server = MockServer::new();
    server
        .expect_get_public_system_info()
        .times(1)
        .returning(|| Err(BridgeError::Unreachable("connection refused".to_string())));
    server
}

fn config() -> DownloadsConfig {
    DownloadsConfig::default().with_probe_grace_delay(Duration::ZERO)
}

fn local(name: &str) -> MediaSource {
    MediaSource::local(name, format!("/media/{}.mkv", name), 1_000)
}

struct Fixture {
    series_id: Uuid,
    engine: DownloadsEngine,
}

/// Two local movies, one local episode of a series with no cached show and
/// one streamed-only movie.
async fn fixture(server: MockServer) -> Fixture {
    let repo = SqliteCachedItemRepository::new(create_test_pool().await.unwrap());
    let series_id = Uuid::new_v4();

    let items = [
        CachedItem::movie(Uuid::new_v4(), "Heat")
            .with_genres(["Action"])
            .with_source(local("heat")),
        CachedItem::movie(Uuid::new_v4(), "Amour")
            .with_genres(["Drama"])
            .with_source(local("amour")),
        CachedItem::episode(Uuid::new_v4(), "Pilot", series_id, "Lost")
            .with_genres(["Mystery"])
            .with_source(local("pilot")),
        CachedItem::movie(Uuid::new_v4(), "Streamed")
            .with_genres(["Western"])
            .with_source(MediaSource::remote("s", "http://server/s")),
    ];
    for item in &items {
        repo.upsert(item).await.unwrap();
    }

    Fixture {
        series_id,
        engine: DownloadsEngine::new(Arc::new(repo), Arc::new(server), config()),
    }
}

fn section_shape(state: &UiState) -> Vec<(SectionKind, usize)> {
    state
        .as_normal()
        .map(|snapshot| {
            snapshot
                .sections
                .iter()
                .map(|s| (s.kind, s.items.len()))
                .collect()
        })
        .unwrap_or_default()
}

#[tokio::test]
async fn load_builds_sections_with_virtual_show() {
    let Fixture { series_id, engine } = fixture(reachable_server()).await;

    let snapshot = engine.load().await.unwrap();

    assert_eq!(
        section_shape(&engine.current_snapshot()),
        vec![
            (SectionKind::Movies, 2),
            (SectionKind::Shows, 1),
            (SectionKind::Episodes, 1)
        ]
    );
    assert_eq!(snapshot.sections[1].items[0].id, series_id);
    assert_eq!(snapshot.genres, vec!["Action", "Drama"]);
    assert_eq!(snapshot.selected_genre, None);
    assert_eq!(snapshot.items.len(), 3);
}

#[tokio::test]
async fn genre_filter_narrows_movies_and_shows_only() {
    let Fixture { engine, .. } = fixture(reachable_server()).await;
    engine.load().await.unwrap();

    let filtered = engine
        .select_genre(Some("Action".to_string()))
        .await
        .unwrap();

    assert_eq!(filtered.selected_genre.as_deref(), Some("Action"));
    assert_eq!(
        section_shape(&engine.current_snapshot()),
        vec![(SectionKind::Movies, 1), (SectionKind::Episodes, 1)]
    );
    assert_eq!(filtered.genres, vec!["Action", "Drama"]);
}

#[tokio::test]
async fn selecting_same_genre_twice_restores_unfiltered() {
    let Fixture { engine, .. } = fixture(reachable_server()).await;
    let loaded = engine.load().await.unwrap();

    engine.select_genre(Some("Action".to_string())).await;
    let cleared = engine
        .select_genre(Some("Action".to_string()))
        .await
        .unwrap();

    assert_eq!(cleared, loaded);
    assert_eq!(engine.current_snapshot(), UiState::Normal(loaded));
}

#[tokio::test]
async fn unmatched_genre_omits_sections() {
    let Fixture { engine, .. } = fixture(reachable_server()).await;
    engine.load().await.unwrap();

    let filtered = engine
        .select_genre(Some("Western".to_string()))
        .await
        .unwrap();

    let kinds: Vec<_> = filtered.sections.iter().map(|s| s.kind).collect();
    assert_eq!(kinds, vec![SectionKind::Episodes]);
}

#[tokio::test]
async fn select_genre_before_load_is_noop() {
    let Fixture { engine, .. } = fixture(reachable_server()).await;

    assert!(engine.select_genre(Some("Action".to_string())).await.is_none());
    assert_eq!(engine.current_snapshot(), UiState::Loading);
}

#[tokio::test]
async fn store_failure_publishes_error() {
    let mut repo = MockRepo::new();
    repo.expect_list_downloaded().times(1).returning(|| {
        Err(LibraryError::InvalidData {
            column: "id".to_string(),
            message: "garbage".to_string(),
        })
    });
    let engine = DownloadsEngine::new(Arc::new(repo), Arc::new(reachable_server()), config());
    let mut states = engine.subscribe();

    assert!(engine.load().await.is_err());
    assert!(states.has_changed().unwrap());
    assert!(matches!(
        &*states.borrow_and_update(),
        UiState::Error(cause) if cause.contains("garbage")
    ));
    assert!(engine.select_genre(None).await.is_none());
}

#[tokio::test]
async fn probe_failure_leaves_snapshot_normal() {
    let Fixture { engine, .. } = fixture(unreachable_server()).await;
    let mut events = engine.take_events().unwrap();

    let (probe, loaded) = engine.start().await;
    loaded.unwrap();
    assert_eq!(probe.await.unwrap(), ProbeOutcome::Unreachable);

    assert!(matches!(
        events.recv().await,
        Some(DownloadsEvent::ConnectionError(_))
    ));
    assert!(events.try_recv().is_err());
    assert!(engine.current_snapshot().as_normal().is_some());
}

#[tokio::test]
async fn persisted_offline_mode_skips_probe() {
    let mut server = MockServer::new();
    server.expect_get_public_system_info().never();
    let settings = Arc::new(SqliteSettingsStore::in_memory().await.unwrap());
    settings.set_bool(keys::OFFLINE_MODE, true).await.unwrap();

    let repo = SqliteCachedItemRepository::new(create_test_pool().await.unwrap());
    let engine = DownloadsEngine::new(
        Arc::new(repo),
        Arc::new(server),
        config().with_settings_store(settings),
    );

    let (probe, loaded) = engine.start().await;
    assert_eq!(probe.await.unwrap(), ProbeOutcome::Skipped);

    // An empty store is a valid, empty snapshot rather than an error.
    let snapshot = loaded.unwrap();
    assert!(snapshot.sections.is_empty());
    assert!(snapshot.genres.is_empty());
}

#[tokio::test]
async fn real_show_takes_precedence_over_virtual() {
    let repo = SqliteCachedItemRepository::new(create_test_pool().await.unwrap());
    let series_id = Uuid::new_v4();
    let mut show = CachedItem::show(series_id, "Lost")
        .with_genres(["Drama"])
        .with_source(local("lost"));
    show.overview = Some("Survivors of a plane crash.".to_string());
    show.community_rating = Some(8.3);
    repo.upsert(&show).await.unwrap();
    repo.upsert(
        &CachedItem::episode(Uuid::new_v4(), "Pilot", series_id, "Lost").with_source(local("p")),
    )
    .await
    .unwrap();
    let engine = DownloadsEngine::new(Arc::new(repo), Arc::new(reachable_server()), config());

    let snapshot = engine.load().await.unwrap();
    let shows = &snapshot.sections[0];
    assert_eq!(shows.kind, SectionKind::Shows);
    assert_eq!(shows.items.len(), 1);
    let merged = &shows.items[0];
    assert_eq!(merged.genres, vec!["Drama"]);
    assert_eq!(merged.overview.as_deref(), Some("Survivors of a plane crash."));
    assert_eq!(merged.community_rating, Some(8.3));
    assert_ne!(merged.overview.as_deref(), Some("1 episode downloaded"));
    assert_eq!(snapshot.genres, vec!["Drama"]);
}

/// Store whose `list_downloaded` can be parked until released.
struct GatedRepo {
    inner: SqliteCachedItemRepository,
    hold: AtomicBool,
    entered: Notify,
    release: Notify,
}

#[async_trait]
impl CachedItemRepository for GatedRepo {
    async fn get(&self, id: Uuid) -> core_library::Result<Option<CachedItem>> {
        self.inner.get(id).await
    }

    async fn upsert(&self, item: &CachedItem) -> core_library::Result<()> {
        self.inner.upsert(item).await
    }

    async fn list_downloaded(&self) -> core_library::Result<Vec<CachedItem>> {
        if self.hold.load(Ordering::SeqCst) {
            self.entered.notify_one();
            self.release.notified().await;
        }
        self.inner.list_downloaded().await
    }

    async fn delete(&self, id: Uuid) -> core_library::Result<bool> {
        self.inner.delete(id).await
    }

    async fn list_all(&self) -> core_library::Result<Vec<CachedItem>> {
        self.inner.list_all().await
    }

    async fn list_pending_sync(&self) -> core_library::Result<Vec<CachedItem>> {
        self.inner.list_pending_sync().await
    }

    async fn update_user_data(
        &self,
        id: Uuid,
        data: &UserData,
        pending_sync: bool,
    ) -> core_library::Result<()> {
        self.inner.update_user_data(id, data, pending_sync).await
    }

    async fn mark_synced(&self, id: Uuid, pushed: &UserData) -> core_library::Result<bool> {
        self.inner.mark_synced(id, pushed).await
    }

    async fn apply_remote_user_data(
        &self,
        id: Uuid,
        data: &UserData,
    ) -> core_library::Result<bool> {
        self.inner.apply_remote_user_data(id, data).await
    }

    async fn count(&self) -> core_library::Result<i64> {
        self.inner.count().await
    }
}

#[tokio::test]
async fn reload_publishes_loading_before_normal() {
    let inner = SqliteCachedItemRepository::new(create_test_pool().await.unwrap());
    inner
        .upsert(&CachedItem::movie(Uuid::new_v4(), "Heat").with_source(local("heat")))
        .await
        .unwrap();
    let repo = Arc::new(GatedRepo {
        inner,
        hold: AtomicBool::new(false),
        entered: Notify::new(),
        release: Notify::new(),
    });
    let engine = Arc::new(DownloadsEngine::new(
        repo.clone(),
        Arc::new(reachable_server()),
        config(),
    ));

    let first = engine.load().await.unwrap();
    assert_eq!(engine.current_snapshot(), UiState::Normal(first.clone()));

    let mut states = engine.subscribe();
    states.borrow_and_update();
    repo.hold.store(true, Ordering::SeqCst);
    let reload = {
        let engine = Arc::clone(&engine);
        tokio::spawn(async move { engine.load().await })
    };

    repo.entered.notified().await;
    assert_eq!(engine.current_snapshot(), UiState::Loading);
    states.changed().await.unwrap();
    assert_eq!(*states.borrow_and_update(), UiState::Loading);

    repo.release.notify_one();
    let second = reload.await.unwrap().unwrap();
    states.changed().await.unwrap();
    assert_eq!(*states.borrow_and_update(), UiState::Normal(second.clone()));
    assert_eq!(second, first);
}
