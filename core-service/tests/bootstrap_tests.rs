//! Bootstrap and end-to-end wiring of the offline core.

use async_trait::async_trait;
use bridge_desktop::TokioBackgroundExecutor;
use bridge_traits::background::EnqueueOutcome;
use bridge_traits::error::Result as BridgeResult;
use bridge_traits::remote::{MediaServer, RemoteUserData, SystemInfo};
use core_downloads::{ProbeOutcome, SectionKind};
use core_library::models::{CachedItem, MediaSource, UserData};
use core_runtime::config::CoreConfig;
use core_runtime::events::{ConnectivityEvent, CoreEvent, SyncEvent};
use core_service::OfflineMediaCore;
use mockall::mock;
use std::sync::Arc;
use std::time::Duration;
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

fn config(server: MockServer, offline: bool) -> CoreConfig {
    CoreConfig::builder()
        .database_path(":memory:")
        .media_server(Arc::new(server))
        .background_executor(Arc::new(TokioBackgroundExecutor::new()))
        .probe_grace_delay(Duration::ZERO)
        .offline_mode(offline)
        .build()
        .unwrap()
}

#[tokio::test]
async fn bootstrap_loads_an_empty_store() {
    let mut server = MockServer::new();
    server.expect_get_public_system_info().never();
    let core = OfflineMediaCore::bootstrap(config(server, true)).await.unwrap();
    let mut events = core.events();

    let (probe, loaded) = core.start().await;
    assert_eq!(probe.await.unwrap(), ProbeOutcome::Skipped);
    assert!(loaded.unwrap().sections.is_empty());
    assert!(matches!(
        events.recv().await.unwrap(),
        CoreEvent::Connectivity(ConnectivityEvent::ProbeSkipped)
    ));
}

#[tokio::test]
async fn local_change_is_pushed_by_scheduled_sync() {
    let mut server = MockServer::new();
    server
        .expect_push_user_data()
        .times(1)
        .returning(|_, _| Ok(()));
    server.expect_get_user_data().returning(|_| {
        Ok(RemoteUserData {
            favorite: true,
            ..RemoteUserData::default()
        })
    });
    let core = OfflineMediaCore::bootstrap(config(server, true)).await.unwrap();
    let mut events = core.events().filter(|event| {
        matches!(
            event,
            CoreEvent::Sync(SyncEvent::Completed { .. } | SyncEvent::Failed { .. })
        )
    });

    let item = CachedItem::movie(Uuid::new_v4(), "Heat")
        .with_genres(["Action"])
        .with_source(MediaSource::local("heat", "/media/heat.mkv", 10));
    core.repository().upsert(&item).await.unwrap();

    let outcome = core
        .record_user_data(
            item.id,
            &UserData {
                favorite: true,
                ..UserData::default()
            },
        )
        .await
        .unwrap();
    assert!(matches!(outcome, EnqueueOutcome::Enqueued(_)));

    let finished = tokio::time::timeout(Duration::from_secs(5), events.recv())
        .await
        .unwrap()
        .unwrap();
    assert!(matches!(
        finished,
        CoreEvent::Sync(SyncEvent::Completed {
            pushed: 1,
            failed: 0,
            ..
        })
    ));
    assert!(core.repository().list_pending_sync().await.unwrap().is_empty());

    let snapshot = core.load().await.unwrap();
    assert_eq!(snapshot.sections[0].kind, SectionKind::Movies);
    assert!(snapshot.sections[0].items[0].favorite);
}

#[tokio::test]
async fn genre_selection_goes_through_the_facade() {
    let mut server = MockServer::new();
    server.expect_get_public_system_info().never();
    let core = OfflineMediaCore::bootstrap(config(server, true)).await.unwrap();
    assert!(core.select_genre(Some("Drama".to_string())).await.is_none());

    let repo = core.repository();
    repo.upsert(
        &CachedItem::movie(Uuid::new_v4(), "Amour")
            .with_genres(["Drama"])
            .with_source(MediaSource::local("amour", "/media/amour.mkv", 1)),
    )
    .await
    .unwrap();
    core.load().await.unwrap();

    let filtered = core.select_genre(Some("Drama".to_string())).await.unwrap();
    assert_eq!(filtered.selected_genre.as_deref(), Some("Drama"));
    assert!(core.take_events().is_some());
    assert!(core.take_events().is_none());
}

#[tokio::test]
async fn connector_is_built_from_server_url() {
    let config = CoreConfig::builder()
        .database_path(":memory:")
        .server_url("https://media.example.com/")
        .user_id(Uuid::new_v4())
        .access_token("token")
        .background_executor(Arc::new(TokioBackgroundExecutor::new()))
        .offline_mode(true)
        .build()
        .unwrap();

    let core = OfflineMediaCore::bootstrap(config).await.unwrap();
    assert_eq!(core.probe().await, ProbeOutcome::Skipped);
}
