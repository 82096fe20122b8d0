//! Core service façade and bootstrap helpers.
//!
//! This crate wires host-provided bridge implementations (HTTP, network,
//! background work, settings) and the media server connector into the
//! offline core. Desktop apps typically enable the `desktop-shims` feature,
//! which lets `CoreConfig` fall back to the `bridge-desktop` adapters.
//!
//! ```ignore
//! use core_runtime::config::CoreConfig;
//! use core_service::OfflineMediaCore;
//!
//! let config = CoreConfig::builder()
//!     .database_path("/data/offline.db")
//!     .server_url("https://media.example.com")
//!     .user_id(user_id)
//!     .access_token(token)
//!     .build()?;
//! let core = OfflineMediaCore::bootstrap(config).await?;
//! let (probe, snapshot) = core.start().await;
//! ```

pub mod error;

pub use error::{CoreError, Result};

use std::path::Path;
use std::sync::Arc;

use bridge_traits::background::EnqueueOutcome;
use bridge_traits::remote::MediaServer;
use core_downloads::{
    DownloadsConfig, DownloadsEngine, DownloadsEvents, DownloadsSnapshot, ProbeOutcome, UiState,
};
use core_library::db::{create_pool, DatabaseConfig};
use core_library::models::UserData;
use core_library::{CachedItemRepository, SqliteCachedItemRepository};
use core_runtime::config::CoreConfig;
use core_runtime::events::{EventBus, EventStream, DEFAULT_EVENT_BUFFER_SIZE};
use core_sync::{SyncScheduler, UserDataSyncWorker};
use provider_jellyfin::JellyfinConnector;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::info;
use uuid::Uuid;

const IN_MEMORY_PATH: &str = ":memory:";

/// Primary façade exposed to host applications.
#[derive(Clone)]
pub struct OfflineMediaCore {
    inner: Arc<Inner>,
}

struct Inner {
    repository: Arc<dyn CachedItemRepository>,
    downloads: DownloadsEngine,
    worker: Arc<UserDataSyncWorker>,
    scheduler: SyncScheduler,
    event_bus: EventBus,
}

impl OfflineMediaCore {
    /// Open the store and assemble the engine, worker and scheduler.
    pub async fn bootstrap(config: CoreConfig) -> Result<Self> {
        let database = if config.database_path == Path::new(IN_MEMORY_PATH) {
            DatabaseConfig::in_memory()
        } else {
            DatabaseConfig::new(&config.database_path)
        };
        let pool = create_pool(database).await?;
        let repository: Arc<dyn CachedItemRepository> =
            Arc::new(SqliteCachedItemRepository::new(pool));

        let server = media_server(&config)?;
        let core = Self::assemble(config, repository, server);
        info!("Offline media core ready");
        Ok(core)
    }

    /// Assemble the core around an already opened store.
    pub fn with_repository(
        config: CoreConfig,
        repository: Arc<dyn CachedItemRepository>,
    ) -> Result<Self> {
        let server = media_server(&config)?;
        Ok(Self::assemble(config, repository, server))
    }

    fn assemble(
        config: CoreConfig,
        repository: Arc<dyn CachedItemRepository>,
        server: Arc<dyn MediaServer>,
    ) -> Self {
        let event_bus = EventBus::new(DEFAULT_EVENT_BUFFER_SIZE);

        let mut downloads_config = DownloadsConfig::default()
            .with_offline_mode(config.offline_mode)
            .with_probe_grace_delay(config.probe_grace_delay)
            .with_event_bus(event_bus.clone());
        if let Some(settings) = config.settings_store.clone() {
            downloads_config = downloads_config.with_settings_store(settings);
        }
        let downloads = DownloadsEngine::new(repository.clone(), server.clone(), downloads_config);

        let worker = Arc::new(UserDataSyncWorker::new(
            repository.clone(),
            server,
            event_bus.clone(),
        ));
        let scheduler = SyncScheduler::new(config.background_executor.clone(), worker.clone())
            .with_requires_wifi(config.sync_requires_wifi);

        Self {
            inner: Arc::new(Inner {
                repository,
                downloads,
                worker,
                scheduler,
                event_bus,
            }),
        }
    }

    /// Probe the server in the background and load the downloads snapshot.
    pub async fn start(&self) -> (JoinHandle<ProbeOutcome>, Result<DownloadsSnapshot>) {
        let (probe, loaded) = self.inner.downloads.start().await;
        (probe, loaded.map_err(CoreError::from))
    }

    pub async fn load(&self) -> Result<DownloadsSnapshot> {
        Ok(self.inner.downloads.load().await?)
    }

    /// Toggle the genre filter. `None` when nothing has loaded yet.
    pub async fn select_genre(&self, genre: Option<String>) -> Option<DownloadsSnapshot> {
        self.inner.downloads.select_genre(genre).await
    }

    pub fn current_snapshot(&self) -> UiState {
        self.inner.downloads.current_snapshot()
    }

    pub fn subscribe(&self) -> watch::Receiver<UiState> {
        self.inner.downloads.subscribe()
    }

    /// The one-shot notice queue; only the first caller gets it.
    pub fn take_events(&self) -> Option<DownloadsEvents> {
        self.inner.downloads.take_events()
    }

    pub async fn probe(&self) -> ProbeOutcome {
        self.inner.downloads.probe().await
    }

    pub async fn schedule_sync(&self) -> Result<EnqueueOutcome> {
        Ok(self.inner.scheduler.schedule_sync().await?)
    }

    pub async fn cancel_sync(&self) -> Result<()> {
        Ok(self.inner.scheduler.cancel_sync().await?)
    }

    /// Store a local watch-state change and queue a sync to push it.
    pub async fn record_user_data(&self, item_id: Uuid, data: &UserData) -> Result<EnqueueOutcome> {
        self.inner.worker.record_local_change(item_id, data).await?;
        self.schedule_sync().await
    }

    /// Core-wide event stream (connectivity, sync and library events).
    pub fn events(&self) -> EventStream {
        EventStream::new(self.inner.event_bus.subscribe())
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.inner.event_bus
    }

    pub fn repository(&self) -> Arc<dyn CachedItemRepository> {
        Arc::clone(&self.inner.repository)
    }
}

fn media_server(config: &CoreConfig) -> Result<Arc<dyn MediaServer>> {
    if let Some(server) = &config.media_server {
        return Ok(Arc::clone(server));
    }

    let missing = |what: &str| CoreError::InitializationFailed(format!("{} is not configured", what));
    let http_client = config
        .http_client
        .clone()
        .ok_or_else(|| missing("HttpClient"))?;
    let url = config.server_url.as_deref().ok_or_else(|| missing("Server URL"))?;
    let user_id = config.user_id.ok_or_else(|| missing("User id"))?;
    let token = config
        .access_token
        .clone()
        .ok_or_else(|| missing("Access token"))?;

    let connector = JellyfinConnector::new(http_client, url, user_id, token)?;
    info!(base_url = connector.base_url(), "Using Jellyfin connector");
    Ok(Arc::new(connector))
}
