//! Caller-facing downloads engine
//!
//! Loads downloaded items from the local store, aggregates them into
//! sections and publishes snapshots. `load` and `select_genre` are
//! serialized per engine by a request mutex held for the whole operation.

use crate::aggregation::{build_sections, genres_for};
use crate::error::Result;
use crate::probe::{ConnectivityProbe, ProbeOutcome, DEFAULT_GRACE_DELAY};
use crate::state::{DownloadsEvents, DownloadsSnapshot, StateMachine, UiState};
use bridge_traits::remote::MediaServer;
use bridge_traits::settings::SettingsStore;
use core_library::models::CachedItem;
use core_library::CachedItemRepository;
use core_runtime::events::EventBus;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument};

/// Engine options
#[derive(Clone)]
pub struct DownloadsConfig {
    pub offline_mode: bool,
    pub probe_grace_delay: Duration,
    pub settings_store: Option<Arc<dyn SettingsStore>>,
    pub event_bus: Option<EventBus>,
}

impl Default for DownloadsConfig {
    fn default() -> Self {
        Self {
            offline_mode: false,
            probe_grace_delay: DEFAULT_GRACE_DELAY,
            settings_store: None,
            event_bus: None,
        }
    }
}

impl DownloadsConfig {
    pub fn with_offline_mode(mut self, offline_mode: bool) -> Self {
        self.offline_mode = offline_mode;
        self
    }

    pub fn with_probe_grace_delay(mut self, delay: Duration) -> Self {
        self.probe_grace_delay = delay;
        self
    }

    pub fn with_settings_store(mut self, settings: Arc<dyn SettingsStore>) -> Self {
        self.settings_store = Some(settings);
        self
    }

    pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = Some(event_bus);
        self
    }
}

pub struct DownloadsEngine {
    repository: Arc<dyn CachedItemRepository>,
    state: Arc<StateMachine>,
    probe: Arc<ConnectivityProbe>,
    request_lock: Mutex<()>,
}

impl DownloadsEngine {
    pub fn new(
        repository: Arc<dyn CachedItemRepository>,
        server: Arc<dyn MediaServer>,
        config: DownloadsConfig,
    ) -> Self {
        let state = Arc::new(StateMachine::new());

        let mut probe = ConnectivityProbe::new(server, state.clone())
            .with_offline_mode(config.offline_mode)
            .with_grace_delay(config.probe_grace_delay);
        if let Some(settings) = config.settings_store {
            probe = probe.with_settings_store(settings);
        }
        if let Some(bus) = config.event_bus {
            probe = probe.with_event_bus(bus);
        }

        Self {
            repository,
            state,
            probe: Arc::new(probe),
            request_lock: Mutex::new(()),
        }
    }

    /// Fire the connectivity probe in the background, then load.
    ///
    /// The returned handle resolves to the probe outcome; dropping it does
    /// not cancel the probe.
    pub async fn start(&self) -> (JoinHandle<ProbeOutcome>, Result<DownloadsSnapshot>) {
        let probe = self.probe.clone();
        let handle = tokio::spawn(async move { probe.probe().await });
        (handle, self.load().await)
    }

    /// Run the probe inline.
    pub async fn probe(&self) -> ProbeOutcome {
        self.probe.probe().await
    }

    /// Reload downloaded items from the store and publish a fresh snapshot.
    ///
    /// Publishes `Loading` first, then exactly one of `Normal` or `Error`.
    /// A store failure is both published and returned.
    #[instrument(skip(self))]
    pub async fn load(&self) -> Result<DownloadsSnapshot> {
        let _guard = self.request_lock.lock().await;
        self.state.publish(UiState::Loading);

        let fetched = match self.repository.list_downloaded().await {
            Ok(items) => items,
            Err(e) => {
                error!(error = %e, "Failed to load downloaded items");
                self.state.publish(UiState::Error(e.to_string()));
                return Err(e.into());
            }
        };

        let fetched_count = fetched.len();
        let items: Vec<CachedItem> = fetched
            .into_iter()
            .filter(CachedItem::is_downloaded)
            .collect();

        let snapshot = DownloadsSnapshot {
            sections: build_sections(&items, None),
            genres: genres_for(&items),
            items,
            selected_genre: None,
        };

        info!(
            fetched = fetched_count,
            downloaded = snapshot.items.len(),
            sections = snapshot.sections.len(),
            genres = snapshot.genres.len(),
            "Loaded downloads"
        );
        self.state.publish(UiState::Normal(snapshot.clone()));
        Ok(snapshot)
    }

    /// Toggle the genre facet over the loaded items.
    ///
    /// Selecting the current genre clears it. Returns `None` without
    /// publishing when no `Normal` snapshot is current.
    #[instrument(skip(self))]
    pub async fn select_genre(&self, genre: Option<String>) -> Option<DownloadsSnapshot> {
        let _guard = self.request_lock.lock().await;

        let UiState::Normal(current) = self.state.current() else {
            debug!("No loaded snapshot, ignoring genre selection");
            return None;
        };

        let selected_genre = if genre == current.selected_genre {
            None
        } else {
            genre
        };

        let snapshot = DownloadsSnapshot {
            sections: build_sections(&current.items, selected_genre.as_deref()),
            items: current.items,
            genres: current.genres,
            selected_genre,
        };

        debug!(
            selected_genre = ?snapshot.selected_genre,
            sections = snapshot.sections.len(),
            "Applied genre filter"
        );
        self.state.publish(UiState::Normal(snapshot.clone()));
        Some(snapshot)
    }

    pub fn current_snapshot(&self) -> UiState {
        self.state.current()
    }

    pub fn subscribe(&self) -> watch::Receiver<UiState> {
        self.state.subscribe()
    }

    /// The transient notice receiver; only the first call returns it.
    pub fn take_events(&self) -> Option<DownloadsEvents> {
        self.state.take_events()
    }
}
