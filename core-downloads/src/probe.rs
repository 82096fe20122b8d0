//! Connectivity probe
//!
//! A one-shot reachability check against the media server. Failure is
//! reported as a transient notice only; cached content stays on screen.

use crate::state::{DownloadsEvent, StateMachine};
use bridge_traits::remote::{MediaServer, SystemInfo};
use bridge_traits::settings::{keys, SettingsStore};
use core_runtime::events::{ConnectivityEvent, CoreEvent, EventBus};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

/// Delay after a successful probe before returning.
pub const DEFAULT_GRACE_DELAY: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// Offline mode is active; the server was not contacted.
    Skipped,
    Reachable(SystemInfo),
    Unreachable,
}

pub struct ConnectivityProbe {
    server: Arc<dyn MediaServer>,
    state: Arc<StateMachine>,
    offline_mode: bool,
    settings: Option<Arc<dyn SettingsStore>>,
    grace_delay: Duration,
    event_bus: Option<EventBus>,
}

impl ConnectivityProbe {
    pub fn new(server: Arc<dyn MediaServer>, state: Arc<StateMachine>) -> Self {
        Self {
            server,
            state,
            offline_mode: false,
            settings: None,
            grace_delay: DEFAULT_GRACE_DELAY,
            event_bus: None,
        }
    }

    pub fn with_offline_mode(mut self, offline_mode: bool) -> Self {
        self.offline_mode = offline_mode;
        self
    }

    /// Consult the persisted `offline_mode` flag on every probe.
    pub fn with_settings_store(mut self, settings: Arc<dyn SettingsStore>) -> Self {
        self.settings = Some(settings);
        self
    }

    pub fn with_grace_delay(mut self, delay: Duration) -> Self {
        self.grace_delay = delay;
        self
    }

    pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    async fn offline_mode_active(&self) -> bool {
        if self.offline_mode {
            return true;
        }
        let Some(settings) = &self.settings else {
            return false;
        };

        match settings.get_bool(keys::OFFLINE_MODE).await {
            Ok(flag) => flag.unwrap_or(false),
            Err(e) => {
                warn!(error = %e, "Could not read offline mode flag, assuming online");
                false
            }
        }
    }

    fn emit(&self, event: ConnectivityEvent) {
        if let Some(bus) = &self.event_bus {
            bus.emit(CoreEvent::Connectivity(event)).ok();
        }
    }

    #[instrument(skip(self))]
    pub async fn probe(&self) -> ProbeOutcome {
        if self.offline_mode_active().await {
            debug!("Offline mode active, skipping server probe");
            self.emit(ConnectivityEvent::ProbeSkipped);
            return ProbeOutcome::Skipped;
        }

        match self.server.get_public_system_info().await {
            Ok(info) => {
                info!(server_name = ?info.server_name, "Media server reachable");
                self.emit(ConnectivityEvent::ServerReachable {
                    server_name: info.server_name.clone(),
                });
                tokio::time::sleep(self.grace_delay).await;
                ProbeOutcome::Reachable(info)
            }
            Err(e) => {
                warn!(error = %e, "Media server unreachable");
                let message = e.to_string();
                self.state
                    .notify(DownloadsEvent::ConnectionError(message.clone()));
                self.emit(ConnectivityEvent::ServerUnreachable { message });
                ProbeOutcome::Unreachable
            }
        }
    }
}
