//! Presentation state machine
//!
//! Holds the single current snapshot (a `watch` channel) and a separate
//! single-consumer queue of transient notices. A notice never replaces the
//! snapshot.

use crate::aggregation::CollectionSection;
use core_library::models::CachedItem;
use serde::Serialize;
use std::sync::Mutex;
use tokio::sync::{mpsc, watch};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DownloadsSnapshot {
    pub sections: Vec<CollectionSection>,
    /// Downloaded items as loaded, without synthesized shows
    pub items: Vec<CachedItem>,
    pub genres: Vec<String>,
    pub selected_genre: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", content = "data")]
pub enum UiState {
    Loading,
    Normal(DownloadsSnapshot),
    /// Loading failed; distinct from an empty `Normal`.
    Error(String),
}

impl UiState {
    pub fn as_normal(&self) -> Option<&DownloadsSnapshot> {
        match self {
            UiState::Normal(snapshot) => Some(snapshot),
            _ => None,
        }
    }
}

/// Transient notice delivered at most once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum DownloadsEvent {
    ConnectionError(String),
}

pub type DownloadsEvents = mpsc::UnboundedReceiver<DownloadsEvent>;

pub struct StateMachine {
    state: watch::Sender<UiState>,
    events: mpsc::UnboundedSender<DownloadsEvent>,
    events_rx: Mutex<Option<DownloadsEvents>>,
}

impl StateMachine {
    pub fn new() -> Self {
        let (state, _) = watch::channel(UiState::Loading);
        let (events, events_rx) = mpsc::unbounded_channel();
        Self {
            state,
            events,
            events_rx: Mutex::new(Some(events_rx)),
        }
    }

    /// Replace the current snapshot and wake subscribers.
    pub fn publish(&self, state: UiState) {
        debug!(state = state_name(&state), "Publishing snapshot");
        self.state.send_replace(state);
    }

    pub fn current(&self) -> UiState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<UiState> {
        self.state.subscribe()
    }

    /// Queue a transient notice. Dropped if the consumer has gone away.
    pub fn notify(&self, event: DownloadsEvent) {
        if self.events.send(event).is_err() {
            debug!("Event consumer dropped, discarding notice");
        }
    }

    /// Hand out the notice receiver. Only the first caller gets it.
    pub fn take_events(&self) -> Option<DownloadsEvents> {
        match self.events_rx.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        }
    }
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new()
    }
}

fn state_name(state: &UiState) -> &'static str {
    match state {
        UiState::Loading => "loading",
        UiState::Normal(_) => "normal",
        UiState::Error(_) => "error",
    }
}
