//! # User Data Sync Worker
//!
//! One run reconciles watch state between the local cache and the server:
//!
//! 1. **Push**: every item flagged `pending_sync` is sent to the server. On
//!    success the flag is cleared; on failure it stays set for the next run.
//! 2. **Pull**: every other cached item is refreshed from the server. Remote
//!    state is only written to items with no pending local change.
//!
//! Both writes are conditional, so a local change recorded while a run is in
//! flight is never overwritten and stays pending for the next run.
//!
//! Per-item remote failures are logged and counted. Only a store failure
//! fails the run. Outcomes go to `tracing` and the event bus; callers reload
//! snapshots themselves.

use crate::job::{SyncJob, SyncJobStats};
use crate::Result;
use bridge_traits::remote::{MediaServer, RemoteUserData};
use core_library::models::{CachedItem, UserData};
use core_library::CachedItemRepository;
use core_runtime::events::{CoreEvent, EventBus, LibraryEvent, SyncEvent};
use std::collections::HashSet;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

pub struct UserDataSyncWorker {
    repository: Arc<dyn CachedItemRepository>,
    server: Arc<dyn MediaServer>,
    event_bus: EventBus,
}

enum Phase {
    Finished,
    Cancelled,
}

impl UserDataSyncWorker {
    pub fn new(
        repository: Arc<dyn CachedItemRepository>,
        server: Arc<dyn MediaServer>,
        event_bus: EventBus,
    ) -> Self {
        Self {
            repository,
            server,
            event_bus,
        }
    }

    /// Run a full push-then-pull pass.
    pub async fn run(&self) -> Result<SyncJob> {
        self.run_with_cancellation(CancellationToken::new()).await
    }

    /// Run a pass that stops between items once `token` is cancelled.
    ///
    /// A cancelled run returns `Ok` with a `Cancelled` job; work already
    /// written stays written.
    #[instrument(skip(self, token))]
    pub async fn run_with_cancellation(&self, token: CancellationToken) -> Result<SyncJob> {
        let mut job = SyncJob::new().start()?;
        let job_id = job.id.to_string();
        let mut stats = SyncJobStats::default();

        let outcome = self.sync(&mut job, &mut stats, &token).await;

        match outcome {
            Ok(Phase::Finished) => {
                let job = job.complete(stats)?;
                let duration_ms = job.duration_ms().unwrap_or(0);
                info!(
                    job_id = %job_id,
                    pushed = stats.pushed,
                    pulled = stats.pulled,
                    failed = stats.failed,
                    duration_ms,
                    "User data sync completed"
                );
                self.emit(CoreEvent::Sync(SyncEvent::Completed {
                    job_id,
                    pushed: stats.pushed,
                    pulled: stats.pulled,
                    failed: stats.failed,
                    duration_ms,
                }));
                Ok(job)
            }
            Ok(Phase::Cancelled) => {
                let items_processed = job.progress.items_processed;
                let job = job.cancel()?;
                info!(job_id = %job_id, items_processed, "User data sync cancelled");
                self.emit(CoreEvent::Sync(SyncEvent::Cancelled {
                    job_id,
                    items_processed,
                }));
                Ok(job)
            }
            Err(e) => {
                let items_processed = job.progress.items_processed;
                error!(job_id = %job_id, error = %e, "User data sync failed");
                self.emit(CoreEvent::Sync(SyncEvent::Failed {
                    job_id,
                    message: e.to_string(),
                    items_processed,
                }));
                if let Err(transition) = job.fail(e.to_string()) {
                    warn!(error = %transition, "Could not mark sync job failed");
                }
                Err(e)
            }
        }
    }

    async fn sync(
        &self,
        job: &mut SyncJob,
        stats: &mut SyncJobStats,
        token: &CancellationToken,
    ) -> Result<Phase> {
        let pending = self.repository.list_pending_sync().await?;
        self.emit(CoreEvent::Sync(SyncEvent::Started {
            job_id: job.id.to_string(),
            pending_items: pending.len() as u64,
        }));

        let total_pending = pending.len() as u64;
        let mut still_pending = HashSet::new();
        for (index, item) in pending.iter().enumerate() {
            if token.is_cancelled() {
                return Ok(Phase::Cancelled);
            }
            if !self.push_item(item, stats).await? {
                still_pending.insert(item.id);
            }
            self.record_progress(job, index as u64 + 1, Some(total_pending), "push")?;
        }

        let candidates: Vec<CachedItem> = self
            .repository
            .list_all()
            .await?
            .into_iter()
            .filter(|item| !still_pending.contains(&item.id))
            .collect();
        let total_pull = candidates.len() as u64;

        for (index, item) in candidates.iter().enumerate() {
            if token.is_cancelled() {
                return Ok(Phase::Cancelled);
            }
            self.pull_item(item, stats).await?;
            self.record_progress(job, index as u64 + 1, Some(total_pull), "pull")?;
        }

        Ok(Phase::Finished)
    }

    /// Returns whether the server accepted the item.
    async fn push_item(&self, item: &CachedItem, stats: &mut SyncJobStats) -> Result<bool> {
        let data = item.user_data();
        match self
            .server
            .push_user_data(item.id, &RemoteUserData::from(&data))
            .await
        {
            Ok(()) => {
                if self.repository.mark_synced(item.id, &data).await? {
                    debug!(item_id = %item.id, "Pushed user data");
                } else {
                    debug!(item_id = %item.id, "User data changed during push, keeping it pending");
                }
                stats.pushed += 1;
                self.emit(CoreEvent::Library(LibraryEvent::UserDataPushed {
                    item_id: item.id.to_string(),
                }));
                Ok(true)
            }
            Err(e) => {
                stats.failed += 1;
                warn!(item_id = %item.id, error = %e, "Failed to push user data, keeping it pending");
                Ok(false)
            }
        }
    }

    async fn pull_item(&self, item: &CachedItem, stats: &mut SyncJobStats) -> Result<()> {
        let remote = match self.server.get_user_data(item.id).await {
            Ok(remote) => UserData::from(remote),
            Err(e) => {
                stats.failed += 1;
                warn!(item_id = %item.id, error = %e, "Failed to fetch user data");
                return Ok(());
            }
        };

        if remote == item.user_data() {
            return Ok(());
        }

        // Pending local changes win over the server; deleted items are skipped.
        if !self.repository.apply_remote_user_data(item.id, &remote).await? {
            debug!(item_id = %item.id, "Item changed locally or removed during sync, skipping");
            return Ok(());
        }

        stats.pulled += 1;
        debug!(item_id = %item.id, played = remote.played, "Pulled user data");
        self.emit(CoreEvent::Library(LibraryEvent::UserDataPulled {
            item_id: item.id.to_string(),
            played: remote.played,
            favorite: remote.favorite,
        }));
        Ok(())
    }

    fn record_progress(
        &self,
        job: &mut SyncJob,
        processed: u64,
        total: Option<u64>,
        phase: &str,
    ) -> Result<()> {
        job.update_progress(processed, total.unwrap_or(0), phase)?;
        self.emit(CoreEvent::Sync(SyncEvent::Progress {
            job_id: job.id.to_string(),
            items_processed: processed,
            total_items: total,
            phase: phase.to_string(),
        }));
        Ok(())
    }

    fn emit(&self, event: CoreEvent) {
        self.event_bus.emit(event).ok();
    }

    /// Mark an item's watch state as changed locally so the next run pushes it.
    #[instrument(skip(self, data))]
    pub async fn record_local_change(&self, item_id: Uuid, data: &UserData) -> Result<()> {
        self.repository.update_user_data(item_id, data, true).await?;
        Ok(())
    }
}
