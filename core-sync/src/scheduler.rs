//! # Sync Scheduler
//!
//! Enqueues the user-data sync as unique background work. Only one
//! `syncUserData` run is ever pending or running: a request that arrives
//! while one is active is dropped (`ExistingWorkPolicy::Keep`).

use crate::worker::UserDataSyncWorker;
use crate::Result;
use bridge_traits::background::{
    BackgroundExecutor, EnqueueOutcome, ExistingWorkPolicy, TaskConstraints, TaskFuture,
    TaskHandler, TaskId, TaskStatus, WorkRequest,
};
use bridge_traits::error::BridgeError;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::{debug, info};

/// Unique work name of the user-data sync.
pub const SYNC_USER_DATA_TASK: &str = "syncUserData";

pub struct SyncScheduler {
    executor: Arc<dyn BackgroundExecutor>,
    worker: Arc<UserDataSyncWorker>,
    constraints: TaskConstraints,
    initial_delay: Duration,
    registered: OnceCell<()>,
}

impl SyncScheduler {
    /// A scheduler whose runs wait for any network connection.
    pub fn new(executor: Arc<dyn BackgroundExecutor>, worker: Arc<UserDataSyncWorker>) -> Self {
        Self {
            executor,
            worker,
            constraints: TaskConstraints {
                requires_network: true,
                requires_wifi: false,
            },
            initial_delay: Duration::ZERO,
            registered: OnceCell::new(),
        }
    }

    /// Only run on an unmetered WiFi or Ethernet connection.
    pub fn with_requires_wifi(mut self, requires_wifi: bool) -> Self {
        self.constraints.requires_wifi = requires_wifi;
        self
    }

    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    pub fn task_id() -> TaskId {
        TaskId::new(SYNC_USER_DATA_TASK)
    }

    async fn ensure_handler(&self) -> Result<()> {
        self.registered
            .get_or_try_init(|| async {
                let worker = Arc::clone(&self.worker);
                let handler: TaskHandler = Arc::new(move || -> TaskFuture {
                    let worker = Arc::clone(&worker);
                    Box::pin(async move {
                        worker.run().await.map(|_| ()).map_err(BridgeError::from)
                    })
                });
                self.executor
                    .register_handler(SYNC_USER_DATA_TASK, handler)
                    .await?;
                debug!(task = SYNC_USER_DATA_TASK, "Registered sync handler");
                Ok::<(), BridgeError>(())
            })
            .await?;
        Ok(())
    }

    /// Enqueue a sync unless one is already pending or running.
    pub async fn schedule_sync(&self) -> Result<EnqueueOutcome> {
        self.ensure_handler().await?;

        let request = WorkRequest::new(SYNC_USER_DATA_TASK)
            .with_constraints(self.constraints.clone())
            .with_initial_delay(self.initial_delay);
        let outcome = self
            .executor
            .enqueue_unique_work(request, ExistingWorkPolicy::Keep)
            .await?;

        match &outcome {
            EnqueueOutcome::Kept(id) => debug!(task_id = %id, "Sync already pending"),
            other => info!(task_id = %other.task_id(), "Sync scheduled"),
        }
        Ok(outcome)
    }

    pub async fn cancel_sync(&self) -> Result<()> {
        self.executor.cancel_task(&Self::task_id()).await?;
        Ok(())
    }

    pub async fn sync_status(&self) -> Result<TaskStatus> {
        Ok(self.executor.get_task_status(&Self::task_id()).await?)
    }
}
