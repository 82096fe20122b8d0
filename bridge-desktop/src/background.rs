//! Background Task Execution Implementation

use async_trait::async_trait;
use bridge_traits::{
    background::{
        BackgroundExecutor, EnqueueOutcome, ExistingWorkPolicy, TaskConstraints, TaskHandler,
        TaskId, TaskStatus, WorkRequest,
    },
    error::{BridgeError, Result},
    network::{NetworkInfo, NetworkMonitor, NetworkStatus, NetworkType},
    time::{Clock, SystemClock},
};
use futures_util::FutureExt;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, RwLock};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

/// Default interval between constraint checks while work waits for network.
pub const DEFAULT_CONSTRAINT_POLL_INTERVAL: Duration = Duration::from_secs(5);

type TaskMap = Arc<RwLock<HashMap<TaskId, TaskInfo>>>;

/// Tokio-based background executor for desktop.
///
/// Keeps a registry of uniquely named one-time work. Each enqueue spawns a
/// tokio task that sleeps the initial delay, waits for its constraints and
/// then runs the handler registered under the work name.
pub struct TokioBackgroundExecutor {
    tasks: TaskMap,
    handlers: Arc<RwLock<HashMap<String, TaskHandler>>>,
    network_monitor: Option<Arc<dyn NetworkMonitor>>,
    clock: Arc<dyn Clock>,
    poll_interval: Duration,
    generations: AtomicU64,
}

struct TaskInfo {
    status: TaskStatus,
    /// Distinguishes a replaced run from its successor under the same name.
    generation: u64,
    handle: Option<JoinHandle<()>>,
    cancel: Option<oneshot::Sender<()>>,
    enqueued_at: i64,
    finished_at: Option<i64>,
}

impl TaskInfo {
    fn stop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            let _ = cancel.send(());
        }
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

/// Everything a spawned run needs, detached from the executor.
struct RunContext {
    tasks: TaskMap,
    id: TaskId,
    generation: u64,
    handler: TaskHandler,
    request: WorkRequest,
    monitor: Option<Arc<dyn NetworkMonitor>>,
    clock: Arc<dyn Clock>,
    poll_interval: Duration,
}

impl TokioBackgroundExecutor {
    /// Create a new background executor with no network monitoring.
    pub fn new() -> Self {
        Self::with_network_monitor(None)
    }

    /// Create a background executor with an optional network monitor.
    pub fn with_network_monitor(monitor: Option<Arc<dyn NetworkMonitor>>) -> Self {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        Self::with_network_monitor_and_clock(monitor, clock)
    }

    /// Create a background executor with an optional network monitor and custom clock.
    pub fn with_network_monitor_and_clock(
        monitor: Option<Arc<dyn NetworkMonitor>>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            tasks: Arc::new(RwLock::new(HashMap::new())),
            handlers: Arc::new(RwLock::new(HashMap::new())),
            network_monitor: monitor,
            clock,
            poll_interval: DEFAULT_CONSTRAINT_POLL_INTERVAL,
            generations: AtomicU64::new(0),
        }
    }

    /// Override how often unmet constraints are re-checked.
    pub fn with_constraint_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Register a closure as the handler for `task_name`.
    pub async fn register_task_handler<F, Fut>(&self, task_name: &str, handler: F) -> Result<()>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<()>> + Send + 'static,
    {
        let handler: TaskHandler = Arc::new(move || handler().boxed());
        self.register_handler(task_name, handler).await
    }

    /// Milliseconds since the epoch at which the task last finished, if it has.
    pub async fn finished_at(&self, task_id: &TaskId) -> Option<i64> {
        let tasks = self.tasks.read().await;
        tasks.get(task_id).and_then(|info| info.finished_at)
    }

    /// Milliseconds since the epoch at which the current run was enqueued.
    pub async fn enqueued_at(&self, task_id: &TaskId) -> Option<i64> {
        let tasks = self.tasks.read().await;
        tasks.get(task_id).map(|info| info.enqueued_at)
    }

    async fn handler_for(&self, task_name: &str) -> Option<TaskHandler> {
        let handlers = self.handlers.read().await;
        handlers.get(task_name).cloned()
    }

    async fn constraints_satisfied(
        monitor: Option<&Arc<dyn NetworkMonitor>>,
        constraints: &TaskConstraints,
    ) -> bool {
        if !(constraints.requires_network || constraints.requires_wifi) {
            return true;
        }

        let Some(monitor) = monitor else {
            warn!(
                "Network constraints requested but no monitor provided; assuming constraint satisfied"
            );
            return true;
        };

        match monitor.get_network_info().await {
            Ok(NetworkInfo {
                status: NetworkStatus::Connected,
                network_type,
                is_metered,
            }) => {
                if constraints.requires_wifi {
                    matches!(
                        network_type,
                        Some(NetworkType::WiFi) | Some(NetworkType::Ethernet)
                    ) && !is_metered
                } else {
                    true
                }
            }
            Ok(_) => false,
            Err(err) => {
                warn!("Network monitor error: {}", err);
                false
            }
        }
    }

    /// Apply `update` only if the slot still belongs to this run.
    async fn update_own<F>(ctx: &RunContext, update: F)
    where
        F: FnOnce(&mut TaskInfo),
    {
        let mut tasks = ctx.tasks.write().await;
        if let Some(info) = tasks.get_mut(&ctx.id) {
            if info.generation == ctx.generation {
                update(info);
            }
        }
    }

    async fn mark_cancelled(ctx: &RunContext) {
        let now = ctx.clock.unix_timestamp_millis();
        Self::update_own(ctx, |info| {
            info.status = TaskStatus::Cancelled;
            info.finished_at = Some(now);
            info.cancel = None;
        })
        .await;
    }

    async fn run_unique_work(ctx: RunContext, mut cancel_rx: oneshot::Receiver<()>) {
        let delay_sleep = sleep(ctx.request.initial_delay);
        tokio::pin!(delay_sleep);
        tokio::select! {
            _ = &mut cancel_rx => {
                Self::mark_cancelled(&ctx).await;
                return;
            }
            _ = delay_sleep.as_mut() => {}
        }

        loop {
            if Self::constraints_satisfied(ctx.monitor.as_ref(), &ctx.request.constraints).await {
                break;
            }

            debug!(task_id = %ctx.id, "Constraints not satisfied; waiting");
            let retry_sleep = sleep(ctx.poll_interval);
            tokio::pin!(retry_sleep);
            tokio::select! {
                _ = &mut cancel_rx => {
                    Self::mark_cancelled(&ctx).await;
                    return;
                }
                _ = retry_sleep.as_mut() => {}
            }
        }

        Self::update_own(&ctx, |info| info.status = TaskStatus::Running).await;

        // A panicking handler must still release its slot.
        let result = AssertUnwindSafe((ctx.handler)()).catch_unwind().await;

        let now = ctx.clock.unix_timestamp_millis();
        let status = match result {
            Ok(Ok(())) => {
                debug!(task_id = %ctx.id, "Unique work completed");
                TaskStatus::Completed
            }
            Ok(Err(err)) => {
                warn!(task_id = %ctx.id, error = %err, "Unique work failed");
                TaskStatus::Failed
            }
            Err(_) => {
                error!(task_id = %ctx.id, "Unique work panicked");
                TaskStatus::Failed
            }
        };
        Self::update_own(&ctx, |info| {
            info.status = status;
            info.finished_at = Some(now);
            info.cancel = None;
        })
        .await;
    }
}

impl Default for TokioBackgroundExecutor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BackgroundExecutor for TokioBackgroundExecutor {
    async fn register_handler(&self, task_name: &str, handler: TaskHandler) -> Result<()> {
        let mut handlers = self.handlers.write().await;
        handlers.insert(task_name.to_string(), handler);
        Ok(())
    }

    async fn enqueue_unique_work(
        &self,
        request: WorkRequest,
        policy: ExistingWorkPolicy,
    ) -> Result<EnqueueOutcome> {
        let handler = self.handler_for(&request.name).await.ok_or_else(|| {
            BridgeError::OperationFailed(format!(
                "No handler registered for task: {}",
                request.name
            ))
        })?;
        let id = TaskId::new(request.name.clone());

        // Check and insert under one guard so concurrent enqueues cannot both
        // observe an empty slot.
        let mut tasks = self.tasks.write().await;

        let replaced = match tasks.get_mut(&id) {
            Some(existing) if existing.status.is_active() => match policy {
                ExistingWorkPolicy::Keep => {
                    debug!(task_id = %id, "Unique work already pending; keeping existing");
                    return Ok(EnqueueOutcome::Kept(id));
                }
                ExistingWorkPolicy::Replace => {
                    debug!(task_id = %id, "Replacing pending unique work");
                    existing.stop();
                    true
                }
            },
            _ => false,
        };

        let generation = self.generations.fetch_add(1, Ordering::SeqCst) + 1;
        let (cancel_tx, cancel_rx) = oneshot::channel();

        info!(
            task_id = %id,
            delay_ms = request.initial_delay.as_millis() as u64,
            requires_network = request.constraints.requires_network,
            requires_wifi = request.constraints.requires_wifi,
            "Enqueueing unique work"
        );

        let ctx = RunContext {
            tasks: Arc::clone(&self.tasks),
            id: id.clone(),
            generation,
            handler,
            request,
            monitor: self.network_monitor.clone(),
            clock: Arc::clone(&self.clock),
            poll_interval: self.poll_interval,
        };

        // The spawned run needs the write lock to update its status, so it
        // cannot observe the slot before the insert below.
        let handle = tokio::spawn(Self::run_unique_work(ctx, cancel_rx));

        tasks.insert(
            id.clone(),
            TaskInfo {
                status: TaskStatus::Scheduled,
                generation,
                handle: Some(handle),
                cancel: Some(cancel_tx),
                enqueued_at: self.clock.unix_timestamp_millis(),
                finished_at: None,
            },
        );

        if replaced {
            Ok(EnqueueOutcome::Replaced(id))
        } else {
            Ok(EnqueueOutcome::Enqueued(id))
        }
    }

    async fn cancel_task(&self, task_id: &TaskId) -> Result<()> {
        debug!(task_id = %task_id, "Cancelling task");

        let mut tasks = self.tasks.write().await;
        match tasks.get_mut(task_id) {
            Some(info) => {
                if info.status.is_active() {
                    info.stop();
                    info.status = TaskStatus::Cancelled;
                    info.finished_at = Some(self.clock.unix_timestamp_millis());
                }
                Ok(())
            }
            None => Err(BridgeError::OperationFailed(format!(
                "Task not found: {}",
                task_id
            ))),
        }
    }

    async fn get_task_status(&self, task_id: &TaskId) -> Result<TaskStatus> {
        let tasks = self.tasks.read().await;
        tasks
            .get(task_id)
            .map(|info| info.status.clone())
            .ok_or_else(|| BridgeError::OperationFailed(format!("Task not found: {}", task_id)))
    }

    async fn list_tasks(&self) -> Result<Vec<TaskId>> {
        let tasks = self.tasks.read().await;
        Ok(tasks.keys().cloned().collect())
    }

    async fn is_available(&self) -> bool {
        true
    }
}
