//! Background Execution and Task Scheduling
//!
//! Provides platform-aware, uniquely named background work.

use async_trait::async_trait;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use crate::error::Result;

/// Future returned by a registered task handler.
pub type TaskFuture = Pin<Box<dyn Future<Output = Result<()>> + Send + 'static>>;

/// Callback invoked each time a named task executes.
pub type TaskHandler = Arc<dyn Fn() -> TaskFuture + Send + Sync>;

/// Task execution constraints
#[derive(Debug, Clone)]
pub struct TaskConstraints {
    /// Require WiFi connection
    pub requires_wifi: bool,
    /// Require any network connection
    pub requires_network: bool,
}

impl Default for TaskConstraints {
    fn default() -> Self {
        Self {
            requires_wifi: false,
            requires_network: true,
        }
    }
}

impl TaskConstraints {
    /// Constraints that never block execution.
    pub fn none() -> Self {
        Self {
            requires_wifi: false,
            requires_network: false,
        }
    }
}

/// What to do when work with the same unique name already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExistingWorkPolicy {
    /// Keep the pending or running task and drop the new request.
    Keep,
    /// Cancel the existing task and enqueue the new request.
    Replace,
}

/// Scheduled task identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TaskId(pub String);

impl TaskId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Task execution status
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskStatus {
    /// Task is enqueued and waiting for its delay or constraints
    Scheduled,
    /// Task is currently executing
    Running,
    /// Task completed successfully
    Completed,
    /// Task failed
    Failed,
    /// Task was cancelled
    Cancelled,
}

impl TaskStatus {
    /// Pending or running work blocks a `Keep` enqueue.
    pub fn is_active(&self) -> bool {
        matches!(self, TaskStatus::Scheduled | TaskStatus::Running)
    }
}

/// One-time work request
#[derive(Debug, Clone)]
pub struct WorkRequest {
    /// Unique name; also the handler key
    pub name: String,
    /// Delay before the first constraint check
    pub initial_delay: Duration,
    /// Execution constraints
    pub constraints: TaskConstraints,
}

impl WorkRequest {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            initial_delay: Duration::ZERO,
            constraints: TaskConstraints::default(),
        }
    }

    pub fn with_constraints(mut self, constraints: TaskConstraints) -> Self {
        self.constraints = constraints;
        self
    }

    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }
}

/// Result of a unique enqueue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnqueueOutcome {
    /// No active task existed; the request was scheduled.
    Enqueued(TaskId),
    /// An active task existed and was kept; the request was dropped.
    Kept(TaskId),
    /// An active task existed and was cancelled in favour of the request.
    Replaced(TaskId),
}

impl EnqueueOutcome {
    pub fn task_id(&self) -> &TaskId {
        match self {
            EnqueueOutcome::Enqueued(id)
            | EnqueueOutcome::Kept(id)
            | EnqueueOutcome::Replaced(id) => id,
        }
    }

    /// Whether this call started new work.
    pub fn is_new_work(&self) -> bool {
        !matches!(self, EnqueueOutcome::Kept(_))
    }
}

/// Background task executor trait
///
/// Abstracts platform-specific background work scheduling:
/// - **Android**: WorkManager unique work
/// - **iOS**: BGTaskScheduler
/// - **Desktop**: Tokio tasks with an in-process registry
///
/// Work is identified by a unique name. Enqueueing a name that is already
/// scheduled or running follows the supplied [`ExistingWorkPolicy`]; the
/// existence check and the insertion must be atomic with respect to other
/// enqueues.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::background::{BackgroundExecutor, ExistingWorkPolicy, WorkRequest};
///
/// async fn schedule_sync(executor: &dyn BackgroundExecutor) -> Result<()> {
///     let request = WorkRequest::new("syncUserData");
///     executor.enqueue_unique_work(request, ExistingWorkPolicy::Keep).await?;
///     Ok(())
/// }
/// ```
#[async_trait]
pub trait BackgroundExecutor: Send + Sync {
    /// Register the handler that runs when work named `task_name` executes.
    ///
    /// Registering again replaces the previous handler for future runs.
    async fn register_handler(&self, task_name: &str, handler: TaskHandler) -> Result<()>;

    /// Enqueue one-time unique work.
    ///
    /// # Errors
    ///
    /// Returns an error if no handler is registered for the request name.
    async fn enqueue_unique_work(
        &self,
        request: WorkRequest,
        policy: ExistingWorkPolicy,
    ) -> Result<EnqueueOutcome>;

    /// Cancel a scheduled or running task
    async fn cancel_task(&self, task_id: &TaskId) -> Result<()>;

    /// Get status of a task
    async fn get_task_status(&self, task_id: &TaskId) -> Result<TaskStatus>;

    /// List all known tasks
    async fn list_tasks(&self) -> Result<Vec<TaskId>>;

    /// Check if background execution is available
    async fn is_available(&self) -> bool {
        true
    }
}
