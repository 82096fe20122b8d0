//! # Sync Job State Machine
//!
//! Lifecycle of one user-data sync run with validated state transitions.
//!
//! ## State Machine
//!
//! ```text
//! Pending → Running → Completed
//!     ↓         ↓
//!     └──────→ Failed
//!     └──────→ Cancelled
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use core_sync::{SyncJob, SyncJobStats};
//!
//! let mut job = SyncJob::new().start()?;
//! job.update_progress(3, 10, "push")?;
//! let job = job.complete(SyncJobStats { pushed: 3, pulled: 7, failed: 0 })?;
//! ```

use crate::{Result, SyncError};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

// ============================================================================
// ID Types
// ============================================================================

/// Unique identifier for a sync job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SyncJobId(Uuid);

impl SyncJobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SyncJobId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SyncJobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Status Types
// ============================================================================

/// The current status of a sync job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl SyncStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SyncStatus::Completed | SyncStatus::Failed | SyncStatus::Cancelled
        )
    }

    pub fn is_active(&self) -> bool {
        matches!(self, SyncStatus::Pending | SyncStatus::Running)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SyncStatus::Pending => "pending",
            SyncStatus::Running => "running",
            SyncStatus::Completed => "completed",
            SyncStatus::Failed => "failed",
            SyncStatus::Cancelled => "cancelled",
        }
    }
}

impl FromStr for SyncStatus {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(SyncStatus::Pending),
            "running" => Ok(SyncStatus::Running),
            "completed" => Ok(SyncStatus::Completed),
            "failed" => Ok(SyncStatus::Failed),
            "cancelled" => Ok(SyncStatus::Cancelled),
            _ => Err(SyncError::InvalidStatus(s.to_string())),
        }
    }
}

impl std::fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// Progress Types
// ============================================================================

/// Progress information for a running sync job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncProgress {
    pub items_discovered: u64,
    pub items_processed: u64,
    /// Progress percentage (0-100)
    pub percent: u8,
    /// Current phase ("push" or "pull")
    pub phase: String,
}

impl SyncProgress {
    pub fn new() -> Self {
        Self {
            items_discovered: 0,
            items_processed: 0,
            percent: 0,
            phase: "Initializing".to_string(),
        }
    }

    pub fn update(&mut self, items_processed: u64, items_discovered: u64, phase: &str) {
        self.items_processed = items_processed;
        self.items_discovered = items_discovered;
        self.phase = phase.to_string();

        self.percent = if items_discovered > 0 {
            ((items_processed as f64 / items_discovered as f64) * 100.0).min(100.0) as u8
        } else {
            0
        };
    }
}

impl Default for SyncProgress {
    fn default() -> Self {
        Self::new()
    }
}

/// Counters collected over one run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncJobStats {
    /// Local changes accepted by the server
    pub pushed: u64,
    /// Items refreshed from the server
    pub pulled: u64,
    /// Per-item failures that did not abort the run
    pub failed: u64,
}

// ============================================================================
// Sync Job Entity
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncJob {
    pub id: SyncJobId,
    pub status: SyncStatus,
    pub progress: SyncProgress,
    /// Only set once completed
    pub stats: Option<SyncJobStats>,
    pub error_message: Option<String>,
    /// Epoch milliseconds
    pub created_at: i64,
    pub started_at: Option<i64>,
    pub completed_at: Option<i64>,
}

impl SyncJob {
    pub fn new() -> Self {
        Self {
            id: SyncJobId::new(),
            status: SyncStatus::Pending,
            progress: SyncProgress::new(),
            stats: None,
            error_message: None,
            created_at: current_timestamp_ms(),
            started_at: None,
            completed_at: None,
        }
    }

    /// Start the sync job
    ///
    /// # Errors
    ///
    /// Returns an error if the job is not in `Pending` state
    pub fn start(mut self) -> Result<Self> {
        self.validate_transition(SyncStatus::Running)?;
        self.status = SyncStatus::Running;
        self.started_at = Some(current_timestamp_ms());
        self.progress.phase = "Starting sync".to_string();
        Ok(self)
    }

    /// Update progress information
    ///
    /// # Errors
    ///
    /// Returns an error if the job is not in `Running` state
    pub fn update_progress(
        &mut self,
        items_processed: u64,
        items_discovered: u64,
        phase: &str,
    ) -> Result<()> {
        if self.status != SyncStatus::Running {
            return Err(SyncError::InvalidStateTransition {
                from: self.status.as_str().to_string(),
                to: "update_progress".to_string(),
                reason: "Job must be running to update progress".to_string(),
            });
        }

        self.progress
            .update(items_processed, items_discovered, phase);
        Ok(())
    }

    /// Mark the job as completed with statistics
    pub fn complete(mut self, stats: SyncJobStats) -> Result<Self> {
        self.validate_transition(SyncStatus::Completed)?;
        self.status = SyncStatus::Completed;
        self.completed_at = Some(current_timestamp_ms());
        self.stats = Some(stats);
        self.progress.percent = 100;
        self.progress.phase = "Completed".to_string();
        Ok(self)
    }

    pub fn fail(mut self, error_message: String) -> Result<Self> {
        self.validate_transition(SyncStatus::Failed)?;
        self.status = SyncStatus::Failed;
        self.completed_at = Some(current_timestamp_ms());
        self.error_message = Some(error_message);
        self.progress.phase = "Failed".to_string();
        Ok(self)
    }

    pub fn cancel(mut self) -> Result<Self> {
        self.validate_transition(SyncStatus::Cancelled)?;
        self.status = SyncStatus::Cancelled;
        self.completed_at = Some(current_timestamp_ms());
        self.progress.phase = "Cancelled".to_string();
        Ok(self)
    }

    /// Wall-clock duration, once the job has both started and finished.
    pub fn duration_ms(&self) -> Option<u64> {
        match (self.started_at, self.completed_at) {
            (Some(start), Some(end)) => Some(end.saturating_sub(start).max(0) as u64),
            _ => None,
        }
    }

    fn validate_transition(&self, to: SyncStatus) -> Result<()> {
        let valid = matches!(
            (self.status, to),
            (SyncStatus::Pending, SyncStatus::Running)
                | (SyncStatus::Pending, SyncStatus::Cancelled)
                | (SyncStatus::Pending, SyncStatus::Failed)
                | (SyncStatus::Running, SyncStatus::Completed)
                | (SyncStatus::Running, SyncStatus::Failed)
                | (SyncStatus::Running, SyncStatus::Cancelled)
        );

        if !valid {
            return Err(SyncError::InvalidStateTransition {
                from: self.status.as_str().to_string(),
                to: to.as_str().to_string(),
                reason: format!(
                    "Cannot transition from {} to {}",
                    self.status.as_str(),
                    to.as_str()
                ),
            });
        }

        Ok(())
    }
}

impl Default for SyncJob {
    fn default() -> Self {
        Self::new()
    }
}

fn current_timestamp_ms() -> i64 {
    Utc::now().timestamp_millis()
}

// ============================================================================
// Tests
// ============================================================================
