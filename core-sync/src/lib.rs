//! # User Data Sync Module
//!
//! Reconciles local watch state with the media server in the background.
//!
//! ## Components
//!
//! - **Sync Job State Machine** (`job`): lifecycle of one run with validated transitions
//! - **Sync Worker** (`worker`): push pending local changes, then pull remote state
//! - **Sync Scheduler** (`scheduler`): enqueues the worker as unique background work

pub mod error;
pub mod job;
pub mod scheduler;
pub mod worker;

pub use error::{Result, SyncError};
pub use job::{SyncJob, SyncJobId, SyncJobStats, SyncProgress, SyncStatus};
pub use scheduler::{SyncScheduler, SYNC_USER_DATA_TASK};
pub use worker::UserDataSyncWorker;
