//! Run progress: a shared snapshot updated by the running task and the
//! handle through which callers observe or await it.

use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;

use super::error::{CollectorError, Result};
use super::runner::RunReport;

/// Phase of an ingestion run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RunPhase {
    ListingAccounts,
    Polling,
    Merging,
    Classifying,
    Done,
}

impl std::fmt::Display for RunPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunPhase::ListingAccounts => write!(f, "Listing accounts"),
            RunPhase::Polling => write!(f, "Polling mailboxes"),
            RunPhase::Merging => write!(f, "Merging backlogs"),
            RunPhase::Classifying => write!(f, "Classifying"),
            RunPhase::Done => write!(f, "Done"),
        }
    }
}

/// Status of an ingestion run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    Completed,
    Failed,
}

/// Point-in-time snapshot of a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunState {
    /// Current phase.
    pub phase: RunPhase,
    /// Overall status.
    pub status: RunStatus,
    /// Accounts polled successfully so far.
    pub accounts_polled: usize,
    /// Accounts skipped (no usable credential).
    pub accounts_skipped: usize,
    /// Accounts whose poll failed.
    pub accounts_failed: usize,
    /// Size of the merged backlog.
    pub messages_merged: usize,
    /// Messages classified so far.
    pub messages_classified: usize,
    /// Error message (set on failure).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// When the run started.
    pub started_at: DateTime<Utc>,
    /// When the run finished (if it has).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

impl RunState {
    fn new() -> Self {
        Self {
            phase: RunPhase::ListingAccounts,
            status: RunStatus::Running,
            accounts_polled: 0,
            accounts_skipped: 0,
            accounts_failed: 0,
            messages_merged: 0,
            messages_classified: 0,
            error: None,
            started_at: Utc::now(),
            finished_at: None,
        }
    }
}

/// Shared run state. The running task writes through it; the handle reads
/// snapshots. Clone is cheap (inner `Arc`).
#[derive(Clone)]
pub struct RunTracker {
    state: Arc<RwLock<RunState>>,
}

impl RunTracker {
    /// Creates a tracker in the initial running state.
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(RunState::new())),
        }
    }

    /// Returns a snapshot of the current state.
    pub fn snapshot(&self) -> RunState {
        let guard = match self.state.read() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!("Run state lock was poisoned, recovering");
                poisoned.into_inner()
            }
        };
        guard.clone()
    }

    pub(crate) fn set_phase(&self, phase: RunPhase) {
        self.update(|state| state.phase = phase);
    }

    pub(crate) fn record_accounts(&self, polled: usize, skipped: usize, failed: usize) {
        self.update(|state| {
            state.accounts_polled = polled;
            state.accounts_skipped = skipped;
            state.accounts_failed = failed;
        });
    }

    pub(crate) fn record_merged(&self, merged: usize) {
        self.update(|state| state.messages_merged = merged);
    }

    pub(crate) fn increment_classified(&self) {
        self.update(|state| state.messages_classified += 1);
    }

    /// Marks the run finished and syncs the final counters from the report.
    pub(crate) fn complete(&self, report: &RunReport) {
        self.update(|state| {
            state.phase = RunPhase::Done;
            state.status = RunStatus::Completed;
            state.accounts_polled = report.accounts_polled;
            state.accounts_skipped = report.accounts_skipped;
            state.accounts_failed = report.accounts_failed;
            state.messages_merged = report.messages_merged;
            state.messages_classified = report.messages_classified;
            state.finished_at = Some(Utc::now());
        });
    }

    /// Marks the run failed. The phase is left where the failure happened.
    pub(crate) fn fail(&self, error: &str) {
        self.update(|state| {
            state.status = RunStatus::Failed;
            state.error = Some(error.to_string());
            state.finished_at = Some(Utc::now());
        });
    }

    fn update(&self, apply: impl FnOnce(&mut RunState)) {
        let mut guard = match self.state.write() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!("Run state lock was poisoned, recovering");
                poisoned.into_inner()
            }
        };
        apply(&mut guard);
    }
}

impl Default for RunTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle to a spawned run.
///
/// Dropping the handle detaches the run; it keeps going in the background.
/// Keeping it makes the run observable through [`RunHandle::status`] and
/// awaitable through [`RunHandle::join`].
pub struct RunHandle {
    run_id: String,
    tracker: RunTracker,
    task: JoinHandle<Result<RunReport>>,
}

impl RunHandle {
    pub(crate) fn new(
        run_id: String,
        tracker: RunTracker,
        task: JoinHandle<Result<RunReport>>,
    ) -> Self {
        Self {
            run_id,
            tracker,
            task,
        }
    }

    /// Unique id of this run.
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Returns a snapshot of the run's current state.
    pub fn status(&self) -> RunState {
        self.tracker.snapshot()
    }

    /// True once the background task has finished.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Waits for the run to finish and returns its report.
    pub async fn join(self) -> Result<RunReport> {
        match self.task.await {
            Ok(result) => result,
            Err(e) => Err(CollectorError::TaskJoin(e.to_string())),
        }
    }
}
