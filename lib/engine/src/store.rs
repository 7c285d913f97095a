//! Storage traits for definitions and run state.
//!
//! The engine is storage-agnostic: the worker binary provides Postgres
//! implementations, and [`crate::memory`] provides in-memory ones for
//! tests and embedding.

use crate::continuation::{ContinuationStatus, ScheduledContinuation};
use crate::definition::WorkflowDefinition;
use crate::run::Run;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use darkroom_core::{ContinuationId, RunId, WorkflowId};
use std::fmt;

/// Errors from store operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// An update's expected version no longer matches the stored run.
    VersionConflict { run_id: RunId },
    /// The backend failed.
    Backend { message: String },
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::VersionConflict { run_id } => {
                write!(f, "version conflict updating run {run_id}")
            }
            Self::Backend { message } => write!(f, "store backend error: {message}"),
        }
    }
}

impl std::error::Error for StoreError {}

/// Read access to workflow definitions.
#[async_trait]
pub trait DefinitionStore: Send + Sync {
    /// Fetches a definition by ID.
    async fn fetch(&self, id: WorkflowId) -> Result<Option<WorkflowDefinition>, StoreError>;

    /// Returns all active definitions whose trigger matches the event.
    async fn find_active_by_event(
        &self,
        event: &str,
    ) -> Result<Vec<WorkflowDefinition>, StoreError>;
}

/// Persistence for runs and scheduled continuations.
///
/// `update_run` and `suspend_run` compare-and-swap on `expected_version`
/// so two executors racing on the same run cannot both win. The caller
/// bumps `run.version` before the call; `expected_version` is the value
/// it read.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Inserts a freshly started run.
    async fn insert_run(&self, run: &Run) -> Result<(), StoreError>;

    /// Fetches a run by ID.
    async fn fetch_run(&self, id: RunId) -> Result<Option<Run>, StoreError>;

    /// Persists a run mutation, guarded by its previous version.
    async fn update_run(&self, run: &Run, expected_version: u64) -> Result<(), StoreError>;

    /// Atomically persists a suspended run together with its
    /// continuation.
    async fn suspend_run(
        &self,
        run: &Run,
        continuation: &ScheduledContinuation,
        expected_version: u64,
    ) -> Result<(), StoreError>;

    /// Returns pending continuations due at or before `now`.
    async fn due_continuations(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<ScheduledContinuation>, StoreError>;

    /// Transitions a continuation's status.
    async fn mark_continuation(
        &self,
        id: ContinuationId,
        status: ContinuationStatus,
    ) -> Result<(), StoreError>;

    /// Cancels all pending continuations for a run. Returns the number
    /// cancelled.
    async fn cancel_pending_continuations(&self, run_id: RunId) -> Result<u64, StoreError>;
}
