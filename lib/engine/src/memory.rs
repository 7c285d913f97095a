//! In-memory store and queue implementations.
//!
//! Used throughout the test suites and by embedders that don't need
//! durability. The queue is a plain FIFO the caller drains by hand,
//! which makes step-by-step execution observable in tests.

use crate::continuation::{ContinuationStatus, ScheduledContinuation};
use crate::definition::WorkflowDefinition;
use crate::envelope::Envelope;
use crate::queue::{QueueError, StepInvocation, StepQueue};
use crate::run::Run;
use crate::store::{DefinitionStore, StateStore, StoreError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use darkroom_core::{ContinuationId, RunId, WorkflowId};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

/// In-memory definition store.
#[derive(Default)]
pub struct InMemoryDefinitionStore {
    definitions: Mutex<HashMap<WorkflowId, WorkflowDefinition>>,
}

impl InMemoryDefinitionStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a definition.
    pub fn insert(&self, definition: WorkflowDefinition) {
        self.definitions
            .lock()
            .unwrap()
            .insert(definition.id, definition);
    }
}

#[async_trait]
impl DefinitionStore for InMemoryDefinitionStore {
    async fn fetch(&self, id: WorkflowId) -> Result<Option<WorkflowDefinition>, StoreError> {
        Ok(self.definitions.lock().unwrap().get(&id).cloned())
    }

    async fn find_active_by_event(
        &self,
        event: &str,
    ) -> Result<Vec<WorkflowDefinition>, StoreError> {
        let mut matches: Vec<_> = self
            .definitions
            .lock()
            .unwrap()
            .values()
            .filter(|def| def.is_active && def.trigger_event == event)
            .cloned()
            .collect();
        // HashMap iteration order is arbitrary; dispatch order should not be.
        matches.sort_by_key(|def| def.id);
        Ok(matches)
    }
}

/// In-memory run and continuation store.
#[derive(Default)]
pub struct InMemoryStateStore {
    runs: Mutex<HashMap<RunId, Run>>,
    continuations: Mutex<Vec<ScheduledContinuation>>,
}

impl InMemoryStateStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns all stored runs, in no particular order.
    #[must_use]
    pub fn runs(&self) -> Vec<Run> {
        self.runs.lock().unwrap().values().cloned().collect()
    }

    /// Returns all continuations, regardless of status.
    #[must_use]
    pub fn continuations(&self) -> Vec<ScheduledContinuation> {
        self.continuations.lock().unwrap().clone()
    }

    fn check_and_store(&self, run: &Run, expected_version: u64) -> Result<(), StoreError> {
        let mut runs = self.runs.lock().unwrap();
        let stored = runs
            .get(&run.id)
            .ok_or(StoreError::VersionConflict { run_id: run.id })?;
        if stored.version != expected_version {
            return Err(StoreError::VersionConflict { run_id: run.id });
        }
        runs.insert(run.id, run.clone());
        Ok(())
    }
}

#[async_trait]
impl StateStore for InMemoryStateStore {
    async fn insert_run(&self, run: &Run) -> Result<(), StoreError> {
        self.runs.lock().unwrap().insert(run.id, run.clone());
        Ok(())
    }

    async fn fetch_run(&self, id: RunId) -> Result<Option<Run>, StoreError> {
        Ok(self.runs.lock().unwrap().get(&id).cloned())
    }

    async fn update_run(&self, run: &Run, expected_version: u64) -> Result<(), StoreError> {
        self.check_and_store(run, expected_version)
    }

    async fn suspend_run(
        &self,
        run: &Run,
        continuation: &ScheduledContinuation,
        expected_version: u64,
    ) -> Result<(), StoreError> {
        self.check_and_store(run, expected_version)?;
        self.continuations.lock().unwrap().push(continuation.clone());
        Ok(())
    }

    async fn due_continuations(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<ScheduledContinuation>, StoreError> {
        Ok(self
            .continuations
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.is_due(now))
            .cloned()
            .collect())
    }

    async fn mark_continuation(
        &self,
        id: ContinuationId,
        status: ContinuationStatus,
    ) -> Result<(), StoreError> {
        let mut continuations = self.continuations.lock().unwrap();
        let continuation = continuations
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| StoreError::Backend {
                message: format!("continuation not found: {id}"),
            })?;
        continuation.status = status;
        Ok(())
    }

    async fn cancel_pending_continuations(&self, run_id: RunId) -> Result<u64, StoreError> {
        let mut cancelled = 0;
        for continuation in self.continuations.lock().unwrap().iter_mut() {
            if continuation.run_id == run_id && continuation.status == ContinuationStatus::Pending {
                continuation.status = ContinuationStatus::Cancelled;
                cancelled += 1;
            }
        }
        Ok(cancelled)
    }
}

/// In-memory FIFO step queue.
#[derive(Default)]
pub struct InMemoryStepQueue {
    invocations: Mutex<VecDeque<StepInvocation>>,
}

impl InMemoryStepQueue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Pops the oldest queued invocation.
    #[must_use]
    pub fn pop(&self) -> Option<StepInvocation> {
        self.invocations.lock().unwrap().pop_front()
    }

    /// Returns the number of queued invocations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.invocations.lock().unwrap().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.invocations.lock().unwrap().is_empty()
    }
}

#[async_trait]
impl StepQueue for InMemoryStepQueue {
    async fn publish(&self, invocation: Envelope<StepInvocation>) -> Result<(), QueueError> {
        self.invocations
            .lock()
            .unwrap()
            .push_back(invocation.into_payload());
        Ok(())
    }
}
