//! Trigger dispatch.
//!
//! When a domain event fires, the dispatcher finds every active
//! definition listening for it and starts one run per match. Each
//! workflow is started independently: one broken definition never
//! blocks the rest, its failure is just recorded in the report.

use crate::definition::WorkflowDefinition;
use crate::envelope::Envelope;
use crate::error::EngineError;
use crate::queue::{StepInvocation, StepQueue};
use crate::run::Run;
use crate::store::{DefinitionStore, StateStore};
use darkroom_core::{RunId, WorkflowId};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::sync::Arc;

/// How dispatching one matched workflow went.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DispatchOutcome {
    /// A run was created and its first step enqueued.
    Started { run_id: RunId },
    /// The workflow could not be started.
    Failed { error: String },
}

/// The dispatch result for one matched workflow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowDispatch {
    pub workflow_id: WorkflowId,
    #[serde(flatten)]
    pub outcome: DispatchOutcome,
}

/// The result of dispatching one domain event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchReport {
    pub event: String,
    /// Number of active definitions that matched the event.
    pub matched: usize,
    pub results: Vec<WorkflowDispatch>,
}

impl DispatchReport {
    /// Returns the IDs of runs that were started.
    #[must_use]
    pub fn started_runs(&self) -> Vec<RunId> {
        self.results
            .iter()
            .filter_map(|dispatch| match dispatch.outcome {
                DispatchOutcome::Started { run_id } => Some(run_id),
                DispatchOutcome::Failed { .. } => None,
            })
            .collect()
    }
}

/// Starts runs for domain events.
pub struct TriggerDispatcher {
    definitions: Arc<dyn DefinitionStore>,
    state: Arc<dyn StateStore>,
    queue: Arc<dyn StepQueue>,
}

impl TriggerDispatcher {
    #[must_use]
    pub fn new(
        definitions: Arc<dyn DefinitionStore>,
        state: Arc<dyn StateStore>,
        queue: Arc<dyn StepQueue>,
    ) -> Self {
        Self {
            definitions,
            state,
            queue,
        }
    }

    /// Starts a run for every active definition triggered by `event`.
    ///
    /// Set `dry_run` to trace runs without side effects or delays.
    ///
    /// # Errors
    ///
    /// Returns an error only when the definition store is unreachable.
    /// Per-workflow failures land in the report instead.
    pub async fn dispatch(
        &self,
        event: &str,
        payload: &JsonValue,
        dry_run: bool,
    ) -> Result<DispatchReport, EngineError> {
        let matches = self.definitions.find_active_by_event(event).await?;

        tracing::debug!(event, matched = matches.len(), dry_run, "dispatching event");

        let mut results = Vec::with_capacity(matches.len());
        for definition in &matches {
            let outcome = match self.start_run(definition, event, payload, dry_run).await {
                Ok(run_id) => DispatchOutcome::Started { run_id },
                Err(error) => {
                    tracing::warn!(
                        workflow_id = %definition.id,
                        event,
                        %error,
                        "failed to start run"
                    );
                    DispatchOutcome::Failed {
                        error: error.to_string(),
                    }
                }
            };
            results.push(WorkflowDispatch {
                workflow_id: definition.id,
                outcome,
            });
        }

        Ok(DispatchReport {
            event: event.to_string(),
            matched: matches.len(),
            results,
        })
    }

    async fn start_run(
        &self,
        definition: &WorkflowDefinition,
        event: &str,
        payload: &JsonValue,
        dry_run: bool,
    ) -> Result<RunId, EngineError> {
        let trigger =
            definition
                .graph
                .trigger_node()
                .ok_or(EngineError::DefinitionNotFound {
                    workflow_id: definition.id,
                })?;

        let mut run = Run::start(definition.id, event, payload.clone(), trigger, dry_run);
        let run_id = run.id;
        self.state.insert_run(&run).await?;

        if let Err(error) = self
            .queue
            .publish(Envelope::new(StepInvocation {
                run_id,
                node_id: trigger.id,
                payload: payload.clone(),
                dry_run,
            }))
            .await
        {
            // The run is already persisted and nothing will ever drive
            // it without its first invocation; fail it rather than
            // leave it running forever.
            let expected = run.version;
            run.version += 1;
            run.fail(format!("failed to enqueue first step: {error}"));
            if let Err(store_error) = self.state.update_run(&run, expected).await {
                tracing::warn!(
                    run_id = %run_id,
                    %store_error,
                    "failed to record enqueue failure on run"
                );
            }
            return Err(EngineError::Queue(error));
        }

        tracing::info!(run_id = %run_id, workflow_id = %definition.id, event, "run started");
        Ok(run_id)
    }
}
