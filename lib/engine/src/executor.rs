//! Step execution.
//!
//! The executor processes one `StepInvocation` at a time: it executes
//! the named node against the run's trigger payload, appends to the
//! execution trace, persists the run, and enqueues the next hop. Every
//! graph hop goes back through the queue, so no workflow ever executes
//! more than one node per message.

use crate::action::ActionDispatcher;
use crate::continuation::ScheduledContinuation;
use crate::edge::EdgeLabel;
use crate::error::EngineError;
use crate::envelope::Envelope;
use crate::node::{Node, NodeConfig, NodeId, NodeKind};
use crate::queue::{StepInvocation, StepQueue};
use crate::run::{Run, RunStatus, TraceStatus};
use crate::store::{DefinitionStore, StateStore};
use chrono::Utc;
use darkroom_core::RunId;
use std::sync::Arc;

/// The result of executing one step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepOutcome {
    pub run_id: RunId,
    pub node_id: NodeId,
    pub node_kind: NodeKind,
    /// The run's status after this step.
    pub run_status: RunStatus,
}

/// Executes queued step invocations against stored run state.
pub struct StepExecutor {
    definitions: Arc<dyn DefinitionStore>,
    state: Arc<dyn StateStore>,
    queue: Arc<dyn StepQueue>,
    actions: Arc<dyn ActionDispatcher>,
}

impl StepExecutor {
    #[must_use]
    pub fn new(
        definitions: Arc<dyn DefinitionStore>,
        state: Arc<dyn StateStore>,
        queue: Arc<dyn StepQueue>,
        actions: Arc<dyn ActionDispatcher>,
    ) -> Self {
        Self {
            definitions,
            state,
            queue,
            actions,
        }
    }

    /// Executes one node of one run.
    ///
    /// Stale invocations (a node the run has moved past, or a run that
    /// is already terminal) return an error without touching the run,
    /// so redelivered queue messages are harmless.
    ///
    /// # Errors
    ///
    /// Returns an error when the invocation is stale, a referenced
    /// entity is missing, an action fails, or persistence fails.
    pub async fn execute_step(
        &self,
        invocation: StepInvocation,
    ) -> Result<StepOutcome, EngineError> {
        let mut run = self
            .state
            .fetch_run(invocation.run_id)
            .await?
            .ok_or(EngineError::RunNotFound {
                run_id: invocation.run_id,
            })?;

        if run.status.is_terminal() {
            return Err(EngineError::RunNotResumable {
                run_id: run.id,
                status: run.status,
            });
        }
        if run.current_node_id != Some(invocation.node_id) {
            return Err(EngineError::StaleInvocation {
                run_id: run.id,
                node_id: invocation.node_id,
            });
        }

        let Some(definition) = self.definitions.fetch(run.workflow_id).await? else {
            let workflow_id = run.workflow_id;
            self.fail_run(&mut run, format!("workflow definition {workflow_id} no longer exists"))
                .await?;
            return Err(EngineError::DefinitionNotFound { workflow_id });
        };

        let Some(node) = definition.graph.get_node(invocation.node_id) else {
            let node_id = invocation.node_id;
            self.fail_run(&mut run, format!("node {node_id} no longer exists in workflow graph"))
                .await?;
            return Err(EngineError::NodeNotFound {
                run_id: run.id,
                node_id,
            });
        };

        let resuming = run.status == RunStatus::Waiting;
        if resuming {
            run.resume();
        }

        tracing::debug!(
            run_id = %run.id,
            node_id = %node.id,
            node_kind = %node.kind(),
            resuming,
            "executing step"
        );

        let next_label = match &node.config {
            NodeConfig::Unknown => {
                let node_id = node.id;
                self.fail_run(
                    &mut run,
                    format!("node {node_id} has a node type this engine cannot execute"),
                )
                .await?;
                return Err(EngineError::UnsupportedNode {
                    run_id: run.id,
                    node_id,
                });
            }
            NodeConfig::Trigger => {
                run.finish_step(TraceStatus::Completed, None, None);
                EdgeLabel::Default
            }
            NodeConfig::End => {
                run.finish_step(TraceStatus::Completed, None, None);
                run.succeed();
                self.persist(&mut run).await?;
                return Ok(outcome(&run, node));
            }
            NodeConfig::Condition(condition) => {
                let result = condition.evaluate(&run.trigger_payload);
                run.finish_step(TraceStatus::Completed, Some(result), None);
                EdgeLabel::for_result(result)
            }
            NodeConfig::Action(action) => {
                if run.dry_run {
                    tracing::debug!(run_id = %run.id, action = action.kind(), "dry run, skipping action");
                } else if let Err(source) =
                    self.actions.dispatch(action, &run.trigger_payload).await
                {
                    let node_id = node.id;
                    run.finish_step(TraceStatus::Failed, None, None);
                    run.fail(source.to_string());
                    self.persist(&mut run).await?;
                    return Err(EngineError::ActionFailed { node_id, source });
                }
                run.finish_step(TraceStatus::Completed, None, None);
                EdgeLabel::Default
            }
            NodeConfig::Delay(delay) => {
                // First visit suspends; the resuming visit completes the
                // entry and moves on. Dry runs never wait.
                if resuming || run.dry_run {
                    run.finish_step(TraceStatus::Completed, None, None);
                    EdgeLabel::Default
                } else {
                    let resume_at = Utc::now() + delay.duration();
                    run.finish_step(TraceStatus::Waiting, None, Some(resume_at));
                    run.suspend();
                    let continuation = ScheduledContinuation::schedule(
                        run.id,
                        node.id,
                        run.trigger_payload.clone(),
                        resume_at,
                    );
                    let expected = run.version;
                    run.version += 1;
                    self.state
                        .suspend_run(&run, &continuation, expected)
                        .await?;
                    tracing::info!(
                        run_id = %run.id,
                        continuation_id = %continuation.id,
                        resume_at = %resume_at,
                        "run suspended at delay node"
                    );
                    return Ok(outcome(&run, node));
                }
            }
        };

        match definition.graph.follow(node.id, next_label) {
            Some(next) => {
                run.advance_to(next);
                self.persist(&mut run).await?;
                self.enqueue(&run, next).await?;
            }
            None => {
                // No matching edge ends the run quietly.
                run.succeed();
                self.persist(&mut run).await?;
            }
        }

        Ok(outcome(&run, node))
    }

    /// Cancels a run, discarding any pending continuations.
    ///
    /// # Errors
    ///
    /// Returns an error when the run is missing, already terminal, or
    /// persistence fails.
    pub async fn cancel_run(&self, run_id: RunId) -> Result<(), EngineError> {
        let mut run = self
            .state
            .fetch_run(run_id)
            .await?
            .ok_or(EngineError::RunNotFound { run_id })?;

        if run.status.is_terminal() {
            return Err(EngineError::RunNotResumable {
                run_id,
                status: run.status,
            });
        }

        run.cancel();
        self.persist(&mut run).await?;
        let cancelled = self.state.cancel_pending_continuations(run_id).await?;
        tracing::info!(run_id = %run_id, continuations_cancelled = cancelled, "run cancelled");
        Ok(())
    }

    async fn persist(&self, run: &mut Run) -> Result<(), EngineError> {
        let expected = run.version;
        run.version += 1;
        self.state.update_run(run, expected).await?;
        Ok(())
    }

    async fn fail_run(&self, run: &mut Run, message: String) -> Result<(), EngineError> {
        run.finish_step(TraceStatus::Failed, None, None);
        run.fail(message);
        self.persist(run).await
    }

    async fn enqueue(&self, run: &Run, next: &Node) -> Result<(), EngineError> {
        let invocation = StepInvocation {
            run_id: run.id,
            node_id: next.id,
            payload: run.trigger_payload.clone(),
            dry_run: run.dry_run,
        };
        self.queue.publish(Envelope::new(invocation)).await?;
        Ok(())
    }
}

fn outcome(run: &Run, node: &Node) -> StepOutcome {
    StepOutcome {
        run_id: run.id,
        node_id: node.id,
        node_kind: node.kind(),
        run_status: run.status,
    }
}
