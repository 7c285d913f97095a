//! Resuming suspended runs.

use chrono::{DateTime, Utc};
use darkroom_engine::continuation::{ContinuationStatus, ScheduledContinuation};
use darkroom_engine::envelope::Envelope;
use darkroom_engine::queue::{StepInvocation, StepQueue};
use darkroom_engine::store::{StateStore, StoreError};
use std::sync::Arc;

/// The result of one resume sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ResumeReport {
    /// Continuations that were due this sweep.
    pub due: usize,
    /// Continuations re-enqueued as step invocations.
    pub resumed: usize,
    /// Continuations that could not be re-enqueued and stay pending.
    pub failed: usize,
}

/// Sweeps due continuations back onto the step queue.
///
/// A continuation is marked executed before its invocation is
/// published. If the publish fails it is flipped back to pending so the
/// next sweep retries it; two sweeps racing on the same record is the
/// store's problem, and the executor's staleness check swallows any
/// duplicate invocation that slips through.
pub struct Resumer {
    state: Arc<dyn StateStore>,
    queue: Arc<dyn StepQueue>,
}

impl Resumer {
    #[must_use]
    pub fn new(state: Arc<dyn StateStore>, queue: Arc<dyn StepQueue>) -> Self {
        Self { state, queue }
    }

    /// Resumes every continuation due at or before `now`.
    ///
    /// # Errors
    ///
    /// Returns an error only when the store is unreachable. Individual
    /// publish failures are counted in the report and retried on the
    /// next sweep.
    pub async fn resume_due(&self, now: DateTime<Utc>) -> Result<ResumeReport, StoreError> {
        let due = self.state.due_continuations(now).await?;
        let mut report = ResumeReport {
            due: due.len(),
            ..ResumeReport::default()
        };

        for continuation in due {
            match self.resume_one(&continuation).await {
                Ok(()) => {
                    report.resumed += 1;
                    tracing::info!(
                        continuation_id = %continuation.id,
                        run_id = %continuation.run_id,
                        "continuation resumed"
                    );
                }
                Err(error) => {
                    report.failed += 1;
                    tracing::warn!(
                        continuation_id = %continuation.id,
                        run_id = %continuation.run_id,
                        %error,
                        "failed to resume continuation"
                    );
                }
            }
        }

        Ok(report)
    }

    async fn resume_one(&self, continuation: &ScheduledContinuation) -> Result<(), StoreError> {
        self.state
            .mark_continuation(continuation.id, ContinuationStatus::Executed)
            .await?;

        let invocation = StepInvocation {
            run_id: continuation.run_id,
            node_id: continuation.node_id,
            payload: continuation.payload.clone(),
            dry_run: false,
        };

        if let Err(error) = self.queue.publish(Envelope::new(invocation)).await {
            self.state
                .mark_continuation(continuation.id, ContinuationStatus::Pending)
                .await?;
            return Err(StoreError::Backend {
                message: error.to_string(),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use darkroom_engine::memory::{InMemoryStateStore, InMemoryStepQueue};
    use darkroom_engine::node::NodeId;
    use darkroom_core::RunId;
    use serde_json::json;

    fn continuation(scheduled_for: DateTime<Utc>) -> ScheduledContinuation {
        ScheduledContinuation::schedule(
            RunId::new(),
            NodeId::new(),
            json!({"email": "client@example.com"}),
            scheduled_for,
        )
    }

    async fn store_with(
        continuations: Vec<ScheduledContinuation>,
    ) -> Arc<InMemoryStateStore> {
        let state = Arc::new(InMemoryStateStore::new());
        for c in continuations {
            // Continuations enter the store via suspend_run.
            let run = darkroom_engine::run::Run::start(
                darkroom_core::WorkflowId::new(),
                "gallery.delivered",
                c.payload.clone(),
                &darkroom_engine::node::Node::new(
                    "Wait",
                    darkroom_engine::node::NodeConfig::Delay(Default::default()),
                ),
                false,
            );
            state.insert_run(&run).await.unwrap();
            state.suspend_run(&run, &c, 0).await.unwrap();
        }
        state
    }

    #[tokio::test]
    async fn due_continuations_are_requeued_and_marked_executed() {
        let now = Utc::now();
        let due = continuation(now - Duration::minutes(5));
        let due_id = due.id;
        let expected_run = due.run_id;
        let expected_node = due.node_id;
        let future = continuation(now + Duration::hours(1));

        let state = store_with(vec![due, future]).await;
        let queue = Arc::new(InMemoryStepQueue::new());
        let resumer = Resumer::new(state.clone(), queue.clone());

        let report = resumer.resume_due(now).await.expect("sweep");
        assert_eq!(report, ResumeReport { due: 1, resumed: 1, failed: 0 });

        let invocation = queue.pop().expect("invocation enqueued");
        assert_eq!(invocation.run_id, expected_run);
        assert_eq!(invocation.node_id, expected_node);
        assert!(!invocation.dry_run);
        assert!(queue.is_empty());

        let statuses: Vec<_> = state
            .continuations()
            .into_iter()
            .map(|c| (c.id, c.status))
            .collect();
        assert!(statuses.contains(&(due_id, ContinuationStatus::Executed)));
        assert!(statuses
            .iter()
            .any(|(id, status)| *id != due_id && *status == ContinuationStatus::Pending));
    }

    #[tokio::test]
    async fn sweep_with_nothing_due_is_a_noop() {
        let now = Utc::now();
        let state = store_with(vec![continuation(now + Duration::hours(1))]).await;
        let queue = Arc::new(InMemoryStepQueue::new());
        let resumer = Resumer::new(state, queue.clone());

        let report = resumer.resume_due(now).await.expect("sweep");
        assert_eq!(report, ResumeReport::default());
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn executed_continuations_are_not_resumed_twice() {
        let now = Utc::now();
        let state = store_with(vec![continuation(now - Duration::minutes(1))]).await;
        let queue = Arc::new(InMemoryStepQueue::new());
        let resumer = Resumer::new(state, queue.clone());

        let first = resumer.resume_due(now).await.expect("first sweep");
        assert_eq!(first.resumed, 1);

        let second = resumer.resume_due(now).await.expect("second sweep");
        assert_eq!(second, ResumeReport::default());
        assert_eq!(queue.len(), 1);
    }
}
