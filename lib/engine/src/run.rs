//! Workflow runs and their execution traces.
//!
//! A run is one live execution of a definition. Its `execution_path` is
//! an ordered audit trace with one entry per node visit. The `version`
//! counter guards concurrent updates: every persisted mutation bumps it
//! and stores compare-and-swap on the previous value.

use crate::node::{Node, NodeConfig, NodeId, NodeKind};
use chrono::{DateTime, Utc};
use darkroom_core::{RunId, WorkflowId};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// The lifecycle status of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Actively walking the graph.
    Running,
    /// Suspended at a delay node until its continuation fires.
    Waiting,
    /// Reached an end node or ran out of matching edges.
    Succeeded,
    /// An action failed or the graph was unusable.
    Failed,
    /// Cancelled by an operator.
    Cancelled,
}

impl RunStatus {
    /// Terminal statuses never change again.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Cancelled)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Waiting => "waiting",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RunStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "running" => Ok(Self::Running),
            "waiting" => Ok(Self::Waiting),
            "succeeded" => Ok(Self::Succeeded),
            "failed" => Ok(Self::Failed),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(format!("unknown run status: {other}")),
        }
    }
}

/// The status of a single trace entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraceStatus {
    /// The node has been reached but not finished.
    Executing,
    /// The node finished normally.
    Completed,
    /// The node is a delay the run is suspended at.
    Waiting,
    /// The node failed and the run failed with it.
    Failed,
}

/// One entry in a run's execution trace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceEntry {
    pub node_id: NodeId,
    pub node_kind: NodeKind,
    /// The action name for action nodes, e.g. `send_email`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_kind: Option<String>,
    /// Last transition time of this entry.
    pub timestamp: DateTime<Utc>,
    pub status: TraceStatus,
    /// Condition nodes record their evaluation result.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<bool>,
    /// Delay nodes record when the run resumes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheduled_for: Option<DateTime<Utc>>,
}

impl TraceEntry {
    /// Creates an `executing` entry for a freshly reached node.
    #[must_use]
    pub fn executing(node: &Node) -> Self {
        let action_kind = match &node.config {
            NodeConfig::Action(action) => Some(action.kind().to_string()),
            _ => None,
        };
        Self {
            node_id: node.id,
            node_kind: node.kind(),
            action_kind,
            timestamp: Utc::now(),
            status: TraceStatus::Executing,
            result: None,
            scheduled_for: None,
        }
    }
}

/// One execution of a workflow definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Run {
    pub id: RunId,
    pub workflow_id: WorkflowId,
    /// The event that started this run.
    pub trigger_event: String,
    /// The event payload, immutable for the life of the run.
    pub trigger_payload: JsonValue,
    pub status: RunStatus,
    /// The node the next step invocation must name. `None` once terminal.
    pub current_node_id: Option<NodeId>,
    /// Ordered audit trace of node visits.
    pub execution_path: Vec<TraceEntry>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
    /// Dry runs trace every node but skip side effects and delays.
    pub dry_run: bool,
    /// Optimistic concurrency counter, bumped on every persisted update.
    pub version: u64,
}

impl Run {
    /// Creates a new run positioned at the workflow's trigger node.
    #[must_use]
    pub fn start(
        workflow_id: WorkflowId,
        trigger_event: impl Into<String>,
        trigger_payload: JsonValue,
        trigger_node: &Node,
        dry_run: bool,
    ) -> Self {
        Self {
            id: RunId::new(),
            workflow_id,
            trigger_event: trigger_event.into(),
            trigger_payload,
            status: RunStatus::Running,
            current_node_id: Some(trigger_node.id),
            execution_path: vec![TraceEntry::executing(trigger_node)],
            started_at: Utc::now(),
            completed_at: None,
            error_message: None,
            dry_run,
            version: 0,
        }
    }

    /// Returns the trace entry for the node currently being executed.
    fn live_entry(&mut self) -> Option<&mut TraceEntry> {
        let current = self.current_node_id?;
        let entry = self.execution_path.last_mut()?;
        (entry.node_id == current).then_some(entry)
    }

    /// Finishes the current node's trace entry.
    ///
    /// No-op when there is no live entry, which only happens on replayed
    /// invocations. A `scheduled_for` already on the entry is kept, so
    /// completing a resumed delay leaves its resume time in the trace.
    pub fn finish_step(
        &mut self,
        status: TraceStatus,
        result: Option<bool>,
        scheduled_for: Option<DateTime<Utc>>,
    ) {
        if let Some(entry) = self.live_entry() {
            entry.status = status;
            entry.result = result;
            if scheduled_for.is_some() {
                entry.scheduled_for = scheduled_for;
            }
            entry.timestamp = Utc::now();
        }
    }

    /// Moves the run to the next node, opening its trace entry.
    pub fn advance_to(&mut self, node: &Node) {
        self.current_node_id = Some(node.id);
        self.execution_path.push(TraceEntry::executing(node));
    }

    /// Suspends the run at the current delay node.
    pub fn suspend(&mut self) {
        self.status = RunStatus::Waiting;
    }

    /// Resumes a suspended run.
    pub fn resume(&mut self) {
        self.status = RunStatus::Running;
    }

    /// Marks the run succeeded.
    pub fn succeed(&mut self) {
        self.status = RunStatus::Succeeded;
        self.current_node_id = None;
        self.completed_at = Some(Utc::now());
    }

    /// Marks the run failed with an operator-facing message.
    pub fn fail(&mut self, message: impl Into<String>) {
        self.status = RunStatus::Failed;
        self.current_node_id = None;
        self.error_message = Some(message.into());
        self.completed_at = Some(Utc::now());
    }

    /// Marks the run cancelled.
    pub fn cancel(&mut self) {
        self.status = RunStatus::Cancelled;
        self.current_node_id = None;
        self.completed_at = Some(Utc::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::NodeConfig;
    use serde_json::json;

    fn trigger() -> Node {
        Node::new("Trigger", NodeConfig::Trigger)
    }

    #[test]
    fn start_opens_trigger_trace_entry() {
        let node = trigger();
        let run = Run::start(
            WorkflowId::new(),
            "booking.created",
            json!({"email": "client@example.com"}),
            &node,
            false,
        );

        assert_eq!(run.status, RunStatus::Running);
        assert_eq!(run.current_node_id, Some(node.id));
        assert_eq!(run.execution_path.len(), 1);
        assert_eq!(run.execution_path[0].status, TraceStatus::Executing);
        assert_eq!(run.execution_path[0].node_kind, NodeKind::Trigger);
        assert_eq!(run.version, 0);
    }

    #[test]
    fn finish_and_advance_append_one_entry_per_node() {
        let first = trigger();
        let second = Node::new("End", NodeConfig::End);
        let mut run = Run::start(WorkflowId::new(), "gallery.delivered", json!({}), &first, false);

        run.finish_step(TraceStatus::Completed, None, None);
        run.advance_to(&second);

        assert_eq!(run.execution_path.len(), 2);
        assert_eq!(run.execution_path[0].status, TraceStatus::Completed);
        assert_eq!(run.execution_path[1].status, TraceStatus::Executing);
        assert_eq!(run.current_node_id, Some(second.id));

        let timestamps: Vec<_> = run.execution_path.iter().map(|e| e.timestamp).collect();
        assert!(timestamps.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn terminal_transitions_clear_current_node() {
        let node = trigger();
        let mut run = Run::start(WorkflowId::new(), "booking.created", json!({}), &node, false);

        run.fail("smtp unreachable");
        assert_eq!(run.status, RunStatus::Failed);
        assert!(run.status.is_terminal());
        assert!(run.current_node_id.is_none());
        assert_eq!(run.error_message.as_deref(), Some("smtp unreachable"));
        assert!(run.completed_at.is_some());
    }

    #[test]
    fn completing_a_waiting_entry_keeps_its_resume_time() {
        let node = Node::new("Wait", NodeConfig::Delay(crate::node::DelayConfig::default()));
        let mut run = Run::start(WorkflowId::new(), "gallery.delivered", json!({}), &node, false);

        let resume_at = Utc::now() + chrono::Duration::hours(2);
        run.finish_step(TraceStatus::Waiting, None, Some(resume_at));
        run.suspend();

        run.resume();
        run.finish_step(TraceStatus::Completed, None, None);

        let entry = &run.execution_path[0];
        assert_eq!(entry.status, TraceStatus::Completed);
        assert_eq!(entry.scheduled_for, Some(resume_at));
    }

    #[test]
    fn finish_step_without_live_entry_is_noop() {
        let node = trigger();
        let mut run = Run::start(WorkflowId::new(), "booking.created", json!({}), &node, false);
        run.succeed();

        let before = run.execution_path.clone();
        run.finish_step(TraceStatus::Failed, None, None);
        assert_eq!(run.execution_path, before);
    }

    #[test]
    fn status_str_roundtrip() {
        for status in [
            RunStatus::Running,
            RunStatus::Waiting,
            RunStatus::Succeeded,
            RunStatus::Failed,
            RunStatus::Cancelled,
        ] {
            let parsed: RunStatus = status.as_str().parse().expect("parse");
            assert_eq!(parsed, status);
        }
        assert!("paused".parse::<RunStatus>().is_err());
    }
}
