//! Error types for the engine crate.
//!
//! Layering:
//! - `GraphError`: structural problems with a workflow graph
//! - `EngineError`: dispatch and step execution failures, wrapping
//!   store, queue, and action errors from their own modules

use crate::action::ActionDispatchError;
use crate::edge::EdgeLabel;
use crate::node::NodeId;
use crate::queue::QueueError;
use crate::run::RunStatus;
use crate::store::StoreError;
use darkroom_core::{RunId, WorkflowId};
use std::fmt;

/// Errors from graph construction and validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    /// Node with the given ID was not found in the graph.
    NodeNotFound { node_id: NodeId },
    /// A node already has an outgoing edge with this label.
    DuplicateEdgeLabel { node_id: NodeId, label: EdgeLabel },
    /// The graph has no trigger node.
    MissingTriggerNode,
    /// The graph has more than one trigger node.
    MultipleTriggerNodes,
    /// The trigger node has an incoming edge.
    TriggerHasIncomingEdge { node_id: NodeId },
    /// A `true`/`false` edge leaves a node that is not a condition.
    BranchLabelOnNonCondition { node_id: NodeId, label: EdgeLabel },
    /// Graph contains cycles.
    CycleDetected,
}

impl fmt::Display for GraphError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NodeNotFound { node_id } => {
                write!(f, "node not found: {node_id}")
            }
            Self::DuplicateEdgeLabel { node_id, label } => {
                write!(f, "node {node_id} already has an outgoing '{label}' edge")
            }
            Self::MissingTriggerNode => write!(f, "graph has no trigger node"),
            Self::MultipleTriggerNodes => write!(f, "graph has more than one trigger node"),
            Self::TriggerHasIncomingEdge { node_id } => {
                write!(f, "trigger node {node_id} has an incoming edge")
            }
            Self::BranchLabelOnNonCondition { node_id, label } => {
                write!(f, "'{label}' edge leaves non-condition node {node_id}")
            }
            Self::CycleDetected => write!(f, "graph contains cycles"),
        }
    }
}

impl std::error::Error for GraphError {}

/// Errors from trigger dispatch and step execution.
#[derive(Debug)]
pub enum EngineError {
    /// The run named by an invocation does not exist.
    RunNotFound { run_id: RunId },
    /// The run's definition no longer exists.
    DefinitionNotFound { workflow_id: WorkflowId },
    /// The invoked node is not in the definition's graph.
    NodeNotFound { run_id: RunId, node_id: NodeId },
    /// The invoked node has a type this engine version cannot execute.
    UnsupportedNode { run_id: RunId, node_id: NodeId },
    /// The invocation names a node the run has moved past.
    StaleInvocation { run_id: RunId, node_id: NodeId },
    /// The run is already terminal.
    RunNotResumable { run_id: RunId, status: RunStatus },
    /// An action dispatch failed; the run has been marked failed.
    ActionFailed {
        node_id: NodeId,
        source: ActionDispatchError,
    },
    /// A store operation failed.
    Store(StoreError),
    /// A queue operation failed.
    Queue(QueueError),
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RunNotFound { run_id } => {
                write!(f, "run not found: {run_id}")
            }
            Self::DefinitionNotFound { workflow_id } => {
                write!(f, "workflow definition not found: {workflow_id}")
            }
            Self::NodeNotFound { run_id, node_id } => {
                write!(f, "node {node_id} not found in graph for run {run_id}")
            }
            Self::UnsupportedNode { run_id, node_id } => {
                write!(f, "node {node_id} has an unsupported node type for run {run_id}")
            }
            Self::StaleInvocation { run_id, node_id } => {
                write!(f, "stale invocation of node {node_id} for run {run_id}")
            }
            Self::RunNotResumable { run_id, status } => {
                write!(f, "run {run_id} is {status} and cannot be resumed")
            }
            Self::ActionFailed { node_id, source } => {
                write!(f, "action at node {node_id} failed: {source}")
            }
            Self::Store(source) => write!(f, "store error: {source}"),
            Self::Queue(source) => write!(f, "queue error: {source}"),
        }
    }
}

impl std::error::Error for EngineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::ActionFailed { source, .. } => Some(source),
            Self::Store(source) => Some(source),
            Self::Queue(source) => Some(source),
            _ => None,
        }
    }
}

impl From<StoreError> for EngineError {
    fn from(source: StoreError) -> Self {
        Self::Store(source)
    }
}

impl From<QueueError> for EngineError {
    fn from(source: QueueError) -> Self {
        Self::Queue(source)
    }
}
