//! The step queue.
//!
//! Each graph hop travels through the queue as a `StepInvocation`, so a
//! crash between steps loses at most one in-flight message rather than
//! a whole run. Implementations: [`crate::nats::NatsStepQueue`] for
//! production, [`crate::memory::InMemoryStepQueue`] for tests.

use crate::envelope::Envelope;
use crate::node::NodeId;
use async_trait::async_trait;
use darkroom_core::RunId;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;

/// A request to execute one node of one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepInvocation {
    pub run_id: RunId,
    /// Must match the run's current node or the invocation is stale.
    pub node_id: NodeId,
    /// The run's trigger payload.
    pub payload: JsonValue,
    /// Carried so dry runs survive requeueing without a run lookup.
    #[serde(default)]
    pub dry_run: bool,
}

/// Errors from queue operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueueError {
    /// Failed to connect to the queue backend.
    ConnectionFailed { message: String },
    /// Failed to publish an invocation.
    PublishFailed { message: String },
}

impl fmt::Display for QueueError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConnectionFailed { message } => {
                write!(f, "queue connection failed: {message}")
            }
            Self::PublishFailed { message } => {
                write!(f, "failed to publish invocation: {message}")
            }
        }
    }
}

impl std::error::Error for QueueError {}

/// Transport for step invocations.
#[async_trait]
pub trait StepQueue: Send + Sync {
    /// Publishes an invocation for eventual execution.
    async fn publish(&self, invocation: Envelope<StepInvocation>) -> Result<(), QueueError>;
}
