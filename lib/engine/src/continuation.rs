//! Scheduled continuations for delayed runs.
//!
//! When a run hits a delay node it suspends, and a continuation row
//! records where and when to pick it back up. Continuations are the
//! only durable timer state; nothing sleeps in memory.

use crate::node::NodeId;
use chrono::{DateTime, Utc};
use darkroom_core::{ContinuationId, RunId};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// The lifecycle status of a continuation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContinuationStatus {
    /// Waiting for its scheduled time.
    Pending,
    /// Re-enqueued as a step invocation.
    Executed,
    /// Cancelled together with its run.
    Cancelled,
}

impl ContinuationStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Executed => "executed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for ContinuationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ContinuationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "executed" => Ok(Self::Executed),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(format!("unknown continuation status: {other}")),
        }
    }
}

/// A durable record of a suspended run's resume point.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduledContinuation {
    pub id: ContinuationId,
    pub run_id: RunId,
    /// The delay node the run is suspended at. Resuming re-invokes this
    /// node, which then completes and moves on.
    pub node_id: NodeId,
    /// The run's trigger payload, carried so resumption needs no run
    /// lookup before enqueueing.
    pub payload: JsonValue,
    pub scheduled_for: DateTime<Utc>,
    pub status: ContinuationStatus,
    pub created_at: DateTime<Utc>,
}

impl ScheduledContinuation {
    /// Creates a pending continuation for a suspended run.
    #[must_use]
    pub fn schedule(
        run_id: RunId,
        node_id: NodeId,
        payload: JsonValue,
        scheduled_for: DateTime<Utc>,
    ) -> Self {
        Self {
            id: ContinuationId::new(),
            run_id,
            node_id,
            payload,
            scheduled_for,
            status: ContinuationStatus::Pending,
            created_at: Utc::now(),
        }
    }

    /// True when the continuation should fire at or before `now`.
    #[must_use]
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.status == ContinuationStatus::Pending && self.scheduled_for <= now
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use serde_json::json;

    #[test]
    fn schedule_creates_pending_continuation() {
        let resume_at = Utc::now() + Duration::hours(24);
        let continuation = ScheduledContinuation::schedule(
            RunId::new(),
            NodeId::new(),
            json!({"email": "client@example.com"}),
            resume_at,
        );

        assert_eq!(continuation.status, ContinuationStatus::Pending);
        assert_eq!(continuation.scheduled_for, resume_at);
    }

    #[test]
    fn due_only_when_pending_and_elapsed() {
        let now = Utc::now();
        let mut continuation = ScheduledContinuation::schedule(
            RunId::new(),
            NodeId::new(),
            json!({}),
            now - Duration::minutes(1),
        );
        assert!(continuation.is_due(now));

        continuation.scheduled_for = now + Duration::minutes(1);
        assert!(!continuation.is_due(now));

        continuation.scheduled_for = now - Duration::minutes(1);
        continuation.status = ContinuationStatus::Cancelled;
        assert!(!continuation.is_due(now));
    }

    #[test]
    fn status_str_roundtrip() {
        for status in [
            ContinuationStatus::Pending,
            ContinuationStatus::Executed,
            ContinuationStatus::Cancelled,
        ] {
            let parsed: ContinuationStatus = status.as_str().parse().expect("parse");
            assert_eq!(parsed, status);
        }
    }
}
