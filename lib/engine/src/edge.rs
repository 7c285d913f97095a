//! Workflow edges.
//!
//! Edges connect nodes and carry a label that the executor matches when
//! choosing the next node. Most nodes follow their `default` edge;
//! condition nodes follow `true` or `false` depending on the evaluation
//! result.

use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// A unique identifier for an edge within a workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EdgeId(Ulid);

impl EdgeId {
    /// Creates a new random edge ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for EdgeId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for EdgeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "edge_{}", self.0)
    }
}

/// The label on an edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum EdgeLabel {
    /// Followed by every node kind except conditions.
    #[default]
    Default,
    /// Followed when a condition evaluates to true.
    True,
    /// Followed when a condition evaluates to false.
    False,
}

impl EdgeLabel {
    /// Returns the branch label for a condition result.
    #[must_use]
    pub const fn for_result(result: bool) -> Self {
        if result { Self::True } else { Self::False }
    }

    /// Returns true for the condition branch labels.
    #[must_use]
    pub const fn is_branch(self) -> bool {
        matches!(self, Self::True | Self::False)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::True => "true",
            Self::False => "false",
        }
    }
}

impl std::fmt::Display for EdgeLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A labeled connection between two nodes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub id: EdgeId,
    pub label: EdgeLabel,
}

impl Edge {
    /// Creates a new edge with a fresh ID.
    #[must_use]
    pub fn new(label: EdgeLabel) -> Self {
        Self {
            id: EdgeId::new(),
            label,
        }
    }

    /// Creates a new `default`-labeled edge.
    #[must_use]
    pub fn default_label() -> Self {
        Self::new(EdgeLabel::Default)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn label_for_result() {
        assert_eq!(EdgeLabel::for_result(true), EdgeLabel::True);
        assert_eq!(EdgeLabel::for_result(false), EdgeLabel::False);
    }

    #[test]
    fn label_serde_is_snake_case() {
        let json = serde_json::to_value(EdgeLabel::Default).expect("serialize");
        assert_eq!(json, serde_json::json!("default"));
        let parsed: EdgeLabel = serde_json::from_value(serde_json::json!("true")).expect("parse");
        assert_eq!(parsed, EdgeLabel::True);
    }
}
