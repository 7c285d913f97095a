//! Workflow definitions.
//!
//! A definition is the stored, user-authored description of an
//! automation: the event that starts it, the node graph to walk, and an
//! activation flag. Definitions are versionless; a run snapshots
//! nothing and always executes against the definition as currently
//! stored.

use crate::error::GraphError;
use crate::graph::WorkflowGraph;
use chrono::{DateTime, Utc};
use darkroom_core::WorkflowId;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// A stored workflow definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowDefinition {
    pub id: WorkflowId,
    pub name: String,
    /// The domain event that starts this workflow, e.g. `booking.created`.
    pub trigger_event: String,
    /// Inactive definitions never create runs.
    pub is_active: bool,
    /// Builder-level metadata the engine carries but does not interpret.
    #[serde(default)]
    pub conditions: JsonValue,
    pub graph: WorkflowGraph,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WorkflowDefinition {
    /// Creates a new inactive definition.
    #[must_use]
    pub fn new(name: impl Into<String>, trigger_event: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: WorkflowId::new(),
            name: name.into(),
            trigger_event: trigger_event.into(),
            is_active: false,
            conditions: JsonValue::Null,
            graph: WorkflowGraph::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Validates the definition's graph.
    ///
    /// # Errors
    ///
    /// Returns the first structural problem found.
    pub fn validate(&self) -> Result<(), GraphError> {
        self.graph.validate()
    }

    /// Marks the definition active. Fails if the graph is invalid, so
    /// an unactivatable workflow can never match events.
    ///
    /// # Errors
    ///
    /// Returns the graph validation failure.
    pub fn activate(&mut self) -> Result<(), GraphError> {
        self.validate()?;
        self.is_active = true;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Marks the definition inactive.
    pub fn deactivate(&mut self) {
        self.is_active = false;
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::edge::Edge;
    use crate::node::{Node, NodeConfig};

    #[test]
    fn activate_validates_graph() {
        let mut definition = WorkflowDefinition::new("Welcome email", "booking.created");
        assert!(definition.activate().is_err());
        assert!(!definition.is_active);

        let trigger_id = definition.graph.add_node(Node::new("Trigger", NodeConfig::Trigger));
        let end_id = definition.graph.add_node(Node::new("End", NodeConfig::End));
        definition
            .graph
            .add_edge(trigger_id, end_id, Edge::default_label())
            .expect("edge");

        assert!(definition.activate().is_ok());
        assert!(definition.is_active);

        definition.deactivate();
        assert!(!definition.is_active);
    }

    #[test]
    fn definition_serde_roundtrip_preserves_graph() {
        let mut definition = WorkflowDefinition::new("Welcome email", "booking.created");
        let trigger_id = definition.graph.add_node(Node::new("Trigger", NodeConfig::Trigger));
        let end_id = definition.graph.add_node(Node::new("End", NodeConfig::End));
        definition
            .graph
            .add_edge(trigger_id, end_id, Edge::default_label())
            .expect("edge");

        let json = serde_json::to_string(&definition).expect("serialize");
        let mut parsed: WorkflowDefinition = serde_json::from_str(&json).expect("deserialize");
        parsed.graph.rebuild_index_map();

        assert_eq!(parsed.id, definition.id);
        assert_eq!(parsed.trigger_event, "booking.created");
        assert_eq!(parsed.graph.trigger_node().map(|n| n.id), Some(trigger_id));
    }
}
