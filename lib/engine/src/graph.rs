//! Workflow graph implementation using petgraph.
//!
//! Workflows are directed graphs where nodes are workflow steps and
//! edges carry branch labels. The graph structure is stored as JSONB in
//! the database for flexible schema evolution.

use crate::edge::{Edge, EdgeLabel};
use crate::error::GraphError;
use crate::node::{Node, NodeId, NodeKind};
use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A workflow graph using petgraph's directed graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowGraph {
    /// The underlying directed graph.
    #[serde(with = "graph_serde")]
    graph: DiGraph<Node, Edge>,
    /// Map from NodeId to petgraph's NodeIndex for O(1) lookup.
    #[serde(skip)]
    node_index_map: HashMap<NodeId, NodeIndex>,
}

impl WorkflowGraph {
    /// Creates a new empty workflow graph.
    #[must_use]
    pub fn new() -> Self {
        Self {
            graph: DiGraph::new(),
            node_index_map: HashMap::new(),
        }
    }

    /// Adds a node to the graph.
    ///
    /// Returns the node ID.
    pub fn add_node(&mut self, node: Node) -> NodeId {
        let node_id = node.id;
        let index = self.graph.add_node(node);
        self.node_index_map.insert(node_id, index);
        node_id
    }

    /// Removes a node from the graph.
    ///
    /// Also removes all edges connected to this node.
    pub fn remove_node(&mut self, node_id: NodeId) -> Option<Node> {
        let index = self.node_index_map.remove(&node_id)?;
        let removed = self.graph.remove_node(index);
        // remove_node swaps in the last node index, invalidating the map.
        self.rebuild_index_map();
        removed
    }

    /// Returns a reference to a node by its ID.
    #[must_use]
    pub fn get_node(&self, node_id: NodeId) -> Option<&Node> {
        let index = self.node_index_map.get(&node_id)?;
        self.graph.node_weight(*index)
    }

    /// Adds a labeled edge between two nodes.
    ///
    /// # Errors
    ///
    /// Returns an error if either node doesn't exist or the source
    /// already has an outgoing edge with the same label.
    pub fn add_edge(
        &mut self,
        source_id: NodeId,
        target_id: NodeId,
        edge: Edge,
    ) -> Result<(), GraphError> {
        let source_index = *self
            .node_index_map
            .get(&source_id)
            .ok_or(GraphError::NodeNotFound { node_id: source_id })?;

        let target_index = *self
            .node_index_map
            .get(&target_id)
            .ok_or(GraphError::NodeNotFound { node_id: target_id })?;

        let duplicate = self
            .graph
            .edges_directed(source_index, Direction::Outgoing)
            .any(|existing| existing.weight().label == edge.label);
        if duplicate {
            return Err(GraphError::DuplicateEdgeLabel {
                node_id: source_id,
                label: edge.label,
            });
        }

        self.graph.add_edge(source_index, target_index, edge);
        Ok(())
    }

    /// Returns all nodes in the graph.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.graph.node_weights()
    }

    /// Returns the number of nodes in the graph.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Returns the number of edges in the graph.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Returns the workflow's trigger node, if the graph has exactly one.
    #[must_use]
    pub fn trigger_node(&self) -> Option<&Node> {
        let mut triggers = self.nodes().filter(|node| node.kind() == NodeKind::Trigger);
        let first = triggers.next()?;
        if triggers.next().is_some() {
            return None;
        }
        Some(first)
    }

    /// Returns the successors (downstream nodes) of a given node,
    /// in edge insertion order.
    pub fn successors(&self, node_id: NodeId) -> Vec<(&Node, &Edge)> {
        let Some(&index) = self.node_index_map.get(&node_id) else {
            return Vec::new();
        };

        let mut edges: Vec<_> = self
            .graph
            .edges_directed(index, Direction::Outgoing)
            .collect();
        // edges_directed iterates most-recent first; restore insertion order.
        edges.sort_by_key(|edge| edge.id());

        edges
            .into_iter()
            .filter_map(|edge| {
                let target = self.graph.node_weight(edge.target())?;
                Some((target, edge.weight()))
            })
            .collect()
    }

    /// Follows the first outgoing edge with the given label.
    ///
    /// Returns `None` when no edge matches, which ends the run.
    #[must_use]
    pub fn follow(&self, node_id: NodeId, label: EdgeLabel) -> Option<&Node> {
        self.successors(node_id)
            .into_iter()
            .find(|(_, edge)| edge.label == label)
            .map(|(node, _)| node)
    }

    /// Validates the workflow graph.
    ///
    /// Checks:
    /// - Exactly one trigger node, with no incoming edges
    /// - No cycles
    /// - No duplicate outgoing edge labels on any node
    /// - `true`/`false` labels only leave condition nodes
    ///
    /// # Errors
    ///
    /// Returns an error describing the validation failure.
    pub fn validate(&self) -> Result<(), GraphError> {
        let trigger_count = self
            .nodes()
            .filter(|node| node.kind() == NodeKind::Trigger)
            .count();
        match trigger_count {
            0 => return Err(GraphError::MissingTriggerNode),
            1 => {}
            _ => return Err(GraphError::MultipleTriggerNodes),
        }

        for node in self.nodes() {
            let index = self.node_index_map[&node.id];

            if node.kind() == NodeKind::Trigger
                && self
                    .graph
                    .edges_directed(index, Direction::Incoming)
                    .next()
                    .is_some()
            {
                return Err(GraphError::TriggerHasIncomingEdge { node_id: node.id });
            }

            let mut seen = Vec::new();
            for edge in self.graph.edges_directed(index, Direction::Outgoing) {
                let label = edge.weight().label;
                if seen.contains(&label) {
                    return Err(GraphError::DuplicateEdgeLabel {
                        node_id: node.id,
                        label,
                    });
                }
                seen.push(label);

                if label.is_branch() && node.kind() != NodeKind::Condition {
                    return Err(GraphError::BranchLabelOnNonCondition {
                        node_id: node.id,
                        label,
                    });
                }
            }
        }

        if petgraph::algo::is_cyclic_directed(&self.graph) {
            return Err(GraphError::CycleDetected);
        }

        Ok(())
    }

    /// Rebuilds the node index map after deserialization.
    pub fn rebuild_index_map(&mut self) {
        self.node_index_map.clear();
        for index in self.graph.node_indices() {
            if let Some(node) = self.graph.node_weight(index) {
                self.node_index_map.insert(node.id, index);
            }
        }
    }
}

impl Default for WorkflowGraph {
    fn default() -> Self {
        Self::new()
    }
}

/// Custom serde for petgraph DiGraph.
mod graph_serde {
    use super::*;
    use serde::de::{MapAccess, Visitor};
    use serde::ser::SerializeStruct;

    pub fn serialize<S>(graph: &DiGraph<Node, Edge>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let nodes: Vec<_> = graph.node_weights().cloned().collect();
        let edges: Vec<_> = graph
            .edge_references()
            .map(|e| {
                let source_id = graph.node_weight(e.source()).map(|n| n.id);
                let target_id = graph.node_weight(e.target()).map(|n| n.id);
                (source_id, target_id, e.weight().clone())
            })
            .collect();

        let mut state = serializer.serialize_struct("Graph", 2)?;
        state.serialize_field("nodes", &nodes)?;
        state.serialize_field("edges", &edges)?;
        state.end()
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DiGraph<Node, Edge>, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        type EdgeTuple = (Option<NodeId>, Option<NodeId>, Edge);

        struct GraphVisitor;

        impl<'de> Visitor<'de> for GraphVisitor {
            type Value = DiGraph<Node, Edge>;

            fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
                formatter.write_str("a workflow graph with nodes and edges")
            }

            fn visit_map<M>(self, mut map: M) -> Result<Self::Value, M::Error>
            where
                M: MapAccess<'de>,
            {
                let mut nodes: Option<Vec<Node>> = None;
                let mut edges: Option<Vec<EdgeTuple>> = None;

                while let Some(key) = map.next_key::<String>()? {
                    match key.as_str() {
                        "nodes" => nodes = Some(map.next_value()?),
                        "edges" => edges = Some(map.next_value()?),
                        _ => {
                            let _ = map.next_value::<serde::de::IgnoredAny>()?;
                        }
                    }
                }

                let nodes = nodes.unwrap_or_default();
                let edges = edges.unwrap_or_default();

                let mut graph = DiGraph::new();
                let mut id_to_index = HashMap::new();

                for node in nodes {
                    let id = node.id;
                    let index = graph.add_node(node);
                    id_to_index.insert(id, index);
                }

                for (source_id, target_id, edge) in edges {
                    let (Some(source), Some(target)) = (source_id, target_id) else {
                        continue;
                    };
                    let (Some(&source_idx), Some(&target_idx)) =
                        (id_to_index.get(&source), id_to_index.get(&target))
                    else {
                        continue;
                    };
                    graph.add_edge(source_idx, target_idx, edge);
                }

                Ok(graph)
            }
        }

        deserializer.deserialize_struct("Graph", &["nodes", "edges"], GraphVisitor)
    }
}
