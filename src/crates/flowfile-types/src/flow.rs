//! The flow document: a flow's nodes, edges and metadata (spec §3, §6).

use crate::ids::{FlowId, NodeId};
use crate::node::{Edge, Node};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::PathBuf;

/// `Development` samples a narrow row cap from each source and runs the
/// whole pipeline eagerly to populate previews; `Performance` runs against
/// full inputs without preview capture (spec §4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecutionMode {
    Development,
    Performance,
}

impl Default for ExecutionMode {
    fn default() -> Self {
        ExecutionMode::Development
    }
}

/// A user-authored DAG of nodes and edges, plus presentational metadata.
///
/// `nodes` is an `IndexMap` rather than a `HashMap` so that serialization
/// order (spec §4.1: "deterministic ordering of nodes by id") can be
/// produced by a sort-then-rebuild without relying on hash-map iteration
/// order, while still giving O(1) lookup during normal operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Flow {
    pub flow_id: FlowId,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub path: Option<PathBuf>,
    #[serde(default)]
    pub execution_mode: ExecutionMode,
    pub nodes: IndexMap<NodeId, Node>,
    pub edges: Vec<Edge>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub extra: Map<String, Value>,
}

impl Flow {
    pub fn new(flow_id: FlowId, name: impl Into<String>) -> Self {
        Self {
            flow_id,
            name: name.into(),
            path: None,
            execution_mode: ExecutionMode::Development,
            nodes: IndexMap::new(),
            edges: Vec::new(),
            extra: Map::new(),
        }
    }

    /// Nodes in ascending id order, as required for deterministic
    /// serialization.
    pub fn nodes_sorted(&self) -> Vec<&Node> {
        let mut nodes: Vec<&Node> = self.nodes.values().collect();
        nodes.sort_by_key(|n| n.id.0);
        nodes
    }

    /// Edges in the document's canonical lexicographic order.
    pub fn edges_sorted(&self) -> Vec<&Edge> {
        let mut edges: Vec<&Edge> = self.edges.iter().collect();
        edges.sort_by_key(|e| e.sort_key());
        edges
    }

    /// Direct upstream edges feeding a node's input ports, in port order.
    pub fn inbound_edges(&self, node: NodeId) -> Vec<&Edge> {
        let mut edges: Vec<&Edge> = self.edges.iter().filter(|e| e.to_node == node).collect();
        edges.sort_by_key(|e| match e.to_port {
            crate::node::Port::Input(n) => n,
            crate::node::Port::Output(n) => n,
        });
        edges
    }

    /// Direct downstream edges sourced from a node's output ports.
    pub fn outbound_edges(&self, node: NodeId) -> Vec<&Edge> {
        self.edges.iter().filter(|e| e.from_node == node).collect()
    }

    /// Nodes with no inbound edges — the sources of the DAG (or of one of
    /// its weakly-connected components).
    pub fn source_nodes(&self) -> Vec<NodeId> {
        self.nodes
            .keys()
            .copied()
            .filter(|id| self.inbound_edges(*id).is_empty())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{Port, Position};

    #[test]
    fn nodes_sorted_is_ascending_by_id() {
        let mut flow = Flow::new(FlowId(1), "t");
        flow.nodes.insert(
            NodeId(3),
            Node::new(NodeId(3), "filter", Position { x: 0.0, y: 0.0 }),
        );
        flow.nodes.insert(
            NodeId(1),
            Node::new(NodeId(1), "read_csv", Position { x: 0.0, y: 0.0 }),
        );
        let sorted = flow.nodes_sorted();
        assert_eq!(sorted[0].id, NodeId(1));
        assert_eq!(sorted[1].id, NodeId(3));
    }

    #[test]
    fn source_nodes_have_no_inbound_edges() {
        let mut flow = Flow::new(FlowId(1), "t");
        for id in [1u64, 2] {
            flow.nodes.insert(
                NodeId(id),
                Node::new(NodeId(id), "read_csv", Position { x: 0.0, y: 0.0 }),
            );
        }
        flow.nodes.insert(
            NodeId(3),
            Node::new(NodeId(3), "union", Position { x: 0.0, y: 0.0 }),
        );
        flow.edges.push(Edge::new(
            NodeId(1),
            Port::Output(0),
            NodeId(3),
            Port::Input(0),
        ));
        flow.edges.push(Edge::new(
            NodeId(2),
            Port::Output(0),
            NodeId(3),
            Port::Input(1),
        ));
        let mut sources = flow.source_nodes();
        sources.sort();
        assert_eq!(sources, vec![NodeId(1), NodeId(2)]);
    }
}
