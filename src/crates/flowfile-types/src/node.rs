//! Node and edge shapes (spec §3).

use crate::schema::Schema;
use crate::settings::{NodeKind, SettingsValue};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::ids::NodeId;

/// Presentational position. Preserved on round-trip, never interpreted by
/// the execution core.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

/// Which logical input a two-input node's edge targets. Single-input and
/// multi-input (`union`) kinds only ever see `Main`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PortRole {
    Main,
    Right,
}

/// A directed port reference: `input-N` or `output-N` per spec §3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "direction", content = "index")]
pub enum Port {
    Input(u32),
    Output(u32),
}

impl Port {
    /// The `PortRole` of an input port, by convention `input-0` is `Main`
    /// and `input-1` is `Right` (join/cross_join/union's second input).
    pub fn role(&self) -> Option<PortRole> {
        match self {
            Port::Input(0) => Some(PortRole::Main),
            Port::Input(_) => Some(PortRole::Right),
            Port::Output(_) => None,
        }
    }

    pub fn label(&self) -> String {
        match self {
            Port::Input(n) => format!("input-{n}"),
            Port::Output(n) => format!("output-{n}"),
        }
    }
}

/// Per-node validation outcome, recomputed by `flowfile-graph` on every
/// mutation (spec §4.1).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ValidationState {
    /// Not yet validated (freshly created, `is_setup == false`).
    Unvalidated,
    Valid,
    Invalid { message: String },
    /// Unknown because an upstream ancestor is itself invalid or unknown.
    UnknownUpstream { node: NodeId, message: String },
}

impl ValidationState {
    pub fn is_valid(&self) -> bool {
        matches!(self, ValidationState::Valid)
    }
}

/// Per-output-port schema state, mirroring `ValidationState`'s shape since
/// a node only has a schema once it validates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SchemaState {
    Unknown,
    Resolved(Vec<Schema>),
    UnknownUpstream { node: NodeId, message: String },
}

/// A node in a flow graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub kind: NodeKind,
    pub settings: SettingsValue,
    pub position: Position,
    #[serde(default)]
    pub is_setup: bool,
    #[serde(default)]
    pub cache_results: bool,
    #[serde(default)]
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub validation: Option<ValidationState>,
    #[serde(skip, default)]
    pub schema: Option<SchemaState>,
    /// Fields present in a deserialized document that this version of the
    /// schema does not recognize; preserved verbatim on re-serialization.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub extra: Map<String, Value>,
}

impl Node {
    pub fn new(id: NodeId, kind: impl Into<NodeKind>, position: Position) -> Self {
        Self {
            id,
            kind: kind.into(),
            settings: SettingsValue::empty(),
            position,
            is_setup: false,
            cache_results: false,
            description: String::new(),
            validation: None,
            schema: None,
            extra: Map::new(),
        }
    }
}

/// A directed edge between two nodes' ports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub from_node: NodeId,
    pub from_port: Port,
    pub to_node: NodeId,
    pub to_port: Port,
}

impl Edge {
    pub fn new(from_node: NodeId, from_port: Port, to_node: NodeId, to_port: Port) -> Self {
        Self {
            from_node,
            from_port,
            to_node,
            to_port,
        }
    }

    /// Lexicographic ordering key used when serializing a flow document
    /// (spec §4.1: "edges lexicographically").
    pub fn sort_key(&self) -> (u64, u32, u64, u32) {
        let from_port = match self.from_port {
            Port::Output(n) | Port::Input(n) => n,
        };
        let to_port = match self.to_port {
            Port::Output(n) | Port::Input(n) => n,
        };
        (self.from_node.0, from_port, self.to_node.0, to_port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn input_zero_is_main_role() {
        assert_eq!(Port::Input(0).role(), Some(PortRole::Main));
        assert_eq!(Port::Input(1).role(), Some(PortRole::Right));
        assert_eq!(Port::Output(0).role(), None);
    }

    #[test]
    fn port_label_matches_spec_format() {
        assert_eq!(Port::Input(3).label(), "input-3");
        assert_eq!(Port::Output(0).label(), "output-0");
    }

    #[test]
    fn edge_sort_key_orders_lexicographically() {
        let a = Edge::new(NodeId(1), Port::Output(0), NodeId(2), Port::Input(0));
        let b = Edge::new(NodeId(1), Port::Output(0), NodeId(3), Port::Input(0));
        assert!(a.sort_key() < b.sort_key());
    }
}
