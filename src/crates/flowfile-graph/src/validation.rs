//! Schema propagation and the flow-wide validation report (spec §4.1).
//!
//! Grounded on `langgraph-core::graph::Graph::validate`'s structural check,
//! generalized from "do all edges point at real nodes" to a full per-node
//! schema derivation pass that a Pregel-style graph (whose nodes carry no
//! data schema of their own) never needed.

use flowfile_registry::NodeRegistry;
use flowfile_types::{Flow, FlowfileError, Node, NodeId, Schema, SchemaState, ValidationState};
use std::collections::{HashSet, VecDeque};

/// Walks the downstream transitive closure of `start` (inclusive) in
/// topological order, recomputing `ValidationState`/`SchemaState` for each
/// visited node. Nodes outside the closure keep whatever state they already
/// had cached.
pub fn propagate(
    flow: &mut Flow,
    start: NodeId,
    registry: &NodeRegistry,
) -> Result<(), FlowfileError> {
    if !flow.nodes.contains_key(&start) {
        return Err(FlowfileError::validation(format!("node {start} does not exist")));
    }
    let closure = downstream_closure(flow, start);
    for node_id in topological_order(flow, &closure) {
        revalidate_node(flow, node_id, registry);
    }
    Ok(())
}

fn downstream_closure(flow: &Flow, start: NodeId) -> HashSet<NodeId> {
    let mut seen = HashSet::new();
    let mut queue = VecDeque::new();
    queue.push_back(start);
    seen.insert(start);
    while let Some(node) = queue.pop_front() {
        for edge in flow.outbound_edges(node) {
            if seen.insert(edge.to_node) {
                queue.push_back(edge.to_node);
            }
        }
    }
    seen
}

/// Kahn's algorithm restricted to the induced subgraph on `closure`, using
/// only edges whose endpoints are both in the closure.
fn topological_order(flow: &Flow, closure: &HashSet<NodeId>) -> Vec<NodeId> {
    let mut in_degree: std::collections::HashMap<NodeId, usize> =
        closure.iter().map(|&id| (id, 0)).collect();
    for &node in closure {
        for edge in flow.inbound_edges(node) {
            if closure.contains(&edge.from_node) {
                *in_degree.get_mut(&node).unwrap() += 1;
            }
        }
    }
    let mut ready: VecDeque<NodeId> = in_degree
        .iter()
        .filter(|&(_, &deg)| deg == 0)
        .map(|(&id, _)| id)
        .collect();
    let mut order = Vec::with_capacity(closure.len());
    while let Some(node) = ready.pop_front() {
        order.push(node);
        for edge in flow.outbound_edges(node) {
            if let Some(deg) = in_degree.get_mut(&edge.to_node) {
                *deg -= 1;
                if *deg == 0 {
                    ready.push_back(edge.to_node);
                }
            }
        }
    }
    order
}

fn output_schema_at(node: &Node, port_index: u32) -> Result<Schema, (NodeId, String)> {
    match &node.schema {
        Some(SchemaState::Resolved(schemas)) => schemas
            .get(port_index as usize)
            .cloned()
            .ok_or_else(|| (node.id, format!("node {} has no output port {port_index}", node.id))),
        Some(SchemaState::UnknownUpstream { node: ancestor, message }) => {
            Err((*ancestor, message.clone()))
        }
        Some(SchemaState::Unknown) | None => {
            Err((node.id, "upstream has not been validated yet".to_string()))
        }
    }
}

fn revalidate_node(flow: &mut Flow, node_id: NodeId, registry: &NodeRegistry) {
    let inbound = flow.inbound_edges(node_id).into_iter().cloned().collect::<Vec<_>>();
    let mut input_schemas = Vec::with_capacity(inbound.len());
    let mut upstream_failure = None;
    for edge in &inbound {
        let port_index = match edge.from_port {
            flowfile_types::Port::Output(n) => n,
            flowfile_types::Port::Input(n) => n,
        };
        let Some(upstream) = flow.nodes.get(&edge.from_node) else {
            upstream_failure = Some((edge.from_node, "referenced node no longer exists".to_string()));
            break;
        };
        match output_schema_at(upstream, port_index) {
            Ok(schema) => input_schemas.push(schema),
            Err(failure) => {
                upstream_failure = Some(failure);
                break;
            }
        }
    }

    let node = flow.nodes.get_mut(&node_id).expect("node exists in closure");

    if let Some((ancestor, message)) = upstream_failure {
        node.validation = Some(ValidationState::UnknownUpstream {
            node: ancestor,
            message: message.clone(),
        });
        node.schema = Some(SchemaState::UnknownUpstream {
            node: ancestor,
            message,
        });
        return;
    }

    let descriptor = match registry.get(&node.kind) {
        Ok(d) => d.clone(),
        Err(e) => {
            node.validation = Some(ValidationState::Invalid { message: e.to_string() });
            node.schema = Some(SchemaState::Unknown);
            return;
        }
    };

    match descriptor.validate(&node.settings, &input_schemas) {
        Ok(outputs) => {
            node.validation = Some(ValidationState::Valid);
            node.schema = Some(SchemaState::Resolved(outputs));
        }
        Err(e) => {
            node.validation = Some(ValidationState::Invalid { message: e.to_string() });
            node.schema = Some(SchemaState::Unknown);
        }
    }
}

/// One node's outcome in a full-flow validation pass.
#[derive(Debug, Clone, serde::Serialize)]
pub struct NodeValidation {
    pub node_id: NodeId,
    pub kind: String,
    pub state: ValidationState,
}

/// The flow-wide validation report served by `GET /flow/validate`
/// (supplemented feature #2).
#[derive(Debug, Clone, serde::Serialize)]
pub struct ValidationReport {
    pub nodes: Vec<NodeValidation>,
}

impl ValidationReport {
    pub fn from_flow(flow: &Flow) -> Self {
        let nodes = flow
            .nodes_sorted()
            .into_iter()
            .map(|n| NodeValidation {
                node_id: n.id,
                kind: n.kind.as_str().to_string(),
                state: n
                    .validation
                    .clone()
                    .unwrap_or(ValidationState::Unvalidated),
            })
            .collect();
        Self { nodes }
    }

    pub fn is_all_valid(&self) -> bool {
        self.nodes.iter().all(|n| n.state.is_valid())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowfile_types::{Edge, FlowId, Port, Position};

    fn registry() -> NodeRegistry {
        NodeRegistry::built_in()
    }

    #[test]
    fn propagate_marks_valid_single_source_node() {
        let mut flow = Flow::new(FlowId(1), "t");
        let id = NodeId(1);
        let mut node = Node::new(id, "manual_input", Position { x: 0.0, y: 0.0 });
        node.settings = flowfile_types::SettingsValue::new(serde_json::json!({"rows": []}));
        flow.nodes.insert(id, node);
        propagate(&mut flow, id, &registry()).unwrap();
        assert!(flow.nodes[&id].validation.as_ref().unwrap().is_valid());
    }

    #[test]
    fn propagate_marks_downstream_unknown_on_ancestor_error() {
        let mut flow = Flow::new(FlowId(1), "t");
        let source_id = NodeId(1);
        let mut source = Node::new(source_id, "manual_input", Position { x: 0.0, y: 0.0 });
        source.settings = flowfile_types::SettingsValue::new(serde_json::json!({"rows": []}));
        flow.nodes.insert(source_id, source);

        let select_id = NodeId(2);
        let mut select = Node::new(select_id, "select", Position { x: 1.0, y: 0.0 });
        select.settings = flowfile_types::SettingsValue::new(serde_json::json!({
            "columns": [{"source": "missing", "keep": true}]
        }));
        flow.nodes.insert(select_id, select);
        flow.edges.push(Edge::new(
            source_id,
            Port::Output(0),
            select_id,
            Port::Input(0),
        ));

        let head_id = NodeId(3);
        let head = Node::new(head_id, "head", Position { x: 2.0, y: 0.0 });
        flow.nodes.insert(head_id, head);
        flow.edges.push(Edge::new(select_id, Port::Output(0), head_id, Port::Input(0)));

        propagate(&mut flow, source_id, &registry()).unwrap();

        assert!(!flow.nodes[&select_id].validation.as_ref().unwrap().is_valid());
        assert!(matches!(
            flow.nodes[&head_id].validation.as_ref().unwrap(),
            ValidationState::UnknownUpstream { .. }
        ));
    }

    #[test]
    fn validation_report_lists_every_node() {
        let mut flow = Flow::new(FlowId(1), "t");
        flow.nodes.insert(
            NodeId(1),
            Node::new(NodeId(1), "manual_input", Position { x: 0.0, y: 0.0 }),
        );
        let report = ValidationReport::from_flow(&flow);
        assert_eq!(report.nodes.len(), 1);
    }
}
