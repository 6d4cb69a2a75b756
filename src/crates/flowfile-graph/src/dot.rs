//! Graphviz DOT export (supplemented feature #1), grounded on
//! `langgraph-core::visualization`'s `visualize_dot` — generalized from a
//! control-flow graph of named nodes to a dataframe DAG of typed node
//! kinds, colored by validation state instead of by subgraph membership.

use flowfile_types::{Flow, ValidationState};

fn escape_dot(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

fn fill_color(state: Option<&ValidationState>) -> &'static str {
    match state {
        Some(ValidationState::Valid) => "lightgreen",
        Some(ValidationState::Invalid { .. }) => "lightcoral",
        Some(ValidationState::UnknownUpstream { .. }) => "lightyellow",
        Some(ValidationState::Unvalidated) | None => "white",
    }
}

/// Renders a flow as a Graphviz DOT digraph: one box per node labeled with
/// its kind and id, colored by validation state, edges labeled by port.
pub fn render(flow: &Flow) -> String {
    let mut out = String::new();
    out.push_str("digraph G {\n");
    out.push_str("    rankdir=LR;\n");
    out.push_str("    node [shape=box, style=\"rounded,filled\"];\n");
    out.push_str(&format!(
        "    labelloc=\"t\";\n    label=\"{}\";\n",
        escape_dot(&flow.name)
    ));

    for node in flow.nodes_sorted() {
        let label = format!("{}\\n#{}", node.kind.as_str(), node.id);
        out.push_str(&format!(
            "    \"{}\" [label=\"{}\", fillcolor={}];\n",
            node.id,
            escape_dot(&label),
            fill_color(node.validation.as_ref())
        ));
    }

    for edge in flow.edges_sorted() {
        out.push_str(&format!(
            "    \"{}\" -> \"{}\" [label=\"{}→{}\"];\n",
            edge.from_node,
            edge.to_node,
            edge.from_port.label(),
            edge.to_port.label()
        ));
    }

    out.push_str("}\n");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowfile_types::{Edge, FlowId, Node, NodeId, Port, Position};

    #[test]
    fn render_includes_every_node_and_edge() {
        let mut flow = Flow::new(FlowId(1), "demo");
        flow.nodes.insert(
            NodeId(1),
            Node::new(NodeId(1), "manual_input", Position { x: 0.0, y: 0.0 }),
        );
        flow.nodes.insert(
            NodeId(2),
            Node::new(NodeId(2), "select", Position { x: 1.0, y: 0.0 }),
        );
        flow.edges.push(Edge::new(NodeId(1), Port::Output(0), NodeId(2), Port::Input(0)));
        let dot = render(&flow);
        assert!(dot.contains("digraph G"));
        assert!(dot.contains("manual_input"));
        assert!(dot.contains("\"1\" -> \"2\""));
    }
}
