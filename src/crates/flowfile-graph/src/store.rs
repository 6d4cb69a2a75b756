//! `GraphStore`: the process-wide table of flows, one `RwLock<Flow>` per
//! flow so concurrent mutations on different flows never contend (spec
//! §5's per-flow RW lock requirement), grounded on `langgraph-core::graph`'s
//! `Graph` (nodes/edges maps plus a validate pass) generalized from a single
//! static graph to a multi-tenant, mutable store.

use flowfile_registry::NodeRegistry;
use flowfile_types::{Edge, Flow, FlowId, FlowfileError, Node, NodeId, Port, Position, SettingsValue};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::validation::{propagate, ValidationReport};

/// One flow's mutable state plus the bookkeeping the store needs around it:
/// a monotonic node-id counter and a flag marking whether a run is
/// currently in flight (spec invariant 6: at most one active run per flow).
pub struct FlowEntry {
    flow: RwLock<Flow>,
    next_node_id: AtomicU64,
    run_active: AtomicBool,
}

impl FlowEntry {
    fn new(flow: Flow) -> Self {
        Self {
            flow: RwLock::new(flow),
            next_node_id: AtomicU64::new(1),
            run_active: AtomicBool::new(false),
        }
    }
}

pub struct GraphStore {
    flows: RwLock<HashMap<FlowId, Arc<FlowEntry>>>,
    next_flow_id: AtomicU64,
    registry: Arc<NodeRegistry>,
}

impl GraphStore {
    pub fn new(registry: Arc<NodeRegistry>) -> Self {
        Self {
            flows: RwLock::new(HashMap::new()),
            next_flow_id: AtomicU64::new(1),
            registry,
        }
    }

    pub fn registry(&self) -> &Arc<NodeRegistry> {
        &self.registry
    }

    pub async fn create_flow(&self, name: impl Into<String>) -> FlowId {
        let id = FlowId(self.next_flow_id.fetch_add(1, Ordering::SeqCst));
        let flow = Flow::new(id, name.into());
        self.flows
            .write()
            .await
            .insert(id, Arc::new(FlowEntry::new(flow)));
        id
    }

    async fn entry(&self, flow_id: FlowId) -> Result<Arc<FlowEntry>, FlowfileError> {
        self.flows
            .read()
            .await
            .get(&flow_id)
            .cloned()
            .ok_or_else(|| FlowfileError::validation(format!("flow {flow_id} does not exist")))
    }

    /// A snapshot clone of the flow, for the scheduler to run against
    /// without holding the store's lock for the run's duration.
    pub async fn get_flow(&self, flow_id: FlowId) -> Result<Flow, FlowfileError> {
        let entry = self.entry(flow_id).await?;
        let flow = entry.flow.read().await.clone();
        Ok(flow)
    }

    pub async fn delete_flow(&self, flow_id: FlowId) -> Result<(), FlowfileError> {
        self.flows
            .write()
            .await
            .remove(&flow_id)
            .map(|_| ())
            .ok_or_else(|| FlowfileError::validation(format!("flow {flow_id} does not exist")))
    }

    pub async fn is_run_active(&self, flow_id: FlowId) -> Result<bool, FlowfileError> {
        let entry = self.entry(flow_id).await?;
        Ok(entry.run_active.load(Ordering::SeqCst))
    }

    /// Atomically claim the "a run is active" flag, failing if one is
    /// already active. Mirrored by `clear_run_active` on completion.
    pub async fn try_set_run_active(&self, flow_id: FlowId) -> Result<bool, FlowfileError> {
        let entry = self.entry(flow_id).await?;
        Ok(entry
            .run_active
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok())
    }

    pub async fn clear_run_active(&self, flow_id: FlowId) -> Result<(), FlowfileError> {
        let entry = self.entry(flow_id).await?;
        entry.run_active.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn guard_not_running(&self, entry: &FlowEntry) -> Result<(), FlowfileError> {
        if entry.run_active.load(Ordering::SeqCst) {
            return Err(FlowfileError::validation(
                "flow has an active run; mutation endpoints are read-only until it completes",
            ));
        }
        Ok(())
    }

    pub async fn add_node(
        &self,
        flow_id: FlowId,
        kind: impl Into<flowfile_types::NodeKind>,
        position: Position,
    ) -> Result<NodeId, FlowfileError> {
        let entry = self.entry(flow_id).await?;
        self.guard_not_running(&entry).await?;
        let id = NodeId(entry.next_node_id.fetch_add(1, Ordering::SeqCst));
        let node = Node::new(id, kind, position);
        tracing::debug!(flow_id = %flow_id, node_id = %id, kind = %node.kind, "node added");
        entry.flow.write().await.nodes.insert(id, node);
        Ok(id)
    }

    pub async fn delete_node(&self, flow_id: FlowId, node_id: NodeId) -> Result<(), FlowfileError> {
        let entry = self.entry(flow_id).await?;
        self.guard_not_running(&entry).await?;
        let mut flow = entry.flow.write().await;
        if flow.nodes.shift_remove(&node_id).is_none() {
            return Err(FlowfileError::validation(format!("node {node_id} does not exist")));
        }
        flow.edges
            .retain(|e| e.from_node != node_id && e.to_node != node_id);
        Ok(())
    }

    pub async fn update_settings(
        &self,
        flow_id: FlowId,
        node_id: NodeId,
        settings: SettingsValue,
    ) -> Result<(), FlowfileError> {
        let entry = self.entry(flow_id).await?;
        self.guard_not_running(&entry).await?;
        let mut flow = entry.flow.write().await;
        let node = flow
            .nodes
            .get_mut(&node_id)
            .ok_or_else(|| FlowfileError::validation(format!("node {node_id} does not exist")))?;
        node.settings = settings;
        node.validation = None;
        node.schema = None;
        Ok(())
    }

    /// Adds an edge after checking it would not introduce a cycle (DFS
    /// coloring: white/gray/black), spec §3 invariant 2.
    pub async fn add_edge(&self, flow_id: FlowId, edge: Edge) -> Result<(), FlowfileError> {
        let entry = self.entry(flow_id).await?;
        self.guard_not_running(&entry).await?;
        let mut flow = entry.flow.write().await;
        if !flow.nodes.contains_key(&edge.from_node) {
            return Err(FlowfileError::validation(format!(
                "edge source node {} does not exist",
                edge.from_node
            )));
        }
        if !flow.nodes.contains_key(&edge.to_node) {
            return Err(FlowfileError::validation(format!(
                "edge target node {} does not exist",
                edge.to_node
            )));
        }
        if flow
            .edges
            .iter()
            .any(|e| e.to_node == edge.to_node && e.to_port == edge.to_port)
        {
            return Err(FlowfileError::validation(format!(
                "input port {:?} on node {} is already connected",
                edge.to_port, edge.to_node
            )));
        }
        let mut trial = flow.edges.clone();
        trial.push(edge.clone());
        if has_cycle(&flow.nodes.keys().copied().collect::<Vec<_>>(), &trial) {
            return Err(FlowfileError::validation(
                "adding this edge would introduce a cycle",
            ));
        }
        tracing::debug!(flow_id = %flow_id, from = %edge.from_node, to = %edge.to_node, "edge added");
        flow.edges.push(edge);
        Ok(())
    }

    pub async fn delete_edge(&self, flow_id: FlowId, edge: &Edge) -> Result<(), FlowfileError> {
        let entry = self.entry(flow_id).await?;
        self.guard_not_running(&entry).await?;
        let mut flow = entry.flow.write().await;
        let before = flow.edges.len();
        flow.edges.retain(|e| e != edge);
        if flow.edges.len() == before {
            return Err(FlowfileError::validation("edge does not exist"));
        }
        Ok(())
    }

    /// Walks the downstream transitive closure of `node_id` in topological
    /// order, re-running each kind's `validate` and caching the resulting
    /// `ValidationState`/`SchemaState` on every visited node (spec §4.1's
    /// eager propagation). An ancestor error marks descendants
    /// `SchemaState::UnknownUpstream`.
    pub async fn propagate_schema_from(
        &self,
        flow_id: FlowId,
        node_id: NodeId,
    ) -> Result<(), FlowfileError> {
        let entry = self.entry(flow_id).await?;
        let mut flow = entry.flow.write().await;
        propagate(&mut flow, node_id, &self.registry)
    }

    pub async fn validate_only(&self, flow_id: FlowId) -> Result<ValidationReport, FlowfileError> {
        let entry = self.entry(flow_id).await?;
        let mut flow = entry.flow.read().await.clone();
        for node_id in flow.source_nodes() {
            propagate(&mut flow, node_id, &self.registry)?;
        }
        Ok(ValidationReport::from_flow(&flow))
    }

    pub async fn dot(&self, flow_id: FlowId) -> Result<String, FlowfileError> {
        let flow = self.get_flow(flow_id).await?;
        Ok(crate::dot::render(&flow))
    }

    pub async fn serialize(&self, flow_id: FlowId) -> Result<serde_json::Value, FlowfileError> {
        let flow = self.get_flow(flow_id).await?;
        serde_json::to_value(&flow).map_err(|e| FlowfileError::Validation {
            message: format!("failed to serialize flow: {e}"),
        })
    }

    pub async fn deserialize(&self, doc: serde_json::Value) -> Result<FlowId, FlowfileError> {
        let flow: Flow = serde_json::from_value(doc).map_err(|e| FlowfileError::Validation {
            message: format!("failed to deserialize flow: {e}"),
        })?;
        let id = flow.flow_id;
        let next_node = flow.nodes.keys().map(|n| n.0).max().unwrap_or(0) + 1;
        let entry = FlowEntry::new(flow);
        entry.next_node_id.store(next_node, Ordering::SeqCst);
        self.flows.write().await.insert(id, Arc::new(entry));
        if let Some(max_id) = self.flows.read().await.keys().map(|f| f.0).max() {
            let current = self.next_flow_id.load(Ordering::SeqCst);
            if max_id >= current {
                self.next_flow_id.store(max_id + 1, Ordering::SeqCst);
            }
        }
        Ok(id)
    }
}

/// DFS three-color cycle check over the candidate edge set.
fn has_cycle(nodes: &[NodeId], edges: &[Edge]) -> bool {
    #[derive(Clone, Copy, PartialEq)]
    enum Color {
        White,
        Gray,
        Black,
    }
    let mut color: HashMap<NodeId, Color> = nodes.iter().map(|n| (*n, Color::White)).collect();
    let mut adjacency: HashMap<NodeId, Vec<NodeId>> = HashMap::new();
    for edge in edges {
        adjacency.entry(edge.from_node).or_default().push(edge.to_node);
    }

    fn visit(
        node: NodeId,
        color: &mut HashMap<NodeId, Color>,
        adjacency: &HashMap<NodeId, Vec<NodeId>>,
    ) -> bool {
        color.insert(node, Color::Gray);
        if let Some(neighbors) = adjacency.get(&node) {
            for &next in neighbors {
                match color.get(&next).copied().unwrap_or(Color::White) {
                    Color::Gray => return true,
                    Color::White => {
                        if visit(next, color, adjacency) {
                            return true;
                        }
                    }
                    Color::Black => {}
                }
            }
        }
        color.insert(node, Color::Black);
        false
    }

    for &node in nodes {
        if color.get(&node).copied() == Some(Color::White) && visit(node, &mut color, &adjacency) {
            return true;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> GraphStore {
        GraphStore::new(Arc::new(NodeRegistry::built_in()))
    }

    #[tokio::test]
    async fn add_edge_rejects_self_loop() {
        let store = store();
        let flow_id = store.create_flow("f").await;
        let node = store
            .add_node(flow_id, "manual_input", Position { x: 0.0, y: 0.0 })
            .await
            .unwrap();
        let err = store
            .add_edge(
                flow_id,
                Edge::new(node, Port::Output(0), node, Port::Input(0)),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, FlowfileError::Validation { .. }));
    }

    #[tokio::test]
    async fn add_edge_rejects_longer_cycle() {
        let store = store();
        let flow_id = store.create_flow("f").await;
        let a = store
            .add_node(flow_id, "manual_input", Position { x: 0.0, y: 0.0 })
            .await
            .unwrap();
        let b = store
            .add_node(flow_id, "select", Position { x: 1.0, y: 0.0 })
            .await
            .unwrap();
        store
            .add_edge(flow_id, Edge::new(a, Port::Output(0), b, Port::Input(0)))
            .await
            .unwrap();
        let err = store
            .add_edge(flow_id, Edge::new(b, Port::Output(0), a, Port::Input(0)))
            .await
            .unwrap_err();
        assert!(matches!(err, FlowfileError::Validation { .. }));
    }

    #[tokio::test]
    async fn delete_node_removes_incident_edges() {
        let store = store();
        let flow_id = store.create_flow("f").await;
        let a = store
            .add_node(flow_id, "manual_input", Position { x: 0.0, y: 0.0 })
            .await
            .unwrap();
        let b = store
            .add_node(flow_id, "select", Position { x: 1.0, y: 0.0 })
            .await
            .unwrap();
        store
            .add_edge(flow_id, Edge::new(a, Port::Output(0), b, Port::Input(0)))
            .await
            .unwrap();
        store.delete_node(flow_id, a).await.unwrap();
        let flow = store.get_flow(flow_id).await.unwrap();
        assert!(flow.edges.is_empty());
    }

    #[tokio::test]
    async fn run_active_flag_is_exclusive() {
        let store = store();
        let flow_id = store.create_flow("f").await;
        assert!(store.try_set_run_active(flow_id).await.unwrap());
        assert!(!store.try_set_run_active(flow_id).await.unwrap());
        store.clear_run_active(flow_id).await.unwrap();
        assert!(store.try_set_run_active(flow_id).await.unwrap());
    }
}
