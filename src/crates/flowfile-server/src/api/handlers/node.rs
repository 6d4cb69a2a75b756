//! `GET /node` and `GET /node/data` (spec §6), grounded on
//! `orchestrator::api::handlers`'s read-only detail-view handlers.

use crate::api::error::{ApiError, ApiResult};
use crate::api::response::ok;
use crate::api::state::AppState;
use axum::extract::{Query, State};
use flowfile_types::{FlowId, NodeId, ValidationState};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct NodeQuery {
    pub flow_id: u64,
    pub node_id: u64,
}

#[derive(Debug, Serialize)]
struct UpstreamSummary {
    node_id: NodeId,
    kind: String,
}

#[derive(Debug, Serialize)]
struct NodeDetail {
    node_id: NodeId,
    kind: String,
    validation: ValidationState,
    schema: Option<flowfile_types::SchemaState>,
    upstream: Vec<UpstreamSummary>,
}

pub async fn get_node(
    State(state): State<AppState>,
    Query(query): Query<NodeQuery>,
) -> ApiResult<impl axum::response::IntoResponse> {
    let flow_id = FlowId(query.flow_id);
    let node_id = NodeId(query.node_id);
    let flow = state.graph.get_flow(flow_id).await?;
    let node = flow
        .nodes
        .get(&node_id)
        .ok_or_else(|| ApiError::NotFound(format!("node {node_id} does not exist in flow {flow_id}")))?;

    let upstream = flow
        .inbound_edges(node_id)
        .into_iter()
        .filter_map(|edge| {
            flow.nodes.get(&edge.from_node).map(|n| UpstreamSummary {
                node_id: n.id,
                kind: n.kind.as_str().to_string(),
            })
        })
        .collect();

    Ok(ok(NodeDetail {
        node_id,
        kind: node.kind.as_str().to_string(),
        validation: node.validation.clone().unwrap_or(ValidationState::Unvalidated),
        schema: node.schema.clone(),
        upstream,
    }))
}

#[derive(Debug, Serialize)]
struct NodeDataResponse {
    schema: Option<flowfile_types::Schema>,
    rows: Vec<serde_json::Map<String, serde_json::Value>>,
    has_example_data: bool,
    has_run_with_current_setup: bool,
}

/// `has_run_with_current_setup` approximates spec §6's "ran with the
/// node's current settings" by checking the node's cached `ValidationState`
/// is `Valid` as of the last propagation, rather than recomputing the
/// node's effective hash here — an exact comparison would require exposing
/// `flowfile-scheduler`'s internal hashing outside the Runner.
pub async fn get_node_data(
    State(state): State<AppState>,
    Query(query): Query<NodeQuery>,
) -> ApiResult<impl axum::response::IntoResponse> {
    let flow_id = FlowId(query.flow_id);
    let node_id = NodeId(query.node_id);
    let flow = state.graph.get_flow(flow_id).await?;
    let node = flow
        .nodes
        .get(&node_id)
        .ok_or_else(|| ApiError::NotFound(format!("node {node_id} does not exist in flow {flow_id}")))?;
    let is_valid = node
        .validation
        .as_ref()
        .map(|v| v.is_valid())
        .unwrap_or(false);

    match state.runs.node_preview(flow_id, node_id) {
        Some(preview) => Ok(ok(NodeDataResponse {
            has_example_data: !preview.rows.is_empty(),
            schema: Some(preview.schema),
            rows: preview.rows,
            has_run_with_current_setup: is_valid,
        })),
        None => Ok(ok(NodeDataResponse {
            schema: None,
            rows: Vec::new(),
            has_example_data: false,
            has_run_with_current_setup: false,
        })),
    }
}
