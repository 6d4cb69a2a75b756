//! `POST /editor/add_node`, `/delete_node`, `/add_connection`,
//! `/delete_connection`, and `POST /update_settings?node_type=` (spec §6).
//!
//! Node ids are server-assigned by `GraphStore::add_node` rather than
//! accepted from the client — `flowfile-graph` already enforces this via
//! its per-flow monotonic counter, so the editor surface here returns the
//! assigned id rather than round-tripping a client-supplied one.

use crate::api::error::ApiResult;
use crate::api::response::{created, no_content, ok};
use crate::api::state::AppState;
use axum::extract::{Query, State};
use flowfile_types::{Edge, FlowId, NodeId, Position, SettingsValue};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct FlowIdQuery {
    pub flow_id: u64,
}

#[derive(Debug, Deserialize)]
pub struct AddNodeBody {
    pub kind: String,
    pub position: Position,
}

pub async fn add_node(
    State(state): State<AppState>,
    Query(query): Query<FlowIdQuery>,
    axum::Json(body): axum::Json<AddNodeBody>,
) -> ApiResult<impl axum::response::IntoResponse> {
    let node_id = state
        .graph
        .add_node(FlowId(query.flow_id), body.kind.as_str(), body.position)
        .await?;
    Ok(created(serde_json::json!({ "node_id": node_id })))
}

#[derive(Debug, Deserialize)]
pub struct DeleteNodeBody {
    pub node_id: u64,
}

pub async fn delete_node(
    State(state): State<AppState>,
    Query(query): Query<FlowIdQuery>,
    axum::Json(body): axum::Json<DeleteNodeBody>,
) -> ApiResult<impl axum::response::IntoResponse> {
    state
        .graph
        .delete_node(FlowId(query.flow_id), NodeId(body.node_id))
        .await?;
    Ok(no_content())
}

pub async fn add_connection(
    State(state): State<AppState>,
    Query(query): Query<FlowIdQuery>,
    axum::Json(edge): axum::Json<Edge>,
) -> ApiResult<impl axum::response::IntoResponse> {
    state.graph.add_edge(FlowId(query.flow_id), edge).await?;
    Ok(no_content())
}

pub async fn delete_connection(
    State(state): State<AppState>,
    Query(query): Query<FlowIdQuery>,
    axum::Json(edge): axum::Json<Edge>,
) -> ApiResult<impl axum::response::IntoResponse> {
    state.graph.delete_edge(FlowId(query.flow_id), &edge).await?;
    Ok(no_content())
}

#[derive(Debug, Deserialize)]
pub struct UpdateSettingsQuery {
    pub flow_id: u64,
    pub node_id: u64,
    /// Declared but unused beyond documentation purposes: the registry
    /// dispatches on the node's own stored `kind`, not on this parameter.
    /// Kept so a client following spec §6's literal contract is accepted.
    #[serde(default)]
    pub node_type: Option<String>,
}

pub async fn update_settings(
    State(state): State<AppState>,
    Query(query): Query<UpdateSettingsQuery>,
    axum::Json(fields): axum::Json<serde_json::Value>,
) -> ApiResult<impl axum::response::IntoResponse> {
    state
        .graph
        .update_settings(
            FlowId(query.flow_id),
            NodeId(query.node_id),
            SettingsValue::new(fields),
        )
        .await?;
    state
        .graph
        .propagate_schema_from(FlowId(query.flow_id), NodeId(query.node_id))
        .await?;
    Ok(ok(serde_json::json!({ "updated": true })))
}
