//! `POST /flow`, `GET /flow`, `GET /flow/validate` (spec §6 plus the
//! supplemented validation endpoint), grounded on
//! `orchestrator::api::handlers::workflows`'s create/get pair.

use crate::api::error::ApiResult;
use crate::api::response::{created, ok};
use crate::api::state::AppState;
use axum::extract::{Query, State};
use flowfile_types::FlowId;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct CreateFlowBody {
    pub name: String,
    #[serde(default)]
    pub path: Option<String>,
}

pub async fn create_flow(
    State(state): State<AppState>,
    axum::Json(body): axum::Json<CreateFlowBody>,
) -> ApiResult<impl axum::response::IntoResponse> {
    let flow_id = state.graph.create_flow(body.name).await;
    Ok(created(serde_json::json!({ "flow_id": flow_id })))
}

#[derive(Debug, Deserialize)]
pub struct FlowQuery {
    pub flow_id: u64,
}

pub async fn get_flow(
    State(state): State<AppState>,
    Query(query): Query<FlowQuery>,
) -> ApiResult<impl axum::response::IntoResponse> {
    let doc = state.graph.serialize(FlowId(query.flow_id)).await?;
    Ok(ok(doc))
}

pub async fn validate_flow(
    State(state): State<AppState>,
    Query(query): Query<FlowQuery>,
) -> ApiResult<impl axum::response::IntoResponse> {
    let report = state.graph.validate_only(FlowId(query.flow_id)).await?;
    Ok(ok(report))
}
