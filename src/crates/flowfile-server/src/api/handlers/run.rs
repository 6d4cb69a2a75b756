//! `POST /flow/run/`, `POST /flow/cancel/`, and `GET /flow/run_status`
//! (spec §6), the last extended with a supplemented long-poll mode
//! (`wait_for_change`/`timeout_ms`) grounded on `orchestrator::api::ws`'s
//! event-driven handlers, generalized here from a push subscription to a
//! pull-with-timeout one for clients that cannot hold a streaming
//! connection open.

use crate::api::error::{ApiError, ApiResult};
use crate::api::response::ok;
use crate::api::state::AppState;
use axum::extract::{Query, State};
use flowfile_types::{ExecutionMode, FlowId, NodeId};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio_stream::StreamExt;

#[derive(Debug, Deserialize)]
pub struct RunQuery {
    pub flow_id: u64,
    #[serde(default)]
    pub mode: Option<String>,
}

pub async fn start_run(
    State(state): State<AppState>,
    Query(query): Query<RunQuery>,
) -> ApiResult<impl axum::response::IntoResponse> {
    let flow_id = FlowId(query.flow_id);
    let mode = match query.mode.as_deref() {
        Some("performance") => ExecutionMode::Performance,
        _ => ExecutionMode::Development,
    };
    let flow_name = state.graph.get_flow(flow_id).await?.name;
    let run_id = state.runs.clone().start_run(flow_id, mode).await?;
    crate::db::RunRepository::create(state.db.pool(), &run_id, flow_id, &flow_name).await?;
    spawn_run_history_sink(state, run_id.clone());
    Ok(ok(serde_json::json!({ "run_id": run_id })))
}

/// Persists the run's terminal status once it reaches `RunFinished`,
/// independent of whether anyone is watching via `/flow/logs`.
fn spawn_run_history_sink(state: AppState, run_id: flowfile_types::RunId) {
    tokio::spawn(async move {
        let Ok(mut events) = state.runs.subscribe(&run_id) else { return };
        while let Some(event) = events.next().await {
            if let flowfile_runtime::RunEvent::RunFinished { status, .. } = event {
                let status_str = match status {
                    flowfile_scheduler::RunStatus::Running => continue,
                    flowfile_scheduler::RunStatus::Success => "success",
                    flowfile_scheduler::RunStatus::Cancelled => "cancelled",
                    flowfile_scheduler::RunStatus::Failed => "failed",
                };
                let _ = crate::db::RunRepository::mark_finished(state.db.pool(), &run_id, status_str).await;
                break;
            }
        }
    });
}

#[derive(Debug, Deserialize)]
pub struct FlowIdQuery {
    pub flow_id: u64,
}

pub async fn cancel_run(
    State(state): State<AppState>,
    Query(query): Query<FlowIdQuery>,
) -> ApiResult<impl axum::response::IntoResponse> {
    let flow_id = FlowId(query.flow_id);
    let run_id = state
        .runs
        .active_run_for(flow_id)
        .ok_or_else(|| ApiError::NotFound(format!("flow {flow_id} has no active run")))?;
    state.runs.cancel(&run_id);
    Ok(ok(serde_json::json!({ "run_id": run_id, "cancelling": true })))
}

#[derive(Debug, Serialize)]
struct NodeStateEntry {
    node_id: NodeId,
    state: flowfile_scheduler::NodeRunState,
}

#[derive(Debug, Serialize)]
struct RunStatusResponse {
    run_id: flowfile_types::RunId,
    flow_id: FlowId,
    status: flowfile_scheduler::RunStatus,
    node_states: Vec<NodeStateEntry>,
    log_tail: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct RunStatusQuery {
    pub flow_id: u64,
    /// Supplemented long-poll mode: block until the run's event sequence
    /// advances past `wait_for_change`, or `timeout_ms` elapses.
    #[serde(default)]
    pub wait_for_change: Option<u64>,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

pub async fn run_status(
    State(state): State<AppState>,
    Query(query): Query<RunStatusQuery>,
) -> ApiResult<impl axum::response::IntoResponse> {
    let flow_id = FlowId(query.flow_id);
    let run_id = state
        .runs
        .latest_run_for(flow_id)
        .ok_or_else(|| ApiError::NotFound(format!("flow {flow_id} has no run on record")))?;

    if let Some(since_seq) = query.wait_for_change {
        let timeout = Duration::from_millis(query.timeout_ms.unwrap_or(30_000));
        let mut events = state.runs.subscribe(&run_id)?;
        let _ = tokio::time::timeout(timeout, async {
            while let Some(event) = events.next().await {
                if event.seq() > since_seq {
                    break;
                }
            }
        })
        .await;
    }

    let snapshot = state.runs.status(&run_id)?;
    let node_states = snapshot
        .node_states
        .into_iter()
        .map(|(node_id, state)| NodeStateEntry { node_id, state })
        .collect();
    Ok(ok(RunStatusResponse {
        run_id: snapshot.run_id,
        flow_id: snapshot.flow_id,
        status: snapshot.status,
        node_states,
        log_tail: snapshot.log_tail,
    }))
}
