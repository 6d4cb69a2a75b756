//! `GET /flow/logs` (SSE) and `GET /flow/ws` (WebSocket) — live `RunEvent`
//! streaming for a flow's latest run (spec §6, §4.6). Structurally
//! grounded on `orchestrator::api::ws::handler`'s `BroadcastState`
//! subscribe-and-forward shape, but unlike that handler's placeholder
//! `ws_handler` (which never upgrades the connection), both endpoints here
//! perform a real upgrade/stream over the already-functional
//! `RunRegistry::subscribe` replay-then-live channel.

use crate::api::error::{ApiError, ApiResult};
use crate::api::state::AppState;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::IntoResponse;
use flowfile_types::FlowId;
use futures::stream::Stream;
use serde::Deserialize;
use std::convert::Infallible;
use std::time::Duration;
use tokio_stream::StreamExt;

#[derive(Debug, Deserialize)]
pub struct StreamQuery {
    pub flow_id: u64,
}

fn latest_run(state: &AppState, flow_id: FlowId) -> ApiResult<flowfile_types::RunId> {
    state
        .runs
        .latest_run_for(flow_id)
        .ok_or_else(|| ApiError::NotFound(format!("flow {flow_id} has no run on record")))
}

/// Server-sent events: one `data:` line per `RunEvent`, JSON-encoded,
/// replaying the run's history before switching to live events.
pub async fn flow_logs(
    State(state): State<AppState>,
    Query(query): Query<StreamQuery>,
) -> ApiResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    let run_id = latest_run(&state, FlowId(query.flow_id))?;
    let events = state.runs.subscribe(&run_id)?;
    let stream = events.map(|event| {
        let payload = serde_json::to_string(&event).unwrap_or_else(|_| "{}".to_string());
        Ok(Event::default().data(payload))
    });
    Ok(Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15))))
}

pub async fn flow_ws(
    State(state): State<AppState>,
    Query(query): Query<StreamQuery>,
    ws: WebSocketUpgrade,
) -> ApiResult<impl IntoResponse> {
    let run_id = latest_run(&state, FlowId(query.flow_id))?;
    let events = Box::pin(state.runs.subscribe(&run_id)?);
    Ok(ws.on_upgrade(move |socket| forward_events(socket, events)))
}

async fn forward_events(
    mut socket: WebSocket,
    mut events: std::pin::Pin<Box<dyn Stream<Item = flowfile_runtime::RunEvent> + Send>>,
) {
    loop {
        tokio::select! {
            event = events.next() => {
                let Some(event) = event else { break };
                let payload = match serde_json::to_string(&event) {
                    Ok(payload) => payload,
                    Err(_) => continue,
                };
                if socket.send(Message::Text(payload)).await.is_err() {
                    break;
                }
                if matches!(event, flowfile_runtime::RunEvent::RunFinished { .. }) {
                    break;
                }
            }
            incoming = socket.recv() => {
                match incoming {
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => continue,
                    Some(Err(_)) => break,
                }
            }
        }
    }
}
