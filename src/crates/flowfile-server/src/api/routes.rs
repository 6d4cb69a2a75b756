//! Router assembly (spec §6's literal endpoint table, plus the
//! supplemented `/flow/validate`, `/node_kinds`, `/healthz` and
//! `/flow/ws`), grounded on `orchestrator::api::routes::create_router`'s
//! `Router::new().route(...).with_state(app_state)` shape. Every endpoint
//! here is query-parameterized per spec §6, so none of the teacher's
//! `:id`/`{id}` path-parameter routes apply.

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::api::handlers::{editor, flow, node, run, system};
use crate::api::stream;
use crate::api::state::AppState;

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(system::healthz))
        .route("/node_kinds", get(system::node_kinds))
        .route("/flow", post(flow::create_flow).get(flow::get_flow))
        .route("/flow/validate", get(flow::validate_flow))
        .route("/editor/add_node", post(editor::add_node))
        .route("/editor/delete_node", post(editor::delete_node))
        .route("/editor/add_connection", post(editor::add_connection))
        .route("/editor/delete_connection", post(editor::delete_connection))
        .route("/update_settings", post(editor::update_settings))
        .route("/node", get(node::get_node))
        .route("/node/data", get(node::get_node_data))
        .route("/flow/run", post(run::start_run))
        .route("/flow/cancel", post(run::cancel_run))
        .route("/flow/run_status", get(run::run_status))
        .route("/flow/logs", get(stream::flow_logs))
        .route("/flow/ws", get(stream::flow_ws))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[cfg(test)]
pub fn create_test_router(state: AppState) -> Router {
    create_router(state)
}
