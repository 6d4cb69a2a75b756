//! `GET /healthz` and the supplemented `GET /node_kinds` (spec §6: "The
//! target implementation re-exposes this to the UI via C7"), grounded on
//! `orchestrator::api::handlers::health`'s liveness probe plus a DB ping.

use crate::api::response::ok;
use crate::api::state::AppState;
use axum::extract::State;
use axum::http::StatusCode;
use flowfile_registry::{NodeCategory, NodeShape};
use serde::Serialize;

pub async fn healthz(State(state): State<AppState>) -> impl axum::response::IntoResponse {
    match state.db.health_check().await {
        Ok(()) => (StatusCode::OK, "ok"),
        Err(_) => (StatusCode::SERVICE_UNAVAILABLE, "database unreachable"),
    }
}

/// `NodeShape`/`NodeCategory` are plain Rust enums/structs without a
/// `Serialize` impl of their own (they're metadata consumed internally by
/// `flowfile-graph`'s validator); this summary is the façade's own
/// serializable projection rather than adding `Serialize` derives onto
/// registry-internal types that don't otherwise need them.
#[derive(Debug, Serialize)]
struct NodeKindSummary {
    kind: String,
    category: &'static str,
    main_input_count: u32,
    has_right_input: bool,
    output_count: u32,
    settings_schema: flowfile_registry::SettingsSchema,
}

fn category_name(category: NodeCategory) -> &'static str {
    match category {
        NodeCategory::Input => "input",
        NodeCategory::Transform => "transform",
        NodeCategory::Combine => "combine",
        NodeCategory::Aggregate => "aggregate",
        NodeCategory::Output => "output",
    }
}

pub async fn node_kinds(State(state): State<AppState>) -> impl axum::response::IntoResponse {
    let mut kinds: Vec<NodeKindSummary> = state
        .registry
        .kinds()
        .map(|kind| {
            let node_kind = flowfile_types::NodeKind::from(kind);
            let descriptor = state
                .registry
                .get(&node_kind)
                .expect("kind came from the registry's own kinds() iterator");
            let shape: NodeShape = descriptor.shape();
            NodeKindSummary {
                kind: kind.to_string(),
                category: category_name(descriptor.category()),
                main_input_count: shape.main_input_count,
                has_right_input: shape.has_right_input,
                output_count: shape.output_count,
                settings_schema: descriptor.settings_schema(),
            }
        })
        .collect();
    kinds.sort_by(|a, b| a.kind.cmp(&b.kind));
    ok(kinds)
}
