//! Shared application state, grounded on
//! `orchestrator::api::routes::AppState` (`{db, broadcast}`), widened to
//! the handful of shared services this façade's handlers need: the graph
//! store (C1), the node registry (C2), the run registry (C6) and the
//! run-history database.

use crate::config::ServerConfig;
use crate::db::DatabaseConnection;
use flowfile_graph::GraphStore;
use flowfile_registry::NodeRegistry;
use flowfile_runtime::RunRegistry;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub graph: Arc<GraphStore>,
    pub registry: Arc<NodeRegistry>,
    pub runs: Arc<RunRegistry>,
    pub db: DatabaseConnection,
    pub config: Arc<ServerConfig>,
}
