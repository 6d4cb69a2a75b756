//! `flowfile-server` binary entry point: wires C1 (graph), C2 (registry),
//! C5 (cache), C4 (worker client) and C6 (run registry) into the C7 HTTP
//! façade, grounded on `flowfile-worker`'s own clap+tracing_subscriber
//! `main.rs` and `orchestrator`'s `DatabaseConnection::connect` plus
//! migration-on-startup pattern.

use clap::Parser;
use flowfile_cache::ArtifactCache;
use flowfile_graph::GraphStore;
use flowfile_registry::NodeRegistry;
use flowfile_runtime::RunRegistry;
use flowfile_server::api::routes::create_router;
use flowfile_server::api::state::AppState;
use flowfile_server::db::DatabaseConnection;
use flowfile_server::ServerConfig;
use flowfile_worker_client::{TcpWorkerClient, WorkerClientConfig};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, Level};

/// Flowfile execution core: flow CRUD, editor and run-control HTTP façade
#[derive(Parser, Debug)]
#[command(name = "flowfile-server")]
#[command(about = "Serves the flow editor and run-control API over HTTP/WS", long_about = None)]
struct Args {
    /// Address to listen on, overrides FLOWFILE_SERVER_ADDR
    #[arg(long)]
    addr: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_max_level(if args.verbose { Level::DEBUG } else { Level::INFO })
        .init();

    let mut config = ServerConfig::from_env();
    if let Some(addr) = args.addr {
        config.listen_addr = addr.parse()?;
    }
    let config = Arc::new(config);

    let db = DatabaseConnection::connect(&config.database_url).await?;
    db.run_migrations().await?;
    info!(url = %config.database_url, "run-history database ready");

    let cache = ArtifactCache::rebuild(&config.artifact_dir).await?;
    info!(
        root = %config.artifact_dir.display(),
        entries = cache.len().await,
        "artifact cache rebuilt"
    );
    let cache = Arc::new(cache);

    let mut worker_config = WorkerClientConfig::new(config.worker_addr);
    worker_config.task_timeout = config.task_timeout;
    let worker: Arc<dyn flowfile_scheduler::WorkerClient> =
        Arc::new(TcpWorkerClient::connect(worker_config));

    let registry = Arc::new(NodeRegistry::built_in());
    let graph = Arc::new(GraphStore::new(registry.clone()));
    let runs = RunRegistry::new(graph.clone(), registry.clone(), cache, worker);

    let state = AppState {
        graph,
        registry,
        runs,
        db,
        config: config.clone(),
    };

    let router = create_router(state);
    let listener = TcpListener::bind(config.listen_addr).await?;
    info!(addr = %config.listen_addr, "flowfile-server listening");
    axum::serve(listener, router).await?;
    Ok(())
}
