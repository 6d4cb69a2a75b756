//! `flowfile-worker` binary entry point: binds a TCP listener and hands
//! each inbound connection from `flowfile-worker-client` to its own
//! `session::handle_connection` task.

use clap::Parser;
use flowfile_worker::WorkerConfig;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn, Level};

/// Flowfile out-of-process plan executor
#[derive(Parser, Debug)]
#[command(name = "flowfile-worker")]
#[command(about = "Executes a single PlanOp per task over the worker IPC socket", long_about = None)]
struct Args {
    /// Address to listen on, overrides FLOWFILE_WORKER_ADDR
    #[arg(long, env = "FLOWFILE_WORKER_ADDR")]
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

    let mut config = WorkerConfig::from_env();
    if let Some(addr) = args.addr {
        config.listen_addr = addr.parse()?;
    }
    let config = Arc::new(config);

    std::fs::create_dir_all(&config.artifact_root)?;
    let listener = TcpListener::bind(config.listen_addr).await?;
    info!(addr = %config.listen_addr, root = %config.artifact_root.display(), "flowfile-worker listening");

    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(pair) => pair,
            Err(e) => {
                warn!(error = %e, "failed to accept connection");
                continue;
            }
        };
        info!(%peer, "accepted connection");
        let config = config.clone();
        tokio::spawn(async move {
            flowfile_worker::session::handle_connection(stream, config).await;
        });
    }
}
