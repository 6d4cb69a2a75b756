//! # flowfile-cli
//!
//! Command-line client for `flowfile-server`'s flow editor and run-control
//! API, grounded on `langgraph-cli`'s `clap::Subcommand` layout and
//! `aco::client`'s HTTP request conventions.

mod client;
mod error;

use clap::{Parser, Subcommand};
use client::FlowfileClient;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "flowfile")]
#[command(about = "Manage flows and runs against a flowfile-server instance", long_about = None)]
#[command(version)]
struct Cli {
    /// Base URL of the flowfile-server instance
    #[arg(long, env = "FLOWFILE_SERVER_URL", default_value = "http://127.0.0.1:8080", global = true)]
    server: String,

    /// Request timeout in seconds
    #[arg(long, default_value_t = 30, global = true)]
    timeout_secs: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Flow document operations
    Flow {
        #[command(subcommand)]
        command: FlowCommands,
    },
    /// Editor operations: add/remove nodes and connections
    Node {
        #[command(subcommand)]
        command: NodeCommands,
    },
    /// Run control: start, cancel, poll status
    Run {
        #[command(subcommand)]
        command: RunCommands,
    },
    /// List every registered node kind and its settings schema
    Kinds,
}

#[derive(Subcommand)]
enum FlowCommands {
    /// Create a new flow
    Create {
        name: String,
    },
    /// Fetch a flow's document
    Get {
        #[arg(long)]
        flow_id: u64,
    },
    /// Validate a flow without running it
    Validate {
        #[arg(long)]
        flow_id: u64,
    },
}

#[derive(Subcommand)]
enum NodeCommands {
    /// Add a node to a flow
    Add {
        #[arg(long)]
        flow_id: u64,
        /// Node kind, e.g. read_csv, filter, group_by
        kind: String,
        /// Canvas position as "X,Y"
        #[arg(long, default_value = "0,0")]
        position: String,
    },
    /// Remove a node from a flow
    Delete {
        #[arg(long)]
        flow_id: u64,
        node_id: u64,
    },
    /// Fetch a node's validation state, schema and upstream summary
    Get {
        #[arg(long)]
        flow_id: u64,
        node_id: u64,
    },
    /// Fetch a node's cached preview rows
    Data {
        #[arg(long)]
        flow_id: u64,
        node_id: u64,
    },
    /// Replace a node's settings record (JSON body read from argument or stdin with '-')
    Settings {
        #[arg(long)]
        flow_id: u64,
        node_id: u64,
        /// Inline JSON, or '-' to read from stdin
        json: String,
    },
}

#[derive(Subcommand)]
enum RunCommands {
    /// Start a run
    Start {
        #[arg(long)]
        flow_id: u64,
        /// "development" (sampled, default) or "performance" (full data)
        #[arg(long)]
        mode: Option<String>,
    },
    /// Cancel the flow's active run
    Cancel {
        #[arg(long)]
        flow_id: u64,
    },
    /// Fetch the flow's latest run snapshot
    Status {
        #[arg(long)]
        flow_id: u64,
        /// Block until the run's event sequence advances past this value
        #[arg(long)]
        wait_for_change: Option<u64>,
        #[arg(long)]
        timeout_ms: Option<u64>,
    },
}

fn parse_position(s: &str) -> error::Result<(f64, f64)> {
    let (x, y) = s
        .split_once(',')
        .ok_or_else(|| error::CliError::InvalidPosition(s.to_string()))?;
    let x = x
        .trim()
        .parse::<f64>()
        .map_err(|_| error::CliError::InvalidPosition(s.to_string()))?;
    let y = y
        .trim()
        .parse::<f64>()
        .map_err(|_| error::CliError::InvalidPosition(s.to_string()))?;
    Ok((x, y))
}

fn print_json(value: &serde_json::Value) {
    match serde_json::to_string_pretty(value) {
        Ok(pretty) => println!("{pretty}"),
        Err(_) => println!("{value}"),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_max_level(tracing::Level::WARN).init();

    let cli = Cli::parse();
    let client = FlowfileClient::new(cli.server, Duration::from_secs(cli.timeout_secs));

    let result = match cli.command {
        Commands::Flow { command } => match command {
            FlowCommands::Create { name } => client.create_flow(&name).await,
            FlowCommands::Get { flow_id } => client.get_flow(flow_id).await,
            FlowCommands::Validate { flow_id } => client.validate_flow(flow_id).await,
        },
        Commands::Node { command } => match command {
            NodeCommands::Add { flow_id, kind, position } => {
                let (x, y) = parse_position(&position)?;
                client.add_node(flow_id, &kind, x, y).await
            }
            NodeCommands::Delete { flow_id, node_id } => client.delete_node(flow_id, node_id).await,
            NodeCommands::Get { flow_id, node_id } => client.get_node(flow_id, node_id).await,
            NodeCommands::Data { flow_id, node_id } => client.get_node_data(flow_id, node_id).await,
            NodeCommands::Settings { flow_id, node_id, json } => {
                let raw = if json == "-" {
                    use std::io::Read;
                    let mut buf = String::new();
                    std::io::stdin().read_to_string(&mut buf)?;
                    buf
                } else {
                    json
                };
                let fields: serde_json::Value = serde_json::from_str(&raw)?;
                client.update_settings(flow_id, node_id, fields).await
            }
        },
        Commands::Run { command } => match command {
            RunCommands::Start { flow_id, mode } => client.start_run(flow_id, mode.as_deref()).await,
            RunCommands::Cancel { flow_id } => client.cancel_run(flow_id).await,
            RunCommands::Status { flow_id, wait_for_change, timeout_ms } => {
                client.run_status(flow_id, wait_for_change, timeout_ms).await
            }
        },
        Commands::Kinds => client.node_kinds().await,
    };

    match result {
        Ok(value) => {
            print_json(&value);
            Ok(())
        }
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(1);
        }
    }
}
