use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Per-task memory budget enforced by the evaluator (spec §4.3: "enforces a
/// per-task memory budget (abort if exceeded)"). The evaluator holds rows
/// in memory as `serde_json::Map`s, so this is tracked as a row-count cap
/// rather than a true RSS measurement — a simplification noted in
/// DESIGN.md, since no process-level memory accounting crate is part of
/// this corpus.
pub const DEFAULT_MAX_ROWS_PER_TASK: u64 = 5_000_000;

/// How often `Frame::Progress` is emitted while a task runs (spec §4.3:
/// "every 250 ms or every N rows"), grounded on `tooling::rate_limit`.
pub const PROGRESS_INTERVAL: Duration = Duration::from_millis(250);
pub const PROGRESS_ROW_STRIDE: u64 = 50_000;

/// Worker process configuration, loaded from environment by `main.rs` or
/// constructed directly by tests. Mirrors the server's own env-driven
/// configuration (spec §6's `FLOWFILE_*` variables), since the worker is a
/// separate process with its own environment.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub listen_addr: SocketAddr,
    /// `FLOWFILE_ARTIFACT_DIR`: root under which `ArtifactRef::path` and
    /// freshly materialized artifacts are resolved.
    pub artifact_root: PathBuf,
    pub max_rows_per_task: u64,
}

impl WorkerConfig {
    pub fn from_env() -> Self {
        let listen_addr = std::env::var("FLOWFILE_WORKER_ADDR")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or_else(|| "127.0.0.1:7781".parse().unwrap());
        let artifact_root = std::env::var("FLOWFILE_ARTIFACT_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./.flowfile-artifacts"));
        let max_rows_per_task = std::env::var("FLOWFILE_WORKER_MAX_ROWS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_MAX_ROWS_PER_TASK);
        Self {
            listen_addr,
            artifact_root,
            max_rows_per_task,
        }
    }
}
