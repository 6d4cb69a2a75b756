//! Environment-driven configuration (spec §6's environment variable
//! table), grounded on `orchestrator`'s convention of one `from_env`
//! constructor per process rather than a config file.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Default per-task timeout (spec §5: "default 30 minutes, overridable
/// per flow" — the per-process default lives here; a per-flow override is
/// an open extension point not yet exposed on the flow document).
pub const DEFAULT_TASK_TIMEOUT: Duration = Duration::from_secs(30 * 60);

pub struct ServerConfig {
    pub listen_addr: SocketAddr,
    pub artifact_dir: PathBuf,
    pub worker_addr: SocketAddr,
    pub max_parallel: usize,
    pub cache_bytes: u64,
    pub task_timeout: Duration,
    pub database_url: String,
}

impl ServerConfig {
    pub fn from_env() -> Self {
        let listen_addr = std::env::var("FLOWFILE_SERVER_ADDR")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or_else(|| "127.0.0.1:8080".parse().unwrap());

        let artifact_dir = std::env::var("FLOWFILE_ARTIFACT_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./.flowfile-artifacts"));

        // FLOWFILE_WORKER_CMD names a worker process to launch; this build
        // assumes one is already listening and only needs its address,
        // exposed under the narrower FLOWFILE_WORKER_ADDR. Supervising the
        // worker's lifecycle is left to the deployer (systemd, docker
        // compose, etc.) rather than reimplemented here.
        let worker_addr = std::env::var("FLOWFILE_WORKER_ADDR")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or_else(|| "127.0.0.1:7781".parse().unwrap());

        let max_parallel = std::env::var("FLOWFILE_MAX_PARALLEL")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or_else(|| num_cpus::get().max(1));

        let cache_bytes = std::env::var("FLOWFILE_CACHE_BYTES")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(8 * 1024 * 1024 * 1024);

        let task_timeout = std::env::var("FLOWFILE_TASK_TIMEOUT_SEC")
            .ok()
            .and_then(|s| s.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_TASK_TIMEOUT);

        let database_url = std::env::var("FLOWFILE_DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://flowfile.db?mode=rwc".to_string());

        Self {
            listen_addr,
            artifact_dir,
            worker_addr,
            max_parallel,
            cache_bytes,
            task_timeout,
            database_url,
        }
    }
}
