use crate::retry::RetryConfig;
use std::net::SocketAddr;
use std::time::Duration;

/// Default per-task deadline (spec §5: "Per-task default 30 minutes,
/// overridable per flow"). Per-flow override is an open item, see
/// DESIGN.md; this crate exposes a single process-wide default instead.
pub const DEFAULT_TASK_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// A connection is declared crashed after this many consecutive failures
/// within `circuit_break_window` trip the breaker, refusing new submits
/// until the window elapses without a fresh failure (supplemented feature,
/// spec doesn't name a threshold; grounded on `orca::client`'s circuit
/// breaker pattern).
pub const DEFAULT_CIRCUIT_BREAK_THRESHOLD: usize = 5;
pub const DEFAULT_CIRCUIT_BREAK_WINDOW: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
pub struct WorkerClientConfig {
    pub addr: SocketAddr,
    /// Number of persistent connections held open to the worker (spec
    /// §4.4: "a pool of persistent connections to the worker").
    pub pool_size: usize,
    pub retry: RetryConfig,
    pub task_timeout: Duration,
    pub circuit_break_threshold: usize,
    pub circuit_break_window: Duration,
}

impl WorkerClientConfig {
    pub fn new(addr: SocketAddr) -> Self {
        Self {
            addr,
            pool_size: num_cpus::get().max(1),
            retry: RetryConfig::default(),
            task_timeout: DEFAULT_TASK_TIMEOUT,
            circuit_break_threshold: DEFAULT_CIRCUIT_BREAK_THRESHOLD,
            circuit_break_window: DEFAULT_CIRCUIT_BREAK_WINDOW,
        }
    }

    pub fn with_pool_size(mut self, pool_size: usize) -> Self {
        self.pool_size = pool_size.max(1);
        self
    }
}
