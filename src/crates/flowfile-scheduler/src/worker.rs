//! The seam between the Runner and the out-of-process worker. This crate
//! depends only on the trait; `flowfile-worker-client` provides the real
//! implementation (persistent connection, outstanding-task map, supervisor
//! restart) per spec §4.4, grounded on `orchestrator::client::AcoClient`.

use flowfile_registry::PlanOp;
use flowfile_types::{Artifact, FlowId, NodeId, TaskId};
use std::fmt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// A progress frame relayed from the worker while a task runs (spec §4.4's
/// `started` / `progress` / `log` events, terminal events excluded since
/// those resolve the `submit` future instead).
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    Started,
    Progress {
        rows: u64,
        bytes: u64,
        phase: String,
    },
    Log {
        level: tracing::Level,
        message: String,
    },
}

/// The three failure kinds named in spec §4.4. `WorkerLost` is distinguished
/// from `ExecutionError` because the Runner's failure policy is identical
/// for both (mark the node `Failed`, skip descendants) but the Worker
/// Client's supervisor only restarts on the former.
#[derive(Debug, Clone)]
pub enum WorkerFailure {
    PlanInvalid { message: String },
    ExecutionError { message: String, traceback: Option<String> },
    Cancelled,
    WorkerLost,
}

impl fmt::Display for WorkerFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkerFailure::PlanInvalid { message } => write!(f, "plan invalid: {message}"),
            WorkerFailure::ExecutionError { message, .. } => write!(f, "execution error: {message}"),
            WorkerFailure::Cancelled => write!(f, "cancelled"),
            WorkerFailure::WorkerLost => write!(f, "worker lost"),
        }
    }
}

impl std::error::Error for WorkerFailure {}

/// One unit of work submitted to the worker client.
pub struct WorkerTask {
    pub task_id: TaskId,
    pub flow_id: FlowId,
    pub node_id: NodeId,
    pub plan: PlanOp,
    /// Set when the run's execution mode is `Development`; instructs the
    /// worker to truncate every source read to this many rows.
    pub sample_rows: Option<u64>,
    /// Progress frames are sent here as they arrive; dropped once the task
    /// resolves.
    pub progress: mpsc::Sender<ProgressEvent>,
    pub cancel: CancellationToken,
}

/// In-process façade over the out-of-process worker (spec §4.4 C4). The
/// Runner calls `submit` once per node dispatch and awaits its resolution;
/// cancellation is delivered both via `WorkerTask::cancel` and this
/// explicit `cancel` call so a client implementation may eagerly abort a
/// task it hasn't started executing yet.
#[async_trait::async_trait]
pub trait WorkerClient: Send + Sync {
    async fn submit(&self, task: WorkerTask) -> Result<Artifact, WorkerFailure>;

    async fn cancel(&self, task_id: &TaskId);

    /// Reads back up to `max_rows` of a materialized artifact for the
    /// Runner's data preview (spec §4.3). Called for both freshly
    /// submitted and cache-hit artifacts, since a cache hit never goes
    /// through `submit` and so never streams progress/rows on its own.
    async fn preview(
        &self,
        artifact: &Artifact,
        max_rows: u64,
    ) -> Result<Vec<serde_json::Map<String, serde_json::Value>>, WorkerFailure>;
}
