//! The Event Bus's wire events (spec §4.6): `RunStarted | NodeStarted |
//! NodeProgress | NodeLog | NodeFinished | RunFinished`, each carrying a
//! monotonic `seq`. `Dropped` is the backpressure marker substituted for
//! evicted `NodeProgress` events (spec §5), grounded on
//! `orchestrator::api::ws::backpressure`'s `dropped_count` counter and
//! `replay::StoredEvent`'s `sequence` field.

use flowfile_scheduler::{NodeRunState, RunStatus};
use flowfile_types::{NodeId, RunId, TaskId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RunEvent {
    RunStarted {
        run_id: RunId,
        seq: u64,
    },
    NodeStarted {
        run_id: RunId,
        node_id: NodeId,
        seq: u64,
    },
    NodeProgress {
        run_id: RunId,
        node_id: NodeId,
        task_id: TaskId,
        seq: u64,
        rows: Option<u64>,
        bytes: Option<u64>,
        phase: Option<String>,
    },
    NodeLog {
        run_id: RunId,
        node_id: NodeId,
        seq: u64,
        level: String,
        message: String,
    },
    NodeFinished {
        run_id: RunId,
        node_id: NodeId,
        seq: u64,
        state: NodeRunState,
    },
    RunFinished {
        run_id: RunId,
        seq: u64,
        status: RunStatus,
    },
    /// Substituted for one or more dropped `NodeProgress` events when a
    /// subscriber's buffer is full (spec §5's backpressure clause). Never
    /// emitted in place of any other event kind.
    Dropped {
        run_id: RunId,
        seq: u64,
        count: u64,
    },
}

impl RunEvent {
    pub fn run_id(&self) -> &RunId {
        match self {
            RunEvent::RunStarted { run_id, .. }
            | RunEvent::NodeStarted { run_id, .. }
            | RunEvent::NodeProgress { run_id, .. }
            | RunEvent::NodeLog { run_id, .. }
            | RunEvent::NodeFinished { run_id, .. }
            | RunEvent::RunFinished { run_id, .. }
            | RunEvent::Dropped { run_id, .. } => run_id,
        }
    }

    pub fn seq(&self) -> u64 {
        match self {
            RunEvent::RunStarted { seq, .. }
            | RunEvent::NodeStarted { seq, .. }
            | RunEvent::NodeProgress { seq, .. }
            | RunEvent::NodeLog { seq, .. }
            | RunEvent::NodeFinished { seq, .. }
            | RunEvent::RunFinished { seq, .. }
            | RunEvent::Dropped { seq, .. } => *seq,
        }
    }

    /// Whether the bus is allowed to drop this event kind under
    /// backpressure (spec §5: only `NodeProgress` may be dropped).
    pub fn is_droppable(&self) -> bool {
        matches!(self, RunEvent::NodeProgress { .. })
    }
}
