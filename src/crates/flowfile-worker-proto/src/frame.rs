//! The server/worker wire vocabulary (spec §4.4, §6): `start, cancel, ping,
//! pong, progress, log, done, error`. Grounded on
//! `tooling::runtime::messages`'s `ToolRequest`/`ToolResponse`/
//! `EventMessage`/`Heartbeat`, renamed to the spec's frame names and
//! collapsed into one tagged enum so `Encoder`/`Decoder` has a single frame
//! type to serialize rather than a family of structs.

use flowfile_registry::PlanOp;
use flowfile_types::{Artifact, NodeId, TaskId};
use serde::{Deserialize, Serialize};

/// One IPC frame crossing the worker socket in either direction.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "frame", rename_all = "snake_case")]
pub enum Frame {
    /// Server → worker: begin executing `plan`, sampling sources to
    /// `sample_rows` rows when set (Development mode). `plan` already
    /// carries resolved upstream `ArtifactRef`s baked in by the node's
    /// `build_plan`, so no separate input list travels alongside it.
    Start {
        task_id: TaskId,
        node_id: NodeId,
        plan: PlanOp,
        sample_rows: Option<u64>,
    },
    /// Server → worker: abandon `task_id`; the worker replies with
    /// `Error { kind: Cancelled }` once it has released resources.
    Cancel { task_id: TaskId },
    /// Either direction, sent every 5s of idle time; the peer must answer
    /// with `Pong` within 5s or the connection is declared lost.
    Ping { nonce: u64 },
    Pong { nonce: u64 },
    /// Worker → server: periodic execution progress for `task_id`.
    Progress {
        task_id: TaskId,
        rows: u64,
        bytes: u64,
        phase: String,
    },
    /// Worker → server: a log line produced while executing `task_id`.
    Log {
        task_id: TaskId,
        level: String,
        message: String,
    },
    /// Worker → server: terminal success, carrying the materialized
    /// artifact.
    Done { task_id: TaskId, artifact: Artifact },
    /// Worker → server: terminal failure. `kind` is one of `plan-invalid`,
    /// `execution-error`, `cancelled`, `worker-lost` (spec §4.4/§7).
    Error {
        task_id: TaskId,
        kind: FrameErrorKind,
        message: String,
        traceback: Option<String>,
    },
    /// Server → worker: read back up to `max_rows` of an already-
    /// materialized artifact for the Runner's data preview (spec §4.3).
    /// Not part of the `start`/`cancel`/`done`/`error` task lifecycle;
    /// correlated by its own `task_id` so it can interleave with running
    /// tasks on the same connection.
    PreviewRequest {
        task_id: TaskId,
        artifact: Artifact,
        max_rows: u64,
    },
    PreviewResponse {
        task_id: TaskId,
        rows: Vec<serde_json::Map<String, serde_json::Value>>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FrameErrorKind {
    PlanInvalid,
    ExecutionError,
    Cancelled,
    WorkerLost,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ping_pong_round_trips_through_json() {
        let frame = Frame::Ping { nonce: 7 };
        let json = serde_json::to_string(&frame).unwrap();
        let back: Frame = serde_json::from_str(&json).unwrap();
        assert!(matches!(back, Frame::Ping { nonce: 7 }));
    }

    #[test]
    fn frame_tag_is_snake_case() {
        let frame = Frame::Cancel { task_id: TaskId("task_0".into()) };
        let json = serde_json::to_value(&frame).unwrap();
        assert_eq!(json["frame"], "cancel");
    }
}
