use flowfile_worker_proto::FrameErrorKind;
use thiserror::Error;

/// Failures raised while evaluating a `PlanOp`, mapped 1:1 onto the
/// `FrameErrorKind`s a `start` can terminate with (spec §4.4, §7).
#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("plan invalid: {0}")]
    PlanInvalid(String),

    #[error("execution error: {0}")]
    Execution(String),

    #[error("cancelled")]
    Cancelled,
}

impl WorkerError {
    pub fn frame_kind(&self) -> FrameErrorKind {
        match self {
            WorkerError::PlanInvalid(_) => FrameErrorKind::PlanInvalid,
            WorkerError::Execution(_) => FrameErrorKind::ExecutionError,
            WorkerError::Cancelled => FrameErrorKind::Cancelled,
        }
    }

    pub fn message(&self) -> String {
        self.to_string()
    }
}

impl From<std::io::Error> for WorkerError {
    fn from(e: std::io::Error) -> Self {
        WorkerError::Execution(format!("io error: {e}"))
    }
}

impl From<serde_json::Error> for WorkerError {
    fn from(e: serde_json::Error) -> Self {
        WorkerError::Execution(format!("malformed data: {e}"))
    }
}

pub type Result<T> = std::result::Result<T, WorkerError>;
