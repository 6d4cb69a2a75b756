use flowfile_types::RunId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("run {0} does not exist")]
    UnknownRun(RunId),

    #[error("flow already has an active run")]
    AlreadyRunning,

    #[error(transparent)]
    Flow(#[from] flowfile_types::FlowfileError),
}

pub type Result<T> = std::result::Result<T, RuntimeError>;
