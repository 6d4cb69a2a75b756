use thiserror::Error;

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("flow snapshot references unknown node {0}")]
    UnknownNode(flowfile_types::NodeId),

    #[error("registry error: {0}")]
    Registry(#[from] flowfile_types::FlowfileError),

    #[error("cache error: {0}")]
    Cache(#[from] flowfile_cache::CacheError),
}

pub type Result<T> = std::result::Result<T, SchedulerError>;
