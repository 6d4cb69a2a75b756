//! Error shape grounded on `langgraph-checkpoint::error::CheckpointError`:
//! a thiserror enum distinguishing I/O, serialization, and "the thing on
//! disk doesn't match what it claims to be" failures.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("artifact cache I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("artifact cache manifest is not valid JSON: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("artifact cache entry is corrupt: {0}")]
    Corrupt(String),
}

pub type Result<T> = std::result::Result<T, CacheError>;
