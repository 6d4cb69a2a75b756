//! The seven error kinds of spec §7, shared across every crate so that the
//! scheduler can translate any of them into the right node/run state
//! without each crate inventing its own taxonomy.

use crate::ids::NodeId;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A structured error kind, attached to a node or surfaced as an event.
/// Mirrors `GraphError`'s shape in the teacher codebase: named variants
/// with a human-readable message, never an opaque `Box<dyn Error>`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Error)]
pub enum FlowfileError {
    /// Settings invalid for the node's current input schemas. Reported on
    /// the node; never fatal to the run.
    #[error("validation failed: {message}")]
    Validation { message: String },

    /// A downstream node cannot compute its schema because an upstream
    /// node failed; carries the originating node and its message.
    #[error("schema unknown: upstream node {upstream} failed ({message})")]
    Schema { upstream: NodeId, message: String },

    /// Artifact unreadable; treated as a cache miss and re-executed. The
    /// only error kind with local recovery (spec §7).
    #[error("cache error: {message}")]
    Cache { message: String },

    /// The worker reported a runtime failure inside the execution backend.
    #[error("execution failed: {message}")]
    Execution { message: String, traceback: Option<String> },

    /// Transport or worker-process failure; distinct from `Execution`
    /// because it triggers a supervisor restart rather than just marking
    /// the node failed.
    #[error("worker lost: {message}")]
    WorkerLost { message: String },

    /// User-initiated or timeout-triggered cancellation.
    #[error("cancelled")]
    Cancelled,

    /// A malformed IPC frame; fatal to the worker connection, treated
    /// identically to `WorkerLost` by callers.
    #[error("protocol error: {message}")]
    Protocol { message: String },

    /// The plan built for a node was rejected by the worker before
    /// execution began (distinct from a runtime `Execution` failure).
    #[error("plan invalid: {message}")]
    PlanInvalid { message: String },
}

impl FlowfileError {
    pub fn validation(message: impl Into<String>) -> Self {
        FlowfileError::Validation {
            message: message.into(),
        }
    }

    pub fn is_cache_error(&self) -> bool {
        matches!(self, FlowfileError::Cache { .. })
    }

    /// Whether this error kind is one the node-state machine treats as
    /// transport-fatal (i.e. as `worker-lost`): `WorkerLost` itself and any
    /// `Protocol` violation (spec §7: "ProtocolError... equivalent to
    /// WorkerLost").
    pub fn is_worker_lost(&self) -> bool {
        matches!(
            self,
            FlowfileError::WorkerLost { .. } | FlowfileError::Protocol { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, FlowfileError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn protocol_error_counts_as_worker_lost() {
        let err = FlowfileError::Protocol {
            message: "bad frame".into(),
        };
        assert!(err.is_worker_lost());
    }

    #[test]
    fn validation_error_is_not_cache_error() {
        let err = FlowfileError::validation("bad column");
        assert!(!err.is_cache_error());
    }
}
