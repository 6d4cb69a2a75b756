//! Identifiers used throughout the execution core.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// A flow identifier, stable for the lifetime of the flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FlowId(pub u64);

impl fmt::Display for FlowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A node identifier, unique and stable within its owning flow for the
/// flow's lifetime. Two different flows may reuse the same `NodeId` value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(pub u64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A run identifier. Sortable by creation order: a millisecond timestamp
/// prefix followed by a process-local monotonic counter, so run ids compare
/// correctly even across runs started within the same millisecond.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RunId(pub String);

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

static RUN_COUNTER: AtomicU64 = AtomicU64::new(0);

impl RunId {
    /// Generate a new, process-unique, time-sortable run id.
    pub fn generate() -> Self {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis();
        let seq = RUN_COUNTER.fetch_add(1, Ordering::Relaxed);
        RunId(format!("run_{millis:013x}_{seq:06x}"))
    }
}

/// A worker task identifier, unique per submission to the worker client.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TaskId(pub String);

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

static TASK_COUNTER: AtomicU64 = AtomicU64::new(0);

impl TaskId {
    /// Generate a new, process-unique task id.
    pub fn generate() -> Self {
        let seq = TASK_COUNTER.fetch_add(1, Ordering::Relaxed);
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis();
        TaskId(format!("task_{millis:013x}_{seq:06x}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_ids_are_monotonic_within_a_process() {
        let a = RunId::generate();
        let b = RunId::generate();
        assert!(a.0 < b.0, "{a:?} should sort before {b:?}");
    }

    #[test]
    fn task_ids_are_unique() {
        let a = TaskId::generate();
        let b = TaskId::generate();
        assert_ne!(a, b);
    }
}
