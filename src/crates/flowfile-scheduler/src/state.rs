use serde::{Deserialize, Serialize};

/// Per-node run state, tracked by the Runner across the lifetime of one run
/// (spec §4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeRunState {
    Pending,
    Ready,
    Running,
    Success,
    Cached,
    Failed,
    Cancelled,
    Skipped,
}

impl NodeRunState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            NodeRunState::Success
                | NodeRunState::Cached
                | NodeRunState::Failed
                | NodeRunState::Cancelled
                | NodeRunState::Skipped
        )
    }

    pub fn is_upstream_satisfied(self) -> bool {
        matches!(self, NodeRunState::Success | NodeRunState::Cached)
    }
}

/// A run's aggregate terminal status (spec §4.3 step 4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    Success,
    Cancelled,
    Failed,
}

/// Open Question (spec §9): the source's `Development`-mode row-sampling
/// default isn't documented consistently. 10,000 rows, generous enough for
/// a UI preview without re-reading a multi-gigabyte source; configurable
/// per spec's instruction to "expose it as configuration" (see DESIGN.md).
pub const DEFAULT_SAMPLE_ROWS: u64 = 10_000;

/// Resolves the per-run source row cap from a flow's execution mode:
/// `Development` truncates every source read to `cap` rows so the whole
/// pipeline can run eagerly against a representative sample; `Performance`
/// runs against full inputs with no cap.
pub fn sample_rows_for(mode: flowfile_types::ExecutionMode, cap: u64) -> Option<u64> {
    match mode {
        flowfile_types::ExecutionMode::Development => Some(cap),
        flowfile_types::ExecutionMode::Performance => None,
    }
}
