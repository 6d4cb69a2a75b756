//! The Runner (C3): executes a frozen flow snapshot, tracking per-node
//! readiness, dispatching through a bounded permit pool, and propagating
//! failure as `Skipped` descendants. Grounded on
//! `langgraph-core::pregel`'s superstep loop (`loop_impl`, `executor`,
//! `algo`), generalized from Pregel's synchronized-superstep barrier to
//! continuous dispatch-as-nodes-complete (spec §4.3 step 2 is explicit that
//! newly ready nodes are dispatched immediately, not held for a barrier).

mod error;
mod runner;
mod state;
mod worker;

pub use error::{SchedulerError, Result};
pub use runner::{NodePreview, RunOutcome, Runner, SchedulerEvent};
pub use state::{sample_rows_for, NodeRunState, RunStatus, DEFAULT_SAMPLE_ROWS};
pub use worker::{ProgressEvent, WorkerClient, WorkerFailure, WorkerTask};
