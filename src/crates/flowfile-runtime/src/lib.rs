//! The Run Registry & Event Bus (C6): owns the lifecycle of a flow run
//! from `start_run` to its terminal `RunFinished`, and multiplexes the
//! scheduler's progress into a replay-capable, backpressure-aware stream
//! per subscriber (spec §4.6, §5). Grounded on
//! `orchestrator::api::ws` (`BroadcastState`, `replay::EventHistory`,
//! `backpressure::ClientBackpressure`), generalized from one process-wide
//! channel to one bounded channel per run.

mod bus;
mod error;
mod events;
mod registry;

pub use error::{Result, RuntimeError};
pub use events::RunEvent;
pub use flowfile_scheduler::NodePreview;
pub use registry::{RunRegistry, RunSnapshot, DEFAULT_RETENTION};
