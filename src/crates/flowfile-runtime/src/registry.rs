//! `RunRegistry` (C6): `start_run`/`cancel`/`status`/`subscribe` exactly as
//! spec §4.6, plus the retention sweep of terminal runs. Grounded on
//! `orchestrator::api::ws::pool`'s janitor idiom (a `tokio::time::interval`
//! loop pruning stale entries) and `BroadcastState`'s owner-of-the-fanout
//! role, generalized from one process-wide channel to one `EventBus` per
//! run with `GraphStore::try_set_run_active` providing the "one active run
//! per flow" atomicity instead of a registry-local flag.

use crate::bus::EventBus;
use crate::error::{Result, RuntimeError};
use crate::events::RunEvent;
use dashmap::DashMap;
use flowfile_cache::ArtifactCache;
use flowfile_graph::GraphStore;
use flowfile_registry::NodeRegistry;
use flowfile_scheduler::{
    NodePreview, NodeRunState, ProgressEvent, Runner, RunStatus, SchedulerEvent, WorkerClient,
};
use flowfile_types::{ExecutionMode, FlowId, NodeId, RunId};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio_stream::StreamExt;
use tokio_util::sync::CancellationToken;

/// Default retention window for a finished run's record (spec §4.6).
/// Overridable via `FLOWFILE_RUN_RETENTION_SEC`.
pub const DEFAULT_RETENTION: Duration = Duration::from_secs(3600);

const LOG_TAIL_CAPACITY: usize = 200;

/// Point-in-time view returned by `status` (spec §4.6's `Snapshot`).
#[derive(Debug, Clone)]
pub struct RunSnapshot {
    pub run_id: RunId,
    pub flow_id: FlowId,
    pub status: RunStatus,
    pub node_states: HashMap<NodeId, NodeRunState>,
    pub log_tail: Vec<String>,
}

struct RunHandle {
    flow_id: FlowId,
    bus: EventBus,
    status: parking_lot::Mutex<RunStatus>,
    node_states: parking_lot::Mutex<HashMap<NodeId, NodeRunState>>,
    /// Per-node schema + row sample, populated as each node materializes
    /// (spec §4.3: "the Runner keeps up to N rows... indexed by node id").
    /// Retained after the run finishes so `GET /node/data` keeps serving
    /// the last successful preview until a new run overwrites it.
    previews: parking_lot::Mutex<HashMap<NodeId, NodePreview>>,
    log_tail: parking_lot::Mutex<std::collections::VecDeque<String>>,
    cancel: CancellationToken,
    finished_at: parking_lot::Mutex<Option<Instant>>,
}

impl RunHandle {
    fn new(flow_id: FlowId) -> Self {
        Self {
            flow_id,
            bus: EventBus::new(),
            status: parking_lot::Mutex::new(RunStatus::Running),
            node_states: parking_lot::Mutex::new(HashMap::new()),
            previews: parking_lot::Mutex::new(HashMap::new()),
            log_tail: parking_lot::Mutex::new(std::collections::VecDeque::with_capacity(LOG_TAIL_CAPACITY)),
            cancel: CancellationToken::new(),
            finished_at: parking_lot::Mutex::new(None),
        }
    }

    fn push_log(&self, line: String) {
        let mut tail = self.log_tail.lock();
        if tail.len() >= LOG_TAIL_CAPACITY {
            tail.pop_front();
        }
        tail.push_back(line);
    }

}

/// The process-wide run tracker. One instance is shared (via `Arc`) across
/// the server; `flowfile-server` wires it to HTTP/WS handlers.
pub struct RunRegistry {
    graph: Arc<GraphStore>,
    registry: Arc<NodeRegistry>,
    cache: Arc<ArtifactCache>,
    worker: Arc<dyn WorkerClient>,
    runs: DashMap<RunId, Arc<RunHandle>>,
    active_by_flow: DashMap<FlowId, RunId>,
    /// Unlike `active_by_flow`, never cleared on completion — previews and
    /// node states from the last run stay queryable after it finishes.
    latest_by_flow: DashMap<FlowId, RunId>,
    retention: Duration,
}

impl RunRegistry {
    pub fn new(
        graph: Arc<GraphStore>,
        registry: Arc<NodeRegistry>,
        cache: Arc<ArtifactCache>,
        worker: Arc<dyn WorkerClient>,
    ) -> Arc<Self> {
        Self::with_retention(graph, registry, cache, worker, DEFAULT_RETENTION)
    }

    pub fn with_retention(
        graph: Arc<GraphStore>,
        registry: Arc<NodeRegistry>,
        cache: Arc<ArtifactCache>,
        worker: Arc<dyn WorkerClient>,
        retention: Duration,
    ) -> Arc<Self> {
        let this = Arc::new(Self {
            graph,
            registry,
            cache,
            worker,
            runs: DashMap::new(),
            active_by_flow: DashMap::new(),
            latest_by_flow: DashMap::new(),
            retention,
        });
        this.clone().spawn_retention_sweep();
        this
    }

    /// Background janitor pruning terminal runs past the retention TTL,
    /// unless a new run has since started on the same flow (in which case
    /// `start_run` already evicted the prior record eagerly).
    fn spawn_retention_sweep(self: Arc<Self>) {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(60));
            loop {
                interval.tick().await;
                let retention = self.retention;
                let stale: Vec<RunId> = self
                    .runs
                    .iter()
                    .filter_map(|entry| {
                        let handle = entry.value();
                        let finished_at = *handle.finished_at.lock();
                        match finished_at {
                            Some(at) if at.elapsed() >= retention => Some(entry.key().clone()),
                            _ => None,
                        }
                    })
                    .collect();
                for run_id in stale {
                    tracing::debug!(run_id = %run_id, "retention sweep evicting run record");
                    self.runs.remove(&run_id);
                }
            }
        });
    }

    /// Atomic per spec §4.6: fails if another run is already active for
    /// the flow, deferring to `GraphStore`'s run-active flag rather than
    /// keeping a second source of truth.
    /// Takes `Arc<Self>` by value (cheap clone at call sites) rather than
    /// `&self`, since the spawned run task needs to outlive this call and
    /// still reach back into the registry to clear `active_by_flow` on
    /// completion.
    pub async fn start_run(self: Arc<Self>, flow_id: FlowId, mode: ExecutionMode) -> Result<RunId> {
        if !self.graph.try_set_run_active(flow_id).await? {
            return Err(RuntimeError::AlreadyRunning);
        }

        let mut flow = self.graph.get_flow(flow_id).await?;
        flow.execution_mode = mode;

        let run_id = RunId::generate();
        let handle = Arc::new(RunHandle::new(flow_id));
        self.runs.insert(run_id.clone(), handle.clone());
        self.active_by_flow.insert(flow_id, run_id.clone());
        self.latest_by_flow.insert(flow_id, run_id.clone());

        let runner = Runner::new(self.registry.clone(), self.cache.clone(), self.worker.clone());
        let permits = Runner::default_permits();
        let sample_cap = flowfile_scheduler::DEFAULT_SAMPLE_ROWS;
        let graph = self.graph.clone();
        let cancel = handle.cancel.clone();
        let run_id_for_task = run_id.clone();
        let this = self.clone();

        tokio::spawn(async move {
            let started_seq = handle.bus.next_seq();
            handle
                .bus
                .publish(RunEvent::RunStarted { run_id: run_id_for_task.clone(), seq: started_seq })
                .await;

            let (tx, mut rx) = mpsc::channel(256);
            let relay_handle = handle.clone();
            let relay_run_id = run_id_for_task.clone();
            let relay = tokio::spawn(async move {
                while let Some(event) = rx.recv().await {
                    translate_and_publish(&relay_handle, &relay_run_id, event).await;
                }
            });

            let outcome = runner.run(&flow, flow_id, mode, sample_cap, permits, cancel, tx).await;
            let _ = relay.await;

            *handle.status.lock() = outcome.status;
            *handle.node_states.lock() = outcome.node_states;
            *handle.previews.lock() = outcome.previews;
            *handle.finished_at.lock() = Some(Instant::now());

            let finished_seq = handle.bus.next_seq();
            handle
                .bus
                .publish(RunEvent::RunFinished {
                    run_id: run_id_for_task.clone(),
                    seq: finished_seq,
                    status: outcome.status,
                })
                .await;

            let _ = graph.clear_run_active(flow_id).await;
            this.active_by_flow
                .remove_if(&flow_id, |_, active| *active == run_id_for_task);
        });

        Ok(run_id)
    }

    /// Idempotent: cancelling a run that is already terminal, or unknown,
    /// is a no-op rather than an error (spec §4.6).
    pub fn cancel(&self, run_id: &RunId) {
        if let Some(handle) = self.runs.get(run_id) {
            handle.cancel.cancel();
        }
    }

    pub fn status(&self, run_id: &RunId) -> Result<RunSnapshot> {
        let handle = self
            .runs
            .get(run_id)
            .ok_or_else(|| RuntimeError::UnknownRun(run_id.clone()))?;
        let snapshot = RunSnapshot {
            run_id: run_id.clone(),
            flow_id: handle.flow_id,
            status: *handle.status.lock(),
            node_states: handle.node_states.lock().clone(),
            log_tail: handle.log_tail.lock().iter().cloned().collect(),
        };
        Ok(snapshot)
    }

    /// Replay-from-start then live: the returned stream first yields every
    /// event published so far, then continues with new events as they
    /// arrive (spec §4.6: "replay from the start of the run until caller
    /// catches up").
    pub fn subscribe(
        &self,
        run_id: &RunId,
    ) -> Result<impl tokio_stream::Stream<Item = RunEvent>> {
        let handle = self
            .runs
            .get(run_id)
            .ok_or_else(|| RuntimeError::UnknownRun(run_id.clone()))?;
        let (history, live) = handle.bus.subscribe();
        Ok(tokio_stream::iter(history).chain(live))
    }

    pub fn active_run_for(&self, flow_id: FlowId) -> Option<RunId> {
        self.active_by_flow.get(&flow_id).map(|e| e.value().clone())
    }

    /// The most recently started run for a flow, active or finished
    /// (spec §6's `GET /flow/run_status` serves the "latest run snapshot",
    /// not only an in-flight one).
    pub fn latest_run_for(&self, flow_id: FlowId) -> Option<RunId> {
        self.latest_by_flow.get(&flow_id).map(|e| e.value().clone())
    }

    /// The cached schema + row sample for `node_id` as of the flow's most
    /// recent run, if that node successfully materialized at least once
    /// (spec §6's `GET /node/data`). Returns `None` if the flow has never
    /// run or the node never reached a materialized state.
    pub fn node_preview(&self, flow_id: FlowId, node_id: NodeId) -> Option<NodePreview> {
        let run_id = self.latest_by_flow.get(&flow_id)?;
        let handle = self.runs.get(run_id.value())?;
        let preview = handle.previews.lock().get(&node_id).cloned();
        preview
    }

    /// Whether the flow has ever completed a run since server startup,
    /// distinguishing "never run" from "ran but this node has no preview"
    /// for `GET /node/data`'s `has_run_with_current_setup` field.
    pub fn has_ever_run(&self, flow_id: FlowId) -> bool {
        self.latest_by_flow.contains_key(&flow_id)
    }
}

async fn translate_and_publish(handle: &Arc<RunHandle>, run_id: &RunId, event: SchedulerEvent) {
    match event {
        SchedulerEvent::NodeStateChanged { node_id, state } => {
            handle.node_states.lock().insert(node_id, state);
            let seq = handle.bus.next_seq();
            let run_event = if state == NodeRunState::Running {
                RunEvent::NodeStarted { run_id: run_id.clone(), node_id, seq }
            } else {
                RunEvent::NodeFinished { run_id: run_id.clone(), node_id, seq, state }
            };
            handle.bus.publish(run_event).await;
        }
        SchedulerEvent::NodeProgress { node_id, task_id, event } => match event {
            ProgressEvent::Started => {
                handle.bus.publish(RunEvent::NodeProgress {
                    run_id: run_id.clone(),
                    node_id,
                    task_id,
                    seq: handle.bus.next_seq(),
                    rows: None,
                    bytes: None,
                    phase: Some("started".into()),
                }).await;
            }
            ProgressEvent::Progress { rows, bytes, phase } => {
                handle.bus.publish(RunEvent::NodeProgress {
                    run_id: run_id.clone(),
                    node_id,
                    task_id,
                    seq: handle.bus.next_seq(),
                    rows: Some(rows),
                    bytes: Some(bytes),
                    phase: Some(phase),
                }).await;
            }
            ProgressEvent::Log { level, message } => {
                handle.push_log(format!("[{level}] {message}"));
                handle.bus.publish(RunEvent::NodeLog {
                    run_id: run_id.clone(),
                    node_id,
                    seq: handle.bus.next_seq(),
                    level: level.to_string(),
                    message,
                }).await;
            }
        },
        SchedulerEvent::RunFinished { .. } => {
            // The registry's own `RunFinished` publish (carrying the
            // aggregated `RunOutcome.status`) is authoritative; the
            // scheduler's copy is informational only and not re-emitted.
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowfile_registry::NodeRegistry;
    use flowfile_scheduler::{WorkerFailure, WorkerTask};
    use flowfile_types::{
        Artifact, ArtifactFormat, ColumnSchema, ContentHash, Digest, Edge, Port, Position,
    };
    use serde_json::json;
    use tokio_stream::StreamExt;

    struct FakeWorkerClient {
        /// When set, `submit` blocks until notified — lets a test hold a
        /// run open deterministically instead of racing its completion.
        gate: Option<Arc<tokio::sync::Notify>>,
    }

    impl FakeWorkerClient {
        fn new() -> Self {
            Self { gate: None }
        }

        fn gated(gate: Arc<tokio::sync::Notify>) -> Self {
            Self { gate: Some(gate) }
        }
    }

    #[async_trait::async_trait]
    impl WorkerClient for FakeWorkerClient {
        async fn submit(&self, task: WorkerTask) -> std::result::Result<Artifact, WorkerFailure> {
            let _ = task.progress.send(ProgressEvent::Started).await;
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            Ok(Artifact {
                path: std::path::PathBuf::from(format!("/tmp/{}.parquet", task.node_id)),
                format: ArtifactFormat::Parquet,
                schema: Vec::<ColumnSchema>::new(),
                row_count: 1,
                content_hash: ContentHash(Digest::of(format!("{:?}", task.plan).as_bytes())),
                byte_size: 16,
            })
        }

        async fn cancel(&self, _task_id: &flowfile_types::TaskId) {}

        async fn preview(
            &self,
            _artifact: &Artifact,
            _max_rows: u64,
        ) -> std::result::Result<Vec<serde_json::Map<String, serde_json::Value>>, WorkerFailure> {
            Ok(Vec::new())
        }
    }

    async fn setup() -> (Arc<RunRegistry>, FlowId) {
        setup_with_worker(Arc::new(FakeWorkerClient::new())).await
    }

    async fn setup_with_worker(worker: Arc<dyn WorkerClient>) -> (Arc<RunRegistry>, FlowId) {
        let registry = Arc::new(NodeRegistry::built_in());
        let graph = Arc::new(GraphStore::new(registry.clone()));
        let dir = tempfile::tempdir().expect("tempdir");
        let cache = Arc::new(ArtifactCache::new(dir.path()));

        let flow_id = graph.create_flow("t").await;
        let src = graph
            .add_node(flow_id, "manual_input", Position { x: 0.0, y: 0.0 })
            .await
            .expect("add manual_input");
        graph
            .update_settings(flow_id, src, flowfile_types::SettingsValue::new(json!({ "rows": [{"a": 1}] })))
            .await
            .expect("settings");
        let head = graph
            .add_node(flow_id, "head", Position { x: 1.0, y: 0.0 })
            .await
            .expect("add head");
        graph
            .update_settings(flow_id, head, flowfile_types::SettingsValue::new(json!({ "n": 1 })))
            .await
            .expect("settings");
        graph
            .add_edge(flow_id, Edge::new(src, Port::Output(0), head, Port::Input(0)))
            .await
            .expect("add edge");

        let runtime = RunRegistry::new(graph, registry, cache, worker);
        (runtime, flow_id)
    }

    #[tokio::test]
    async fn a_run_reaches_success_and_emits_run_finished() {
        let (runtime, flow_id) = setup().await;
        let run_id = runtime
            .clone()
            .start_run(flow_id, ExecutionMode::Development)
            .await
            .expect("start_run");

        let mut events = runtime.subscribe(&run_id).expect("subscribe");
        let mut saw_run_finished = false;
        while let Some(event) = events.next().await {
            if matches!(event, RunEvent::RunFinished { .. }) {
                saw_run_finished = true;
                break;
            }
        }
        assert!(saw_run_finished);

        let snapshot = runtime.status(&run_id).expect("status");
        assert_eq!(snapshot.status, RunStatus::Success);
    }

    #[tokio::test]
    async fn a_second_run_on_the_same_flow_is_rejected_while_active() {
        // Gate the worker so the first run's only node stays in flight for
        // as long as the test needs, instead of racing its completion.
        let gate = Arc::new(tokio::sync::Notify::new());
        let (runtime, flow_id) = setup_with_worker(Arc::new(FakeWorkerClient::gated(gate.clone()))).await;

        let _run_id = runtime
            .clone()
            .start_run(flow_id, ExecutionMode::Development)
            .await
            .expect("start_run");

        let rejected = matches!(
            runtime.clone().start_run(flow_id, ExecutionMode::Development).await,
            Err(RuntimeError::AlreadyRunning)
        );

        gate.notify_waiters();
        assert!(rejected, "expected AlreadyRunning while the first run is active");
    }

    #[tokio::test]
    async fn cancelling_an_unknown_run_is_a_harmless_no_op() {
        let (runtime, _flow_id) = setup().await;
        runtime.cancel(&RunId("run_does_not_exist".into()));
    }
}
