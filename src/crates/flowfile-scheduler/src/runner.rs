//! The main dispatch loop (spec §4.3's "Main loop" and "Dispatch of a
//! single node"). Grounded on `langgraph-core::pregel::loop_impl`'s
//! readiness-recompute-on-completion pattern, but without Pregel's
//! synchronized-superstep barrier: newly ready nodes are dispatched the
//! moment their upstreams resolve.

use crate::worker::{WorkerClient, WorkerFailure, WorkerTask};
use crate::{NodeRunState, RunStatus, DEFAULT_SAMPLE_ROWS};
use flowfile_cache::ArtifactCache;
use flowfile_registry::{ArtifactRef, NodeRegistry};
use flowfile_types::{
    Artifact, EffectiveHash, ExecutionMode, Flow, FlowId, NodeId, NodeKind, Port, Schema,
    SettingsHash, SettingsValue, TaskId,
};
use std::collections::{HashMap, HashSet, VecDeque};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// Schema plus a bounded row sample for one node, populated after it
/// materializes (spec §4.3 "Data preview").
#[derive(Debug, Clone)]
pub struct NodePreview {
    pub schema: Schema,
    pub rows: Vec<serde_json::Map<String, serde_json::Value>>,
}

/// Events emitted as a run progresses, forwarded to the Event Bus (C6) by
/// the caller.
#[derive(Debug, Clone)]
pub enum SchedulerEvent {
    NodeStateChanged {
        node_id: NodeId,
        state: NodeRunState,
    },
    NodeProgress {
        node_id: NodeId,
        task_id: TaskId,
        event: crate::worker::ProgressEvent,
    },
    RunFinished {
        status: RunStatus,
    },
}

/// The terminal result of one `Runner::run` call.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub status: RunStatus,
    pub node_states: HashMap<NodeId, NodeRunState>,
    pub previews: HashMap<NodeId, NodePreview>,
}

enum DispatchResult {
    Success(Artifact),
    Cached(Artifact),
    Failed(String),
    Cancelled,
}

pub struct Runner {
    registry: Arc<NodeRegistry>,
    cache: Arc<ArtifactCache>,
    worker: Arc<dyn WorkerClient>,
    preview_rows: u64,
}

impl Runner {
    pub fn new(
        registry: Arc<NodeRegistry>,
        cache: Arc<ArtifactCache>,
        worker: Arc<dyn WorkerClient>,
    ) -> Self {
        Self {
            registry,
            cache,
            worker,
            preview_rows: 1000,
        }
    }

    pub fn with_preview_rows(mut self, rows: u64) -> Self {
        self.preview_rows = rows;
        self
    }

    /// Default parallelism: one worker permit per CPU core (spec §4.3).
    pub fn default_permits() -> usize {
        num_cpus::get().max(1)
    }

    async fn emit(tx: &mpsc::Sender<SchedulerEvent>, event: SchedulerEvent) {
        let _ = tx.send(event).await;
    }

    /// Marks every not-yet-terminal descendant of `failed_node` as
    /// `Skipped` (spec §4.3 "Failure policy"). Nodes outside the
    /// descendant set are untouched and continue independently.
    fn skip_descendants(
        flow: &Flow,
        failed_node: NodeId,
        states: &mut HashMap<NodeId, NodeRunState>,
    ) -> Vec<NodeId> {
        let mut skipped = Vec::new();
        let mut queue: VecDeque<NodeId> = flow
            .outbound_edges(failed_node)
            .into_iter()
            .map(|e| e.to_node)
            .collect();
        let mut seen: HashSet<NodeId> = queue.iter().copied().collect();
        while let Some(node_id) = queue.pop_front() {
            let state = states.entry(node_id).or_insert(NodeRunState::Pending);
            if !state.is_terminal() {
                *state = NodeRunState::Skipped;
                skipped.push(node_id);
            }
            for edge in flow.outbound_edges(node_id) {
                if seen.insert(edge.to_node) {
                    queue.push_back(edge.to_node);
                }
            }
        }
        skipped
    }

    fn is_ready(flow: &Flow, states: &HashMap<NodeId, NodeRunState>, node_id: NodeId) -> bool {
        if states.get(&node_id) != Some(&NodeRunState::Pending) {
            return false;
        }
        flow.inbound_edges(node_id).into_iter().all(|edge| {
            states
                .get(&edge.from_node)
                .is_some_and(|s| s.is_upstream_satisfied())
        })
    }

    async fn capture_preview(
        &self,
        previews: &mut HashMap<NodeId, NodePreview>,
        node_id: NodeId,
        artifact: &Artifact,
    ) {
        match self.worker.preview(artifact, self.preview_rows).await {
            Ok(rows) => {
                previews.insert(
                    node_id,
                    NodePreview {
                        schema: artifact.schema.clone(),
                        rows,
                    },
                );
            }
            Err(e) => {
                tracing::warn!(node_id = %node_id, error = %e, "failed to capture node preview");
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn spawn_node(
        &self,
        in_flight: &mut JoinSet<(NodeId, DispatchResult)>,
        flow: &Flow,
        flow_id: FlowId,
        node_id: NodeId,
        sample_rows: Option<u64>,
        artifacts: &HashMap<NodeId, Artifact>,
        semaphore: Arc<Semaphore>,
        cancel: CancellationToken,
        event_tx: mpsc::Sender<SchedulerEvent>,
    ) {
        let node = &flow.nodes[&node_id];
        let kind = node.kind.clone();
        let settings = node.settings.clone();

        let mut ordered: Vec<(u32, Artifact)> = flow
            .inbound_edges(node_id)
            .into_iter()
            .map(|edge| {
                let port = match edge.to_port {
                    Port::Input(n) | Port::Output(n) => n,
                };
                let artifact = artifacts
                    .get(&edge.from_node)
                    .cloned()
                    .expect("upstream artifact missing for a node the runner marked ready");
                (port, artifact)
            })
            .collect();
        ordered.sort_by_key(|(port, _)| *port);
        let inputs: Vec<Artifact> = ordered.into_iter().map(|(_, a)| a).collect();

        let registry = self.registry.clone();
        let cache = self.cache.clone();
        let worker = self.worker.clone();

        in_flight.spawn(async move {
            let outcome = dispatch_one(
                registry, cache, worker, flow_id, node_id, kind, settings, inputs, sample_rows,
                semaphore, cancel, event_tx,
            )
            .await;
            (node_id, outcome)
        });
    }

    pub async fn run(
        &self,
        flow: &Flow,
        flow_id: FlowId,
        mode: ExecutionMode,
        sample_rows_cap: u64,
        permits: usize,
        cancel: CancellationToken,
        event_tx: mpsc::Sender<SchedulerEvent>,
    ) -> RunOutcome {
        let sample_rows = crate::state::sample_rows_for(mode, sample_rows_cap);
        let semaphore = Arc::new(Semaphore::new(permits.max(1)));
        let mut states: HashMap<NodeId, NodeRunState> = flow
            .nodes
            .keys()
            .map(|&id| (id, NodeRunState::Pending))
            .collect();
        let mut artifacts: HashMap<NodeId, Artifact> = HashMap::new();
        let mut previews: HashMap<NodeId, NodePreview> = HashMap::new();
        let mut in_flight: JoinSet<(NodeId, DispatchResult)> = JoinSet::new();
        let mut ready: VecDeque<NodeId> = flow.source_nodes().into_iter().collect();
        let mut any_failed = false;
        let mut any_cancelled = false;

        loop {
            while let Some(node_id) = ready.pop_front() {
                if states.get(&node_id) != Some(&NodeRunState::Pending) {
                    continue;
                }
                if cancel.is_cancelled() {
                    states.insert(node_id, NodeRunState::Cancelled);
                    any_cancelled = true;
                    Self::emit(
                        &event_tx,
                        SchedulerEvent::NodeStateChanged {
                            node_id,
                            state: NodeRunState::Cancelled,
                        },
                    )
                    .await;
                    continue;
                }
                states.insert(node_id, NodeRunState::Running);
                Self::emit(
                    &event_tx,
                    SchedulerEvent::NodeStateChanged {
                        node_id,
                        state: NodeRunState::Running,
                    },
                )
                .await;
                self.spawn_node(
                    &mut in_flight,
                    flow,
                    flow_id,
                    node_id,
                    sample_rows,
                    &artifacts,
                    semaphore.clone(),
                    cancel.child_token(),
                    event_tx.clone(),
                );
            }

            if in_flight.is_empty() {
                break;
            }

            let Some(joined) = in_flight.join_next().await else {
                break;
            };
            let (node_id, outcome) = match joined {
                Ok(v) => v,
                Err(join_error) => {
                    tracing::error!(error = %join_error, "node dispatch task panicked");
                    continue;
                }
            };

            match outcome {
                DispatchResult::Success(artifact) => {
                    states.insert(node_id, NodeRunState::Success);
                    Self::emit(
                        &event_tx,
                        SchedulerEvent::NodeStateChanged { node_id, state: NodeRunState::Success },
                    )
                    .await;
                    self.capture_preview(&mut previews, node_id, &artifact).await;
                    artifacts.insert(node_id, artifact);
                    for edge in flow.outbound_edges(node_id) {
                        if Self::is_ready(flow, &states, edge.to_node) {
                            ready.push_back(edge.to_node);
                        }
                    }
                }
                DispatchResult::Cached(artifact) => {
                    states.insert(node_id, NodeRunState::Cached);
                    Self::emit(
                        &event_tx,
                        SchedulerEvent::NodeStateChanged { node_id, state: NodeRunState::Cached },
                    )
                    .await;
                    self.capture_preview(&mut previews, node_id, &artifact).await;
                    artifacts.insert(node_id, artifact);
                    for edge in flow.outbound_edges(node_id) {
                        if Self::is_ready(flow, &states, edge.to_node) {
                            ready.push_back(edge.to_node);
                        }
                    }
                }
                DispatchResult::Failed(message) => {
                    states.insert(node_id, NodeRunState::Failed);
                    any_failed = true;
                    tracing::warn!(flow_id = %flow_id, node_id = %node_id, error = %message, "node failed");
                    Self::emit(
                        &event_tx,
                        SchedulerEvent::NodeStateChanged { node_id, state: NodeRunState::Failed },
                    )
                    .await;
                    for skipped_id in Self::skip_descendants(flow, node_id, &mut states) {
                        Self::emit(
                            &event_tx,
                            SchedulerEvent::NodeStateChanged {
                                node_id: skipped_id,
                                state: NodeRunState::Skipped,
                            },
                        )
                        .await;
                    }
                }
                DispatchResult::Cancelled => {
                    states.insert(node_id, NodeRunState::Cancelled);
                    any_cancelled = true;
                    Self::emit(
                        &event_tx,
                        SchedulerEvent::NodeStateChanged {
                            node_id,
                            state: NodeRunState::Cancelled,
                        },
                    )
                    .await;
                }
            }
        }

        let status = if any_failed {
            RunStatus::Failed
        } else if any_cancelled {
            RunStatus::Cancelled
        } else {
            RunStatus::Success
        };
        Self::emit(&event_tx, SchedulerEvent::RunFinished { status }).await;

        RunOutcome {
            status,
            node_states: states,
            previews,
        }
    }
}

#[allow(clippy::too_many_arguments)]
async fn dispatch_one(
    registry: Arc<NodeRegistry>,
    cache: Arc<ArtifactCache>,
    worker: Arc<dyn WorkerClient>,
    flow_id: FlowId,
    node_id: NodeId,
    kind: NodeKind,
    settings: SettingsValue,
    inputs: Vec<Artifact>,
    sample_rows: Option<u64>,
    semaphore: Arc<Semaphore>,
    cancel: CancellationToken,
    event_tx: mpsc::Sender<SchedulerEvent>,
) -> DispatchResult {
    let descriptor = match registry.get(&kind) {
        Ok(d) => d.clone(),
        Err(e) => return DispatchResult::Failed(e.to_string()),
    };

    let settings_hash = SettingsHash::compute(kind.as_str(), &settings.canonical_bytes());
    let upstream_hashes: Vec<_> = inputs.iter().map(|a| a.content_hash).collect();
    let effective_hash = EffectiveHash::compose(settings_hash, &upstream_hashes);

    if let Some(artifact) = cache.lookup(&effective_hash).await {
        return DispatchResult::Cached(artifact);
    }

    if cancel.is_cancelled() {
        return DispatchResult::Cancelled;
    }

    let artifact_refs: Vec<ArtifactRef> = inputs
        .iter()
        .map(|a| ArtifactRef {
            path: a.path.clone(),
            format: a.format,
        })
        .collect();
    let plan = match descriptor.build_plan(&settings, &artifact_refs) {
        Ok(p) => p,
        Err(e) => return DispatchResult::Failed(e.to_string()),
    };

    let _permit = match semaphore.acquire_owned().await {
        Ok(p) => p,
        Err(_) => return DispatchResult::Cancelled,
    };

    let (progress_tx, mut progress_rx) = mpsc::channel(32);
    let task_id = TaskId::generate();
    let relay_task_id = task_id.clone();
    let relay_tx = event_tx.clone();
    let relay = tokio::spawn(async move {
        while let Some(event) = progress_rx.recv().await {
            let _ = relay_tx
                .send(SchedulerEvent::NodeProgress {
                    node_id,
                    task_id: relay_task_id.clone(),
                    event,
                })
                .await;
        }
    });

    let result = worker
        .submit(WorkerTask {
            task_id,
            flow_id,
            node_id,
            plan,
            sample_rows,
            progress: progress_tx,
            cancel,
        })
        .await;
    relay.abort();

    match result {
        Ok(artifact) => {
            if let Err(e) = cache.put(effective_hash, artifact.clone()).await {
                tracing::warn!(node_id = %node_id, error = %e, "failed to persist artifact to cache");
            }
            DispatchResult::Success(artifact)
        }
        Err(WorkerFailure::Cancelled) => DispatchResult::Cancelled,
        Err(other) => DispatchResult::Failed(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowfile_cache::ArtifactCache;
    use flowfile_registry::NodeRegistry;
    use flowfile_types::{ArtifactFormat, ColumnSchema, ContentHash, Digest, Node, Port, Position};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Deterministic stand-in for the out-of-process worker: turns a plan
    /// into an artifact keyed off the dispatched node, without touching a
    /// real polars engine. `fail_node`, when set, makes `submit` return an
    /// `ExecutionError` for exactly that node so failure propagation can be
    /// exercised.
    struct FakeWorkerClient {
        fail_node: Option<NodeId>,
        submit_count: AtomicUsize,
    }

    impl FakeWorkerClient {
        fn new() -> Self {
            Self { fail_node: None, submit_count: AtomicUsize::new(0) }
        }

        fn failing(node_id: NodeId) -> Self {
            Self { fail_node: Some(node_id), submit_count: AtomicUsize::new(0) }
        }
    }

    #[async_trait::async_trait]
    impl WorkerClient for FakeWorkerClient {
        async fn submit(&self, task: WorkerTask) -> Result<Artifact, WorkerFailure> {
            self.submit_count.fetch_add(1, Ordering::SeqCst);
            let _ = task.progress.send(crate::worker::ProgressEvent::Started).await;
            if self.fail_node == Some(task.node_id) {
                return Err(WorkerFailure::ExecutionError {
                    message: "boom".into(),
                    traceback: None,
                });
            }
            Ok(Artifact {
                path: PathBuf::from(format!("/tmp/{}.parquet", task.node_id)),
                format: ArtifactFormat::Parquet,
                schema: Vec::<ColumnSchema>::new(),
                row_count: 1,
                content_hash: ContentHash(Digest::of(format!("{:?}", task.plan).as_bytes())),
                byte_size: 16,
            })
        }

        async fn cancel(&self, _task_id: &TaskId) {}

        async fn preview(
            &self,
            _artifact: &Artifact,
            _max_rows: u64,
        ) -> Result<Vec<serde_json::Map<String, serde_json::Value>>, WorkerFailure> {
            Ok(Vec::new())
        }
    }

    fn manual_input_node(id: NodeId) -> Node {
        let mut node = Node::new(id, "manual_input", Position { x: 0.0, y: 0.0 });
        node.settings = SettingsValue::new(json!({ "rows": [{"a": 1}, {"a": 2}] }));
        node
    }

    fn head_node(id: NodeId, n: u64) -> Node {
        let mut node = Node::new(id, "head", Position { x: 0.0, y: 0.0 });
        node.settings = SettingsValue::new(json!({ "n": n }));
        node
    }

    fn chain_flow() -> Flow {
        let mut flow = Flow::new(FlowId(1), "chain");
        flow.nodes.insert(NodeId(1), manual_input_node(NodeId(1)));
        flow.nodes.insert(NodeId(2), head_node(NodeId(2), 1));
        flow.edges.push(flowfile_types::Edge::new(
            NodeId(1),
            Port::Output(0),
            NodeId(2),
            Port::Input(0),
        ));
        flow
    }

    #[tokio::test]
    async fn runs_a_chain_to_success() {
        let dir = tempfile::tempdir().expect("tempdir");
        let flow = chain_flow();
        let runner = Runner::new(
            Arc::new(NodeRegistry::built_in()),
            Arc::new(ArtifactCache::new(dir.path())),
            Arc::new(FakeWorkerClient::new()),
        );
        let (tx, _rx) = mpsc::channel(64);
        let outcome = runner
            .run(
                &flow,
                FlowId(1),
                ExecutionMode::Development,
                DEFAULT_SAMPLE_ROWS,
                2,
                CancellationToken::new(),
                tx,
            )
            .await;

        assert_eq!(outcome.status, RunStatus::Success);
        assert_eq!(outcome.node_states[&NodeId(1)], NodeRunState::Success);
        assert_eq!(outcome.node_states[&NodeId(2)], NodeRunState::Success);
    }

    #[tokio::test]
    async fn a_failed_node_skips_its_descendants() {
        let dir = tempfile::tempdir().expect("tempdir");
        let flow = chain_flow();
        let runner = Runner::new(
            Arc::new(NodeRegistry::built_in()),
            Arc::new(ArtifactCache::new(dir.path())),
            Arc::new(FakeWorkerClient::failing(NodeId(1))),
        );
        let (tx, _rx) = mpsc::channel(64);
        let outcome = runner
            .run(
                &flow,
                FlowId(1),
                ExecutionMode::Development,
                DEFAULT_SAMPLE_ROWS,
                2,
                CancellationToken::new(),
                tx,
            )
            .await;

        assert_eq!(outcome.status, RunStatus::Failed);
        assert_eq!(outcome.node_states[&NodeId(1)], NodeRunState::Failed);
        assert_eq!(outcome.node_states[&NodeId(2)], NodeRunState::Skipped);
    }

    #[tokio::test]
    async fn a_cache_hit_skips_the_worker() {
        let dir = tempfile::tempdir().expect("tempdir");
        let flow = chain_flow();
        let cache = Arc::new(ArtifactCache::new(dir.path()));

        let settings = manual_input_node(NodeId(1)).settings;
        let settings_hash = SettingsHash::compute("manual_input", &settings.canonical_bytes());
        let effective_hash = EffectiveHash::compose(settings_hash, &[]);
        let prebuilt = Artifact {
            path: PathBuf::from("/tmp/prebuilt.parquet"),
            format: ArtifactFormat::Parquet,
            schema: Vec::<ColumnSchema>::new(),
            row_count: 2,
            content_hash: ContentHash(Digest::of(b"prebuilt")),
            byte_size: 8,
        };
        cache.put(effective_hash, prebuilt).await.expect("seed cache");

        let worker = Arc::new(FakeWorkerClient::new());
        let runner = Runner::new(Arc::new(NodeRegistry::built_in()), cache, worker.clone());
        let (tx, _rx) = mpsc::channel(64);
        let outcome = runner
            .run(
                &flow,
                FlowId(1),
                ExecutionMode::Development,
                DEFAULT_SAMPLE_ROWS,
                2,
                CancellationToken::new(),
                tx,
            )
            .await;

        assert_eq!(outcome.status, RunStatus::Success);
        assert_eq!(outcome.node_states[&NodeId(1)], NodeRunState::Cached);
        // Only the downstream `head` node should have reached the worker.
        assert_eq!(worker.submit_count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn cancelling_before_dispatch_marks_pending_nodes_cancelled() {
        let dir = tempfile::tempdir().expect("tempdir");
        let flow = chain_flow();
        let runner = Runner::new(
            Arc::new(NodeRegistry::built_in()),
            Arc::new(ArtifactCache::new(dir.path())),
            Arc::new(FakeWorkerClient::new()),
        );
        let cancel = CancellationToken::new();
        cancel.cancel();
        let (tx, _rx) = mpsc::channel(64);
        let outcome = runner
            .run(
                &flow,
                FlowId(1),
                ExecutionMode::Development,
                DEFAULT_SAMPLE_ROWS,
                2,
                cancel,
                tx,
            )
            .await;

        assert_eq!(outcome.status, RunStatus::Cancelled);
        assert_eq!(outcome.node_states[&NodeId(1)], NodeRunState::Cancelled);
    }
}
