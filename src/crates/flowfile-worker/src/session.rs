//! One TCP connection's worker state machine (spec §4.3: `Idle →
//! Accepting → Executing → Reporting → Idle`), grounded on
//! `orca::tools::task_executor`'s single-shot execute-then-report loop and
//! `tooling::runtime::messages`'s heartbeat handling.
//!
//! A connection processes one task at a time — the worker client holds a
//! pool of connections (spec §4.4) for concurrency, so there is no need for
//! a single connection to interleave `start` frames. The frame stream is
//! still polled continuously while a task runs (rather than being set
//! aside for the duration of execution), so `ping`/`cancel`/`preview`
//! frames the client sends mid-task are answered promptly instead of
//! queuing up behind a possibly long-running task. Declaring the
//! connection dead on a missed pong is `flowfile-worker-client`'s job, not
//! this side's — a closed socket surfaces here as a `None`/`Err` from the
//! frame stream regardless.

use crate::config::{WorkerConfig, PROGRESS_INTERVAL};
use crate::error::WorkerError;
use crate::evaluator::{self, EvalContext, EvalOutput};
use crate::store;
use flowfile_registry::plan::{ArtifactRef, PlanOp, WriteMode};
use flowfile_types::{Artifact, ArtifactFormat, TaskId};
use flowfile_worker_proto::{Frame, FrameCodec, FrameErrorKind, KEEPALIVE_INTERVAL};
use futures::{SinkExt, StreamExt};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::task::{JoinError, JoinHandle};
use tokio::time::interval;
use tokio_util::codec::Framed;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Idle,
    Accepting,
    Executing,
    Reporting,
}

type Sink = Option<(PathBuf, ArtifactFormat, WriteMode)>;

/// The currently in-flight task: its cancellation handle, what to do with
/// its result once the blocking evaluator completes, and the handle
/// itself.
struct InFlight {
    task_id: TaskId,
    kind: &'static str,
    sink: Sink,
    cancel: CancellationToken,
    handle: JoinHandle<crate::error::Result<EvalOutput>>,
}

pub async fn handle_connection(stream: TcpStream, config: Arc<WorkerConfig>) {
    let peer = stream.peer_addr().ok();
    let mut framed = Framed::new(stream, FrameCodec);
    let mut state = State::Idle;
    let mut current: Option<InFlight> = None;
    let mut ping_due = interval(KEEPALIVE_INTERVAL);
    let mut progress_due = interval(PROGRESS_INTERVAL);
    ping_due.tick().await;
    progress_due.tick().await;

    loop {
        let next_frame = tokio::select! {
            frame = framed.next() => Event::Frame(frame),
            _ = ping_due.tick(), if current.is_none() => Event::SendPing,
            _ = progress_due.tick(), if current.is_some() => Event::SendProgress,
            result = wait_current(&mut current), if current.is_some() => Event::TaskDone(result),
        };

        match next_frame {
            Event::SendPing => {
                if framed.send(Frame::Ping { nonce: 0 }).await.is_err() {
                    break;
                }
                continue;
            }
            Event::SendProgress => {
                let task_id = current.as_ref().unwrap().task_id.clone();
                let _ = framed.send(Frame::Progress { task_id, rows: 0, bytes: 0, phase: "executing".into() }).await;
                continue;
            }
            Event::TaskDone(result) => {
                let in_flight = current.take().expect("TaskDone only fires with a current task");
                state = State::Reporting;
                let outcome = finish(&config, in_flight, result);
                if framed.send(outcome).await.is_err() {
                    break;
                }
                state = State::Idle;
                continue;
            }
            Event::Frame(None) => break,
            Event::Frame(Some(Err(e))) => {
                tracing::warn!(?peer, error = %e, "malformed frame, closing connection");
                break;
            }
            Event::Frame(Some(Ok(frame))) => {
                if !handle_frame(frame, &config, &mut framed, &mut current, &mut state).await {
                    break;
                }
            }
        }
    }
    if let Some(in_flight) = current {
        in_flight.handle.abort();
    }
    tracing::info!(?peer, "connection closed");
}

enum Event {
    Frame(Option<Result<Frame, flowfile_worker_proto::CodecError>>),
    SendPing,
    SendProgress,
    TaskDone(Result<crate::error::Result<EvalOutput>, JoinError>),
}

async fn wait_current(current: &mut Option<InFlight>) -> Result<crate::error::Result<EvalOutput>, JoinError> {
    (&mut current.as_mut().expect("wait_current only polled with a current task").handle).await
}

/// Handles one non-lifecycle frame. Returns `false` if the connection
/// should be closed (a send failed).
async fn handle_frame(
    frame: Frame,
    config: &WorkerConfig,
    framed: &mut Framed<TcpStream, FrameCodec>,
    current: &mut Option<InFlight>,
    state: &mut State,
) -> bool {
    match frame {
        Frame::Ping { nonce } => framed.send(Frame::Pong { nonce }).await.is_ok(),
        Frame::Pong { .. } => true,
        Frame::Start { task_id, node_id, plan, sample_rows } if current.is_none() => {
            *state = State::Accepting;
            tracing::debug!(%task_id, %node_id, kind = plan.kind_name(), "accepting task");
            *state = State::Executing;
            *current = Some(spawn_task(config, task_id, plan, sample_rows));
            true
        }
        Frame::Start { task_id, .. } => {
            framed
                .send(Frame::Error {
                    task_id,
                    kind: FrameErrorKind::PlanInvalid,
                    message: "this connection already has a task in flight".into(),
                    traceback: None,
                })
                .await
                .is_ok()
        }
        Frame::Cancel { task_id } => {
            match current {
                Some(in_flight) if in_flight.task_id == task_id => in_flight.cancel.cancel(),
                _ => tracing::debug!(%task_id, "cancel received with no matching task in flight"),
            }
            true
        }
        Frame::PreviewRequest { task_id, artifact, max_rows } => {
            let response = preview(config, &artifact, max_rows).unwrap_or_else(|e| {
                tracing::warn!(%task_id, error = %e, "preview read failed");
                Vec::new()
            });
            framed.send(Frame::PreviewResponse { task_id, rows: response }).await.is_ok()
        }
        other => {
            tracing::warn!(frame = ?other, "unexpected frame from server, ignoring");
            true
        }
    }
}

fn spawn_task(config: &WorkerConfig, task_id: TaskId, plan: PlanOp, sample_rows: Option<u64>) -> InFlight {
    let kind = plan.kind_name();
    let sink = match &plan {
        PlanOp::Output { path, format, write_mode, .. } => Some((path.clone(), *format, *write_mode)),
        _ => None,
    };
    let root = config.artifact_root.clone();
    let max_rows = config.max_rows_per_task;
    let cancel = CancellationToken::new();
    let cancel_for_eval = cancel.clone();
    let handle = tokio::task::spawn_blocking(move || {
        let ctx = EvalContext {
            artifact_root: &root,
            max_rows,
            sample_rows,
            cancel: &cancel_for_eval,
        };
        evaluator::evaluate(&plan, &ctx)
    });
    InFlight { task_id, kind, sink, cancel, handle }
}

fn finish(config: &WorkerConfig, in_flight: InFlight, result: Result<crate::error::Result<EvalOutput>, JoinError>) -> Frame {
    let task_id = in_flight.task_id.clone();
    let evaluated = match result {
        Ok(inner) => inner,
        Err(e) if e.is_cancelled() => Err(WorkerError::Cancelled),
        Err(e) => Err(WorkerError::Execution(format!("task panicked: {e}"))),
    };
    let outcome = evaluated.and_then(|output| materialize_result(config, in_flight.kind, in_flight.sink, output));
    match outcome {
        Ok(artifact) => Frame::Done { task_id, artifact },
        Err(err) => Frame::Error {
            task_id,
            kind: err.frame_kind(),
            message: err.message(),
            traceback: None,
        },
    }
}

fn materialize_result(config: &WorkerConfig, kind: &'static str, sink: Sink, output: EvalOutput) -> crate::error::Result<Artifact> {
    match sink {
        Some((path, format, write_mode)) => store::write_sink(&path, format, write_mode, output.rows, output.schema)
            .map_err(|e| WorkerError::Execution(format!("writing output for {kind}: {e}"))),
        None => store::materialize(&config.artifact_root, output.rows, output.schema, ArtifactFormat::Parquet)
            .map_err(|e| WorkerError::Execution(format!("materializing result for {kind}: {e}"))),
    }
}

fn preview(config: &WorkerConfig, artifact: &Artifact, max_rows: u64) -> crate::error::Result<Vec<serde_json::Map<String, serde_json::Value>>> {
    let reference = ArtifactRef { path: artifact.path.clone(), format: artifact.format };
    let (mut rows, _) = store::read_artifact(&config.artifact_root, &reference)?;
    rows.truncate(max_rows as usize);
    Ok(rows)
}
