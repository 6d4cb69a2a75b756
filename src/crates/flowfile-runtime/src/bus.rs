//! Per-run event fanout: replay-from-start plus bounded per-subscriber
//! queues. Grounded on `orchestrator::api::ws::replay::EventHistory` (the
//! capped ring buffer feeding reconnect replay) and
//! `backpressure::ClientBackpressure` (the per-consumer bounded queue and
//! dropped-message counter), generalized from a single global WS bus to a
//! per-run one and from a single droppable message type to the spec's rule
//! that only `NodeProgress` may ever be dropped.

use crate::events::RunEvent;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

/// Replay buffer depth and per-subscriber mailbox depth. Generous enough
/// that a normally-paced subscriber never triggers backpressure; only a
/// wedged or very slow consumer drops `NodeProgress` frames.
const HISTORY_CAPACITY: usize = 2048;
const SUBSCRIBER_CAPACITY: usize = 256;

struct Subscriber {
    tx: mpsc::Sender<RunEvent>,
    dropped: u64,
}

/// One run's event history plus live subscriber fanout. Shared behind an
/// `Arc` by the `RunHandle` that owns it and the background task
/// publishing into it.
pub struct EventBus {
    history: Mutex<VecDeque<RunEvent>>,
    subscribers: Mutex<Vec<Subscriber>>,
    seq: AtomicU64,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            history: Mutex::new(VecDeque::with_capacity(HISTORY_CAPACITY)),
            subscribers: Mutex::new(Vec::new()),
            seq: AtomicU64::new(0),
        }
    }

    pub fn next_seq(&self) -> u64 {
        self.seq.fetch_add(1, Ordering::SeqCst)
    }

    /// Stores the event in the replay buffer and fans it out to every live
    /// subscriber. `NodeProgress` events are delivered best-effort
    /// (`try_send`, dropped on a full mailbox with the drop folded into the
    /// next `Dropped(n)` marker); every other kind blocks the publisher
    /// until the subscriber has room, since those may never be dropped.
    pub async fn publish(&self, event: RunEvent) {
        {
            let mut history = self.history.lock();
            if history.len() >= HISTORY_CAPACITY {
                history.pop_front();
            }
            history.push_back(event.clone());
        }

        // Collect senders needing an async `.send().await` outside the
        // sync lock guard, since `parking_lot::MutexGuard` is not `Send`
        // across an await point.
        let mut blocking_sends: Vec<mpsc::Sender<RunEvent>> = Vec::new();
        {
            let mut subs = self.subscribers.lock();
            subs.retain_mut(|sub| {
                if sub.dropped > 0 {
                    let marker = RunEvent::Dropped {
                        run_id: event.run_id().clone(),
                        seq: self.next_seq(),
                        count: sub.dropped,
                    };
                    if sub.tx.try_send(marker).is_ok() {
                        sub.dropped = 0;
                    }
                }

                if event.is_droppable() {
                    match sub.tx.try_send(event.clone()) {
                        Ok(()) => true,
                        Err(mpsc::error::TrySendError::Full(_)) => {
                            sub.dropped += 1;
                            true
                        }
                        Err(mpsc::error::TrySendError::Closed(_)) => false,
                    }
                } else {
                    blocking_sends.push(sub.tx.clone());
                    true
                }
            });
        }

        for tx in blocking_sends {
            let _ = tx.send(event.clone()).await;
        }
    }

    /// Snapshots the replay buffer and registers a live mailbox atomically
    /// with respect to `publish`, so no event is ever missed or doubled.
    pub fn subscribe(&self) -> (Vec<RunEvent>, ReceiverStream<RunEvent>) {
        let (tx, rx) = mpsc::channel(SUBSCRIBER_CAPACITY);
        let history = {
            let history = self.history.lock();
            let mut subs = self.subscribers.lock();
            subs.push(Subscriber { tx, dropped: 0 });
            history.iter().cloned().collect()
        };
        (history, ReceiverStream::new(rx))
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowfile_types::RunId;
    use tokio_stream::StreamExt;

    fn run_started(n: u64) -> RunEvent {
        RunEvent::RunStarted { run_id: RunId("run_test".into()), seq: n }
    }

    #[tokio::test]
    async fn a_late_subscriber_replays_history_then_sees_live_events() {
        let bus = EventBus::new();
        bus.publish(run_started(1)).await;
        bus.publish(run_started(2)).await;

        let (history, mut live) = bus.subscribe();
        assert_eq!(history.len(), 2);

        bus.publish(run_started(3)).await;
        let next = live.next().await.expect("live event");
        assert_eq!(next.seq(), 3);
    }

    #[tokio::test]
    async fn a_full_mailbox_drops_progress_and_emits_a_marker() {
        let bus = EventBus::new();
        let (_, mut live) = bus.subscribe();

        let progress = |n: u64| RunEvent::NodeProgress {
            run_id: RunId("run_test".into()),
            node_id: flowfile_types::NodeId(1),
            task_id: flowfile_types::TaskId("task_test".into()),
            seq: n,
            rows: Some(n),
            bytes: None,
            phase: None,
        };

        // Overflow the mailbox: nobody is draining `live` yet, so the
        // trailing publishes are dropped and folded into `sub.dropped`.
        for n in 0..(SUBSCRIBER_CAPACITY as u64 + 5) {
            bus.publish(progress(n)).await;
        }

        // Drain enough to make room, then publish once more so the
        // opportunistic `Dropped(n)` flush in `publish` has a slot to land
        // in ahead of the new event.
        for _ in 0..10 {
            live.next().await;
        }
        bus.publish(progress(SUBSCRIBER_CAPACITY as u64 + 5)).await;

        let mut saw_dropped_marker = false;
        while let Ok(Some(event)) =
            tokio::time::timeout(std::time::Duration::from_millis(50), live.next()).await
        {
            if matches!(event, RunEvent::Dropped { .. }) {
                saw_dropped_marker = true;
                break;
            }
        }
        assert!(saw_dropped_marker, "expected a Dropped(n) marker after overflow");
    }
}
