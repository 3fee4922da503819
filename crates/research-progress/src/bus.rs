//! Per-task broadcast of [`ProgressEvent`]s to any number of concurrent
//! observers (§4.3), grounded on the teacher's
//! `dashflow-streaming::backends::memory::InMemoryBackend` (topic map +
//! `tokio::sync::broadcast`, trimmed of Kafka-parity concerns this system
//! has no use for) plus its token-bucket-style bounded-buffer drop policy.

use chrono::Utc;
use dashmap::DashMap;
use research_core::model::{EventKind, ProgressEvent};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, warn};
use uuid::Uuid;

/// Per-observer mailbox capacity. An observer that falls this far behind is
/// dropped rather than allowed to block the publisher (§4.3 "slow observer
/// policy").
pub const DEFAULT_OBSERVER_BUFFER: usize = 64;

/// Capacity of the internal broadcast ring every observer's forwarding task
/// subscribes to. Generously larger than the per-observer buffer so that an
/// observer lagging inside this ring (rather than its own mailbox) is the
/// rare case, not the common one.
const BROADCAST_RING_CAPACITY: usize = 1024;

/// How often the bus pulses an idle channel's keepalive signal.
const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(20);

struct TaskChannel {
    sender: broadcast::Sender<Arc<ProgressEvent>>,
    keepalive: broadcast::Sender<()>,
    next_sequence: AtomicU64,
    closed: AtomicBool,
}

impl TaskChannel {
    fn new() -> Arc<Self> {
        let (sender, _) = broadcast::channel(BROADCAST_RING_CAPACITY);
        let (keepalive, _) = broadcast::channel(1);
        let channel = Arc::new(Self {
            sender,
            keepalive,
            next_sequence: AtomicU64::new(1),
            closed: AtomicBool::new(false),
        });
        spawn_keepalive(Arc::clone(&channel));
        channel
    }
}

fn spawn_keepalive(channel: Arc<TaskChannel>) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(KEEPALIVE_INTERVAL);
        interval.tick().await; // first tick fires immediately; skip it
        loop {
            interval.tick().await;
            if channel.closed.load(Ordering::Acquire) {
                break;
            }
            // A send error just means nobody is listening right now; that's
            // fine, the keepalive pulse is best-effort.
            let _ = channel.keepalive.send(());
        }
    });
}

/// A handle an observer uses to receive events (and, separately, keepalive
/// pulses) for one task.
pub struct Observer {
    /// Ordered progress events for the subscribed task.
    pub events: mpsc::Receiver<Arc<ProgressEvent>>,
    /// Best-effort liveness pulses, sent roughly every 20s while the bus is
    /// otherwise idle on this task.
    pub keepalive: broadcast::Receiver<()>,
}

impl Observer {
    /// Adapt the event mailbox into a [`tokio_stream::Stream`], for callers
    /// (the WebSocket handler) that want to `select!` it alongside other
    /// streams rather than call `recv()` directly.
    #[must_use]
    pub fn event_stream(self) -> tokio_stream::wrappers::ReceiverStream<Arc<ProgressEvent>> {
        tokio_stream::wrappers::ReceiverStream::new(self.events)
    }
}

/// Per-task broadcast of ordered progress events. Single-publisher per task
/// by construction (the orchestrator); the implementation does not defend
/// against concurrent publishers (§4.3).
#[derive(Default)]
pub struct ProgressBus {
    tasks: DashMap<Uuid, Arc<TaskChannel>>,
}

impl ProgressBus {
    /// Construct an empty bus.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn get_or_create(&self, task_id: Uuid) -> Arc<TaskChannel> {
        self.tasks
            .entry(task_id)
            .or_insert_with(TaskChannel::new)
            .clone()
    }

    /// Publish one event. Assigns the next per-task sequence number and
    /// timestamp. Publishing a terminal event (`Completed`/`Failed`) marks
    /// the channel as closing: after this call returns, no new observers
    /// are accepted for this task, though already-attached observers still
    /// receive this very event (it was broadcast before the channel was
    /// removed from the routing table).
    pub fn publish(
        &self,
        task_id: Uuid,
        kind: EventKind,
        message: impl Into<String>,
        data: Option<std::collections::BTreeMap<String, serde_json::Value>>,
    ) {
        let channel = self.get_or_create(task_id);
        if channel.closed.load(Ordering::Acquire) {
            warn!(%task_id, "publish called on a closed progress channel; dropping event");
            return;
        }
        let sequence = channel.next_sequence.fetch_add(1, Ordering::AcqRel);
        let event = Arc::new(ProgressEvent {
            task_id,
            sequence,
            timestamp: Utc::now(),
            event_type: kind,
            message: message.into(),
            data,
        });

        // A send error just means there are currently no subscribers; that
        // is not an error for a single-publisher broadcast bus.
        let _ = channel.sender.send(event);

        if matches!(kind, EventKind::Completed | EventKind::Failed) {
            channel.closed.store(true, Ordering::Release);
            self.tasks.remove(&task_id);
        }
    }

    /// Attach a new observer to a task's event stream. Returns `None` if the
    /// task's channel has already delivered its terminal event (§8: "Observer
    /// attaches after `completed` event was emitted: connection is closed
    /// immediately; no events").
    pub fn subscribe(&self, task_id: Uuid) -> Option<Observer> {
        // A task channel that was already closed is removed from the map by
        // `publish`, so a missing entry and a closed entry are both "no more
        // observers accepted" — but we still need to create-on-first-observer
        // for a task that hasn't started publishing yet.
        if let Some(existing) = self.tasks.get(&task_id) {
            if existing.closed.load(Ordering::Acquire) {
                return None;
            }
        }
        let channel = self.get_or_create(task_id);
        if channel.closed.load(Ordering::Acquire) {
            return None;
        }

        let mut broadcast_rx = channel.sender.subscribe();
        let keepalive_rx = channel.keepalive.subscribe();
        let (forward_tx, forward_rx) = mpsc::channel(DEFAULT_OBSERVER_BUFFER);

        tokio::spawn(async move {
            loop {
                match broadcast_rx.recv().await {
                    Ok(event) => {
                        if forward_tx.try_send(event).is_err() {
                            debug!(%task_id, "observer buffer full; dropping observer");
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(%task_id, skipped, "observer lagged behind the broadcast ring; dropping observer");
                        break;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        Some(Observer {
            events: forward_rx,
            keepalive: keepalive_rx,
        })
    }

    /// Whether a task's progress channel currently exists and is open.
    #[must_use]
    pub fn is_open(&self, task_id: Uuid) -> bool {
        self.tasks
            .get(&task_id)
            .map(|c| !c.closed.load(Ordering::Acquire))
            .unwrap_or(false)
    }
}
