//! SSE Broadcaster (§4.E): fan-out of frame/status/analysis events to
//! subscribed dashboards.
//!
//! Grounded on the teacher's `llm/scheduler.rs` bounded-queue-with-drop-policy
//! reasoning, applied per-subscriber instead of per-worker: each subscriber
//! gets its own bounded queue ([`queue::SubscriberQueue`]) so one slow reader
//! can never stall delivery to the others. Frame events drop the oldest
//! queued item under backpressure (latency over completeness); status and
//! analysis events are never silently dropped — a full queue there counts
//! as a write error toward the subscriber's disconnect threshold instead.

mod event;
mod queue;

pub use event::{AnalysisReadySummary, BroadcastEvent, StatusSnapshot};
pub use queue::SubscriberQueue;

use crate::types::SensorFrame;
use queue::PushOutcome;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

struct Subscriber {
    id: u64,
    queue: Arc<SubscriberQueue<BroadcastEvent>>,
    consecutive_errors: u64,
}

/// Maintains the live subscriber set and fans events out to all of them in
/// publish order (§4.E).
pub struct Broadcaster {
    subscribers: Mutex<Vec<Subscriber>>,
    next_id: AtomicU64,
    queue_depth: usize,
    k_error: u64,
    frames_dropped_total: AtomicU64,
}

impl Broadcaster {
    pub fn new(queue_depth: usize, k_error: u32) -> Self {
        Self {
            subscribers: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
            queue_depth,
            k_error: k_error as u64,
            frames_dropped_total: AtomicU64::new(0),
        }
    }

    /// Total number of frame events evicted by drop-oldest across all
    /// subscribers, for the `/metrics` exposition.
    pub fn frames_dropped_total(&self) -> u64 {
        self.frames_dropped_total.load(Ordering::Relaxed)
    }

    /// Registers a new subscriber and returns its id (for
    /// `record_write_error`) and its queue, which the SSE response layer
    /// drains.
    #[allow(clippy::unwrap_used)]
    pub fn subscribe(&self) -> (u64, Arc<SubscriberQueue<BroadcastEvent>>) {
        let queue = Arc::new(SubscriberQueue::new(self.queue_depth));
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.subscribers.lock().unwrap().push(Subscriber {
            id,
            queue: queue.clone(),
            consecutive_errors: 0,
        });
        (id, queue)
    }

    /// Removes a subscriber (e.g. when its SSE connection closes).
    #[allow(clippy::unwrap_used)]
    pub fn unsubscribe(&self, id: u64) {
        let mut subscribers = self.subscribers.lock().unwrap();
        if let Some(pos) = subscribers.iter().position(|s| s.id == id) {
            subscribers[pos].queue.close();
            subscribers.remove(pos);
        }
    }

    #[allow(clippy::unwrap_used)]
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().unwrap().len()
    }

    /// Publishes `frame` to all subscribers; drop-oldest under backpressure
    /// (§4.E "drop-oldest for frame events").
    pub fn publish_frame(&self, frame: SensorFrame) {
        self.publish(BroadcastEvent::Frame(Box::new(frame)), true);
    }

    /// Publishes a status snapshot; never dropped (§4.E "never-drop for
    /// status and analysis events").
    pub fn publish_status(&self, snapshot: StatusSnapshot) {
        self.publish(BroadcastEvent::Status(Box::new(snapshot)), false);
    }

    /// Publishes an analysis_ready summary; never dropped.
    pub fn publish_analysis_ready(&self, summary: AnalysisReadySummary) {
        self.publish(BroadcastEvent::AnalysisReady(Box::new(summary)), false);
    }

    #[allow(clippy::unwrap_used)]
    fn publish(&self, event: BroadcastEvent, drop_oldest: bool) {
        let mut subscribers = self.subscribers.lock().unwrap();
        subscribers.retain_mut(|sub| {
            let outcome = if drop_oldest {
                sub.queue.push_drop_oldest(event.clone())
            } else {
                sub.queue.push_never_drop(event.clone())
            };
            match outcome {
                PushOutcome::Delivered => {
                    sub.consecutive_errors = 0;
                    true
                }
                PushOutcome::DroppedOldest => {
                    sub.consecutive_errors = 0;
                    self.frames_dropped_total.fetch_add(1, Ordering::Relaxed);
                    true
                }
                PushOutcome::RejectedFull => {
                    sub.consecutive_errors += 1;
                    let keep = sub.consecutive_errors < self.k_error;
                    if !keep {
                        sub.queue.close();
                    }
                    keep
                }
            }
        });
    }

    /// Records a write error observed by the SSE response layer itself
    /// (e.g. the underlying TCP write failed), disconnecting the
    /// subscriber after `k_error` consecutive failures (§4.E).
    #[allow(clippy::unwrap_used)]
    pub fn record_write_error(&self, subscriber_id: u64) -> bool {
        let mut subscribers = self.subscribers.lock().unwrap();
        let mut disconnect = false;
        subscribers.retain(|sub| {
            if sub.id != subscriber_id {
                return true;
            }
            disconnect = sub.consecutive_errors + 1 >= self.k_error;
            if disconnect {
                sub.queue.close();
            }
            !disconnect
        });
        disconnect
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::defaults::{N_IDV, N_XMEAS, N_XMV};
    use chrono::Utc;

    fn frame(step: u64) -> SensorFrame {
        SensorFrame {
            step,
            sim_time_seconds: step as f64,
            wall_time: Utc::now(),
            measurements: vec![0.0; N_XMEAS],
            manipulated: vec![0.0; N_XMV],
            disturbances: vec![0; N_IDV],
            derived: None,
        }
    }

    #[tokio::test]
    async fn subscriber_receives_published_frame() {
        let b = Broadcaster::new(8, 3);
        let (_id, queue) = b.subscribe();
        b.publish_frame(frame(1));
        let event = queue.recv().await.unwrap();
        assert!(matches!(event, BroadcastEvent::Frame(f) if f.step == 1));
    }

    #[tokio::test]
    async fn fifo_ordering_per_subscriber() {
        let b = Broadcaster::new(8, 3);
        let (_id, queue) = b.subscribe();
        b.publish_frame(frame(1));
        b.publish_frame(frame(2));
        b.publish_frame(frame(3));
        let mut steps = Vec::new();
        for _ in 0..3 {
            if let BroadcastEvent::Frame(f) = queue.recv().await.unwrap() {
                steps.push(f.step);
            }
        }
        assert_eq!(steps, vec![1, 2, 3]);
    }

    #[test]
    fn subscriber_count_reflects_subscriptions() {
        let b = Broadcaster::new(8, 3);
        assert_eq!(b.subscriber_count(), 0);
        let _a = b.subscribe();
        let _b2 = b.subscribe();
        assert_eq!(b.subscriber_count(), 2);
    }

    #[tokio::test]
    async fn drop_oldest_evicts_stale_frame_instead_of_blocking() {
        let b = Broadcaster::new(1, 3);
        let (_id, queue) = b.subscribe();
        b.publish_frame(frame(1));
        b.publish_frame(frame(2));
        assert_eq!(b.subscriber_count(), 1);
        if let BroadcastEvent::Frame(f) = queue.recv().await.unwrap() {
            assert_eq!(f.step, 2);
        }
        assert_eq!(b.frames_dropped_total(), 1);
    }

    #[test]
    fn write_errors_disconnect_after_k_error() {
        let b = Broadcaster::new(8, 2);
        let (id, _queue) = b.subscribe();
        assert!(!b.record_write_error(id));
        assert!(b.record_write_error(id));
        assert_eq!(b.subscriber_count(), 0);
    }

    #[test]
    fn unsubscribe_removes_and_closes() {
        let b = Broadcaster::new(8, 2);
        let (id, queue) = b.subscribe();
        b.unsubscribe(id);
        assert_eq!(b.subscriber_count(), 0);
        assert!(queue.is_closed());
    }
}
