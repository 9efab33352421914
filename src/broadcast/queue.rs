//! A bounded, single-consumer event queue that can actually enforce
//! drop-oldest backpressure — unlike `tokio::sync::mpsc`, whose sending
//! half has no way to evict an already-queued item, so a hand-rolled
//! `VecDeque` + `Notify` pair is used instead (§4.E).

use std::collections::VecDeque;
use std::sync::Mutex;
use tokio::sync::Notify;

pub struct SubscriberQueue<T> {
    inner: Mutex<VecDeque<T>>,
    notify: Notify,
    capacity: usize,
    closed: std::sync::atomic::AtomicBool,
}

/// What happened when an item was pushed onto a full queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    Delivered,
    DroppedOldest,
    RejectedFull,
}

impl<T> SubscriberQueue<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(VecDeque::with_capacity(capacity)),
            notify: Notify::new(),
            capacity,
            closed: std::sync::atomic::AtomicBool::new(false),
        }
    }

    /// Pushes `item`, evicting the oldest queued item first if full.
    #[allow(clippy::unwrap_used)]
    pub fn push_drop_oldest(&self, item: T) -> PushOutcome {
        let mut guard = self.inner.lock().unwrap();
        let outcome = if guard.len() >= self.capacity {
            guard.pop_front();
            PushOutcome::DroppedOldest
        } else {
            PushOutcome::Delivered
        };
        guard.push_back(item);
        drop(guard);
        self.notify.notify_one();
        outcome
    }

    /// Pushes `item`, rejecting it (reporting as a write error upstream)
    /// rather than ever silently dropping an already-queued item (§4.E
    /// "never-drop for status and analysis events").
    #[allow(clippy::unwrap_used)]
    pub fn push_never_drop(&self, item: T) -> PushOutcome {
        let mut guard = self.inner.lock().unwrap();
        if guard.len() >= self.capacity {
            return PushOutcome::RejectedFull;
        }
        guard.push_back(item);
        drop(guard);
        self.notify.notify_one();
        PushOutcome::Delivered
    }

    #[allow(clippy::unwrap_used)]
    pub fn is_closed(&self) -> bool {
        self.closed.load(std::sync::atomic::Ordering::SeqCst)
    }

    pub fn close(&self) {
        self.closed.store(true, std::sync::atomic::Ordering::SeqCst);
        self.notify.notify_one();
    }

    /// Waits for and pops the next item, FIFO (§4.E "strictly
    /// first-in-first-out per subscriber"). Returns `None` once closed and
    /// drained.
    #[allow(clippy::unwrap_used)]
    pub async fn recv(&self) -> Option<T> {
        loop {
            {
                let mut guard = self.inner.lock().unwrap();
                if let Some(item) = guard.pop_front() {
                    return Some(item);
                }
                if self.is_closed() {
                    return None;
                }
            }
            self.notify.notified().await;
        }
    }

    #[allow(clippy::unwrap_used)]
    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_drop_oldest_evicts_front_when_full() {
        let q = SubscriberQueue::new(2);
        q.push_drop_oldest(1);
        q.push_drop_oldest(2);
        assert_eq!(q.push_drop_oldest(3), PushOutcome::DroppedOldest);
        assert_eq!(q.len(), 2);
    }

    #[test]
    fn push_never_drop_rejects_when_full() {
        let q = SubscriberQueue::new(1);
        assert_eq!(q.push_never_drop(1), PushOutcome::Delivered);
        assert_eq!(q.push_never_drop(2), PushOutcome::RejectedFull);
        assert_eq!(q.len(), 1);
    }

    #[tokio::test]
    async fn recv_is_fifo() {
        let q = SubscriberQueue::new(4);
        q.push_drop_oldest(1);
        q.push_drop_oldest(2);
        assert_eq!(q.recv().await, Some(1));
        assert_eq!(q.recv().await, Some(2));
    }

    #[tokio::test]
    async fn recv_returns_none_after_close_and_drain() {
        let q: SubscriberQueue<i32> = SubscriberQueue::new(4);
        q.close();
        assert_eq!(q.recv().await, None);
    }
}
