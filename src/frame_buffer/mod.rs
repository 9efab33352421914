//! Frame Buffer — bounded sliding window of recent `SensorFrame`s (§4.A).
//!
//! Single-writer (the Simulation Driver), many-reader (API snapshots, the
//! Detector) — guarded by a `RwLock` per the concurrency model in §5, with
//! `snapshot()` returning an owned copy the caller can retain without
//! further synchronization, following the same pattern the teacher's
//! pipeline coordinator used for its `VecDeque`-backed history buffer.

use crate::types::SensorFrame;
use std::collections::VecDeque;
use std::sync::RwLock;

/// Bounded, insertion-ordered FIFO of the last `capacity` `SensorFrame`s.
pub struct Window {
    inner: RwLock<VecDeque<SensorFrame>>,
    capacity: usize,
}

impl Window {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: RwLock::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    /// Append a frame, evicting the oldest if full (§4.A).
    #[allow(clippy::unwrap_used)]
    pub fn append(&self, frame: SensorFrame) {
        let mut guard = self.inner.write().unwrap();
        if guard.len() == self.capacity {
            guard.pop_front();
        }
        guard.push_back(frame);
    }

    /// A stable, independent copy of the current window contents, oldest first.
    #[allow(clippy::unwrap_used)]
    pub fn snapshot(&self) -> Vec<SensorFrame> {
        self.inner.read().unwrap().iter().cloned().collect()
    }

    /// The most recently appended frame, if any.
    #[allow(clippy::unwrap_used)]
    pub fn latest(&self) -> Option<SensorFrame> {
        self.inner.read().unwrap().back().cloned()
    }

    #[allow(clippy::unwrap_used)]
    pub fn len(&self) -> usize {
        self.inner.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_full(&self) -> bool {
        self.len() >= self.capacity
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Empties the window. Required whenever the active `BaselineModel`
    /// changes shape — frames taken under one model are never mixed with
    /// another (§4.A "On size mismatch... buffer is flushed").
    #[allow(clippy::unwrap_used)]
    pub fn flush(&self) {
        self.inner.write().unwrap().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn frame(step: u64) -> SensorFrame {
        SensorFrame {
            step,
            sim_time_seconds: step as f64,
            wall_time: Utc::now(),
            measurements: vec![0.0; 41],
            manipulated: vec![0.0; 11],
            disturbances: vec![0; 20],
            derived: None,
        }
    }

    #[test]
    fn append_and_latest() {
        let w = Window::new(3);
        w.append(frame(1));
        w.append(frame(2));
        assert_eq!(w.latest().unwrap().step, 2);
        assert_eq!(w.len(), 2);
    }

    #[test]
    fn evicts_oldest_on_overflow() {
        let w = Window::new(2);
        w.append(frame(1));
        w.append(frame(2));
        w.append(frame(3));
        let snap = w.snapshot();
        assert_eq!(snap.len(), 2);
        assert_eq!(snap[0].step, 2);
        assert_eq!(snap[1].step, 3);
    }

    #[test]
    fn snapshot_is_ordered_by_step() {
        let w = Window::new(5);
        for i in 1..=5 {
            w.append(frame(i));
        }
        let snap = w.snapshot();
        let steps: Vec<u64> = snap.iter().map(|f| f.step).collect();
        assert_eq!(steps, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn flush_empties_window() {
        let w = Window::new(5);
        w.append(frame(1));
        w.flush();
        assert!(w.is_empty());
        assert!(w.latest().is_none());
    }

    #[test]
    fn is_full_reflects_capacity() {
        let w = Window::new(2);
        assert!(!w.is_full());
        w.append(frame(1));
        w.append(frame(2));
        assert!(w.is_full());
    }
}
