//! Anomaly Event trigger policy: N_consec hysteresis over the boolean
//! `anomaly` flag (§4.B "Trigger policy").

use std::collections::VecDeque;

/// What the policy decided to do with the event state after observing one
/// more `anomaly` flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerOutcome {
    /// No open event, and this frame didn't open one.
    Idle,
    /// An event was already open and remains open.
    StillOpen,
    /// This frame's anomaly flag caused a new event to open.
    Opened,
    /// This frame's non-anomaly flag caused the open event to close.
    Closed,
}

/// Tracks the last `n_consec` anomaly flags and decides open/close
/// transitions (§4.B: opens on N_consec anomalous frames, closes on
/// N_consec non-anomalous frames; independently configurable in principle,
/// symmetric by default per the Open Questions resolution in DESIGN.md).
pub struct TriggerPolicy {
    n_consec: usize,
    recent: VecDeque<bool>,
    is_open: bool,
}

impl TriggerPolicy {
    pub fn new(n_consec: usize) -> Self {
        Self {
            n_consec: n_consec.max(1),
            recent: VecDeque::with_capacity(n_consec.max(1)),
            is_open: false,
        }
    }

    pub fn is_open(&self) -> bool {
        self.is_open
    }

    /// Feed one more frame's anomaly flag, returning the resulting transition.
    pub fn observe(&mut self, anomaly: bool) -> TriggerOutcome {
        if self.recent.len() == self.n_consec {
            self.recent.pop_front();
        }
        self.recent.push_back(anomaly);

        let all_true = self.recent.len() == self.n_consec && self.recent.iter().all(|&a| a);
        let all_false = self.recent.len() == self.n_consec && self.recent.iter().all(|&a| !a);

        if !self.is_open && all_true {
            self.is_open = true;
            TriggerOutcome::Opened
        } else if self.is_open && all_false {
            self.is_open = false;
            TriggerOutcome::Closed
        } else if self.is_open {
            TriggerOutcome::StillOpen
        } else {
            TriggerOutcome::Idle
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opens_after_n_consec_anomalies() {
        let mut policy = TriggerPolicy::new(2);
        assert_eq!(policy.observe(true), TriggerOutcome::Idle);
        assert_eq!(policy.observe(true), TriggerOutcome::Opened);
        assert!(policy.is_open());
    }

    #[test]
    fn single_anomaly_does_not_open_with_n_consec_two() {
        let mut policy = TriggerPolicy::new(2);
        policy.observe(true);
        assert_eq!(policy.observe(false), TriggerOutcome::Idle);
        assert!(!policy.is_open());
    }

    #[test]
    fn closes_after_n_consec_non_anomalies() {
        let mut policy = TriggerPolicy::new(2);
        policy.observe(true);
        policy.observe(true);
        assert!(policy.is_open());
        policy.observe(false);
        assert_eq!(policy.observe(false), TriggerOutcome::Closed);
        assert!(!policy.is_open());
    }

    #[test]
    fn stays_open_on_isolated_non_anomaly() {
        let mut policy = TriggerPolicy::new(2);
        policy.observe(true);
        policy.observe(true);
        assert_eq!(policy.observe(false), TriggerOutcome::StillOpen);
        assert!(policy.is_open());
    }

    #[test]
    fn n_consec_one_opens_immediately() {
        let mut policy = TriggerPolicy::new(1);
        assert_eq!(policy.observe(true), TriggerOutcome::Opened);
    }
}
