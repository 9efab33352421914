//! `AnomalyEvent` — materialized when the detector declares a fault (§3, §4.B).

use super::frame::FeatureContribution;
use crate::config::defaults::TOP_K;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// State of the downstream LLM dispatch for an anomaly event (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DispatchState {
    Pending,
    InFlight,
    Completed,
    Suppressed,
}

/// An open or closed fault event, carrying running top-feature contributions (§3, §4.B).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnomalyEvent {
    pub event_id: Uuid,
    pub start_step: u64,
    pub end_step: Option<u64>,
    pub peak_t2: f64,
    pub peak_step: u64,
    pub top_features: Vec<FeatureContribution>,
    pub dispatch_state: DispatchState,
    /// Running sum/count of each feature's contribution share, folded in by
    /// [`Self::accumulate`] on every observation of the event (§3, §4.B:
    /// "contributions are accumulated as running means").
    #[serde(skip)]
    contribution_totals: HashMap<String, (f64, u64)>,
}

impl AnomalyEvent {
    pub fn open(start_step: u64, t2: f64, contributions: &[FeatureContribution]) -> Self {
        let mut event = Self {
            event_id: Uuid::new_v4(),
            start_step,
            end_step: None,
            peak_t2: t2,
            peak_step: start_step,
            top_features: Vec::new(),
            dispatch_state: DispatchState::Pending,
            contribution_totals: HashMap::new(),
        };
        event.accumulate(contributions);
        event
    }

    pub fn is_active(&self) -> bool {
        self.end_step.is_none()
    }

    pub fn close(&mut self, end_step: u64) {
        self.end_step = Some(end_step);
    }

    /// Updates peak T² / peak step if this observation exceeds the running peak.
    pub fn observe_peak(&mut self, step: u64, t2: f64) {
        if t2 > self.peak_t2 {
            self.peak_t2 = t2;
            self.peak_step = step;
        }
    }

    /// Folds one frame's per-feature contributions into the event's running
    /// mean and recomputes `top_features` as the running top-K by mean share.
    pub fn accumulate(&mut self, contributions: &[FeatureContribution]) {
        for c in contributions {
            let entry = self.contribution_totals.entry(c.name.clone()).or_insert((0.0, 0));
            entry.0 += c.share;
            entry.1 += 1;
        }
        let mut means: Vec<FeatureContribution> = self
            .contribution_totals
            .iter()
            .map(|(name, &(sum, count))| FeatureContribution {
                name: name.clone(),
                share: sum / count as f64,
            })
            .collect();
        means.sort_by(|a, b| b.share.partial_cmp(&a.share).unwrap_or(std::cmp::Ordering::Equal));
        means.truncate(TOP_K);
        self.top_features = means;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_event_is_active() {
        let ev = AnomalyEvent::open(10, 15.0, &[]);
        assert!(ev.is_active());
        assert_eq!(ev.dispatch_state, DispatchState::Pending);
    }

    #[test]
    fn closing_sets_end_step() {
        let mut ev = AnomalyEvent::open(10, 15.0, &[]);
        ev.close(20);
        assert!(!ev.is_active());
        assert_eq!(ev.end_step, Some(20));
    }

    #[test]
    fn peak_tracks_maximum() {
        let mut ev = AnomalyEvent::open(10, 15.0, &[]);
        ev.observe_peak(11, 12.0);
        assert_eq!(ev.peak_t2, 15.0);
        ev.observe_peak(12, 20.0);
        assert_eq!(ev.peak_t2, 20.0);
        assert_eq!(ev.peak_step, 12);
    }

    fn contribution(name: &str, share: f64) -> FeatureContribution {
        FeatureContribution { name: name.to_string(), share }
    }

    #[test]
    fn top_features_is_a_running_mean_not_the_latest_frame() {
        let mut ev = AnomalyEvent::open(10, 15.0, &[contribution("xmeas_1", 1.0)]);
        ev.accumulate(&[contribution("xmeas_1", 0.0)]);
        let entry = ev.top_features.iter().find(|f| f.name == "xmeas_1").unwrap();
        assert_eq!(entry.share, 0.5);
    }

    #[test]
    fn top_features_stays_capped_at_top_k_across_accumulation() {
        let mut ev = AnomalyEvent::open(
            10,
            15.0,
            &(1..=10).map(|i| contribution(&format!("f{i}"), i as f64)).collect::<Vec<_>>(),
        );
        ev.accumulate(&(1..=10).map(|i| contribution(&format!("f{i}"), i as f64)).collect::<Vec<_>>());
        assert!(ev.top_features.len() <= TOP_K);
        assert_eq!(ev.top_features[0].name, "f10");
    }
}
