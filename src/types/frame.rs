//! `SensorFrame` — one time-tick of simulator output (§3).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single contributing-feature entry, ordered by contribution share.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FeatureContribution {
    pub name: String,
    pub share: f64,
}

/// Detector output attached to a frame once the window is ready (§3 `derived`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Derived {
    pub t2_stat: f64,
    pub anomaly: bool,
    pub contributing_features: Vec<FeatureContribution>,
}

/// One time-tick of simulator output (§3 SensorFrame).
///
/// Vector lengths are fixed for the lifetime of a run: 41 measurements,
/// 11 manipulated variables, 20 disturbance flags (GLOSSARY). `step`
/// increases by exactly 1 per publication (§8 invariant 1).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SensorFrame {
    pub step: u64,
    pub sim_time_seconds: f64,
    pub wall_time: DateTime<Utc>,
    pub measurements: Vec<f64>,
    pub manipulated: Vec<f64>,
    pub disturbances: Vec<u8>,
    pub derived: Option<Derived>,
}

impl SensorFrame {
    /// Returns true if every disturbance flag is 0/1 and the fixed-length
    /// invariants from §3 hold for this frame.
    pub fn is_well_formed(&self) -> bool {
        use crate::config::defaults::{N_IDV, N_XMEAS, N_XMV};
        self.measurements.len() == N_XMEAS
            && self.manipulated.len() == N_XMV
            && self.disturbances.len() == N_IDV
            && self.disturbances.iter().all(|&d| d == 0 || d == 1)
    }

    /// Canonical by-name view of this frame's measurements and manipulated
    /// variables, `xmeas_1..xmeas_41` then `xmv_1..xmv_11` (1-indexed per
    /// the TEP convention, §6 GLOSSARY), the feature space the PCA Detector
    /// standardizes over (§4.B, F=52).
    pub fn named_features(&self) -> std::collections::HashMap<String, f64> {
        let mut map = std::collections::HashMap::with_capacity(
            self.measurements.len() + self.manipulated.len(),
        );
        for (i, &v) in self.measurements.iter().enumerate() {
            map.insert(format!("xmeas_{}", i + 1), v);
        }
        for (i, &v) in self.manipulated.iter().enumerate() {
            map.insert(format!("xmv_{}", i + 1), v);
        }
        map
    }

    /// Canonical feature name ordering used when building a fresh
    /// `BaselineModel` from training data (measurements then manipulated).
    pub fn canonical_feature_names() -> Vec<String> {
        use crate::config::defaults::{N_XMEAS, N_XMV};
        (1..=N_XMEAS)
            .map(|i| format!("xmeas_{i}"))
            .chain((1..=N_XMV).map(|i| format!("xmv_{i}")))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::defaults::{N_IDV, N_XMEAS, N_XMV};

    fn make_frame(step: u64) -> SensorFrame {
        SensorFrame {
            step,
            sim_time_seconds: step as f64 * 180.0,
            wall_time: Utc::now(),
            measurements: vec![0.0; N_XMEAS],
            manipulated: vec![0.0; N_XMV],
            disturbances: vec![0; N_IDV],
            derived: None,
        }
    }

    #[test]
    fn well_formed_frame_passes() {
        assert!(make_frame(1).is_well_formed());
    }

    #[test]
    fn wrong_length_fails() {
        let mut f = make_frame(1);
        f.measurements.pop();
        assert!(!f.is_well_formed());
    }

    #[test]
    fn non_binary_disturbance_fails() {
        let mut f = make_frame(1);
        f.disturbances[0] = 2;
        assert!(!f.is_well_formed());
    }

    #[test]
    fn named_features_cover_canonical_names() {
        let f = make_frame(1);
        let named = f.named_features();
        for name in SensorFrame::canonical_feature_names() {
            assert!(named.contains_key(&name), "missing {name}");
        }
    }
}
