//! PCA Hotelling T² Detector (§4.B).
//!
//! Grounded on the teacher's anomaly-scoring module: a pure, stateless
//! scoring function over an immutable model plus a small amount of
//! trigger-policy state (open/close hysteresis) kept separately so the
//! scoring itself stays deterministic and side-effect free, matching the
//! teacher's split between a stateless scorer and a stateful trigger.

mod trigger;

pub use trigger::{TriggerOutcome, TriggerPolicy};

use crate::baseline::BaselineModel;
use crate::config::defaults::TOP_K;
use crate::errors::DetectorError;
use crate::types::{Derived, FeatureContribution, SensorFrame};

/// Result of scoring one frame against a [`BaselineModel`] (§4.B steps 1-6).
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreResult {
    pub t2_stat: f64,
    pub anomaly: bool,
    pub contributions: Vec<FeatureContribution>,
}

/// Scores a single frame against `model` (§4.B). Deterministic, does not
/// mutate `model` (§4.B invariant).
pub fn score(model: &BaselineModel, frame: &SensorFrame) -> Result<ScoreResult, DetectorError> {
    let named = frame.named_features();
    let f = model.feature_count();
    let p = model.component_count();

    // Step 1: extract v in model feature order, fail-closed on any miss.
    let mut v = Vec::with_capacity(f);
    for name in &model.feature_names {
        let value = named
            .get(name)
            .copied()
            .ok_or_else(|| DetectorError::MissingFeature(name.clone()))?;
        v.push(value);
    }

    // Step 2: standardize.
    let z: Vec<f64> = v
        .iter()
        .zip(model.mean.iter())
        .zip(model.std.iter())
        .map(|((vi, mean_i), std_i)| (vi - mean_i) / std_i)
        .collect();

    // Step 3: project onto principal components, t_k = sum_i components[k,i] * z_i.
    let mut t = Vec::with_capacity(p);
    for k in 0..p {
        let mut t_k = 0.0;
        for i in 0..f {
            t_k += model.component(k, i) * z[i];
        }
        t.push(t_k);
    }

    // Step 4: Hotelling's T^2 = sum_k t_k^2 / eigenvalue_k.
    let t2_stat: f64 = t
        .iter()
        .zip(model.eigenvalues.iter())
        .map(|(t_k, eig_k)| t_k * t_k / eig_k)
        .sum();

    if !t2_stat.is_finite() {
        return Err(DetectorError::NonFiniteStatistic);
    }

    // Step 5: threshold.
    let anomaly = t2_stat > model.threshold_t2;

    // Step 6: per-feature contribution, c_i = sum_k (components[k,i] * t_k / eigenvalue_k)^2 * std_i^2.
    let mut contributions: Vec<FeatureContribution> = (0..f)
        .map(|i| {
            let mut c_i = 0.0;
            for k in 0..p {
                let term = model.component(k, i) * t[k] / model.eigenvalues[k];
                c_i += term * term;
            }
            c_i *= model.std[i] * model.std[i];
            FeatureContribution {
                name: model.feature_names[i].clone(),
                share: c_i,
            }
        })
        .collect();

    contributions.sort_by(|a, b| b.share.partial_cmp(&a.share).unwrap_or(std::cmp::Ordering::Equal));
    contributions.truncate(TOP_K);

    Ok(ScoreResult {
        t2_stat,
        anomaly,
        contributions,
    })
}

/// Scores `frame` and returns the [`Derived`] block to attach to it (§3
/// `derived`). `window_len`/`window_capacity` gate the "buffer underflow"
/// boundary (§8): the detector refuses to assert an anomaly until the
/// Frame Buffer holds a full window of history.
pub fn derive(
    model: &BaselineModel,
    frame: &SensorFrame,
    window_len: usize,
    window_capacity: usize,
) -> Result<Derived, DetectorError> {
    if window_len < window_capacity {
        return Err(DetectorError::WindowNotReady {
            have: window_len,
            need: window_capacity,
        });
    }
    let result = score(model, frame)?;
    Ok(Derived {
        t2_stat: result.t2_stat,
        anomaly: result.anomaly,
        contributing_features: result.contributions,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn identity_model(f: usize, p: usize) -> BaselineModel {
        let mut components = vec![0.0; p * f];
        for k in 0..p {
            components[k * f + k] = 1.0;
        }
        BaselineModel::new(
            (0..f).map(|i| format!("feat_{i}")).collect(),
            vec![0.0; f],
            vec![1.0; f],
            components,
            vec![1.0; p],
            11.3,
        )
        .unwrap()
    }

    fn frame_with_named(values: &[(&str, f64)]) -> SensorFrame {
        // Use a frame whose named_features happen to match the identity
        // model's feat_i names by constructing measurements/manipulated so
        // that xmeas_{i+1} == feat_i for the first few indices isn't
        // convenient; instead we score via a model whose feature_names are
        // the canonical xmeas/xmv names for these tests.
        let mut measurements = vec![0.0; 41];
        let manipulated = vec![0.0; 11];
        for (name, value) in values {
            if let Some(idx) = name.strip_prefix("xmeas_") {
                let idx: usize = idx.parse().unwrap();
                measurements[idx - 1] = *value;
            }
        }
        SensorFrame {
            step: 1,
            sim_time_seconds: 180.0,
            wall_time: Utc::now(),
            measurements,
            manipulated,
            disturbances: vec![0; 20],
            derived: None,
        }
    }

    fn canonical_identity_model(threshold: f64) -> BaselineModel {
        let names = SensorFrame::canonical_feature_names();
        let f = names.len();
        let p = 3;
        let mut components = vec![0.0; p * f];
        for k in 0..p {
            components[k * f + k] = 1.0;
        }
        BaselineModel::new(names, vec![0.0; f], vec![1.0; f], components, vec![1.0; p], threshold)
            .unwrap()
    }

    #[test]
    fn zero_vector_yields_zero_t2() {
        let model = canonical_identity_model(11.3);
        let frame = frame_with_named(&[]);
        let result = score(&model, &frame).unwrap();
        assert_eq!(result.t2_stat, 0.0);
        assert!(!result.anomaly);
    }

    #[test]
    fn large_deviation_triggers_anomaly() {
        let model = canonical_identity_model(11.3);
        let frame = frame_with_named(&[("xmeas_1", 10.0)]);
        let result = score(&model, &frame).unwrap();
        assert!(result.t2_stat > 11.3);
        assert!(result.anomaly);
    }

    #[test]
    fn missing_feature_is_an_error() {
        let model = BaselineModel::new(
            vec!["not_present".to_string()],
            vec![0.0],
            vec![1.0],
            vec![1.0],
            vec![1.0],
            5.0,
        )
        .unwrap();
        let frame = frame_with_named(&[]);
        assert!(matches!(
            score(&model, &frame),
            Err(DetectorError::MissingFeature(_))
        ));
    }

    #[test]
    fn deterministic_for_identical_inputs() {
        let model = canonical_identity_model(11.3);
        let frame = frame_with_named(&[("xmeas_3", 4.0)]);
        let a = score(&model, &frame).unwrap();
        let b = score(&model, &frame).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn contributions_sorted_descending_and_capped_at_top_k() {
        let model = canonical_identity_model(0.0001);
        let frame = frame_with_named(&[("xmeas_1", 5.0), ("xmeas_2", 3.0)]);
        let result = score(&model, &frame).unwrap();
        assert!(result.contributions.len() <= TOP_K);
        for pair in result.contributions.windows(2) {
            assert!(pair[0].share >= pair[1].share);
        }
    }

    #[test]
    fn derive_refuses_to_score_before_window_is_full() {
        let model = canonical_identity_model(11.3);
        let frame = frame_with_named(&[("xmeas_1", 50.0)]);
        let err = derive(&model, &frame, 19, 20).unwrap_err();
        assert!(matches!(err, DetectorError::WindowNotReady { have: 19, need: 20 }));
    }

    #[test]
    fn derive_scores_normally_once_window_is_full() {
        let model = canonical_identity_model(11.3);
        let frame = frame_with_named(&[("xmeas_1", 50.0)]);
        let derived = derive(&model, &frame, 20, 20).unwrap();
        assert!(derived.anomaly);
    }

    #[test]
    fn identity_model_has_unconstrained_feature() {
        // feature at index beyond p contributes nothing; used to sanity
        // check identity_model() helper is constructed as intended.
        let model = identity_model(5, 2);
        assert_eq!(model.component(1, 1), 1.0);
        assert_eq!(model.component(0, 4), 0.0);
    }
}
