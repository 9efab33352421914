//! `BaselineModel` — PCA parameters loaded from a self-describing artifact (§3, §6).

use crate::errors::BaselineError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Schema version for the on-disk artifact format, bumped on breaking changes.
pub const SCHEMA_VERSION: u32 = 1;

/// On-disk baseline artifact: mean/std per feature, PCA components and
/// eigenvalues, and an integrity header self-describing enough to reject
/// mismatched shapes (§6 "Baseline artifact").
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BaselineModel {
    pub schema_version: u32,
    pub feature_names: Vec<String>,
    pub mean: Vec<f64>,
    pub std: Vec<f64>,
    /// Row-major (P, F) matrix: `components[k * f_count + i]`.
    pub components: Vec<f64>,
    pub eigenvalues: Vec<f64>,
    pub threshold_t2: f64,
    pub checksum: u64,
}

impl BaselineModel {
    pub fn feature_count(&self) -> usize {
        self.feature_names.len()
    }

    pub fn component_count(&self) -> usize {
        self.eigenvalues.len()
    }

    /// Component value at (k, i): k in [0,P), i in [0,F).
    pub fn component(&self, k: usize, i: usize) -> f64 {
        self.components[k * self.feature_count() + i]
    }

    /// Computes the checksum a well-formed artifact should carry, so
    /// `load()` can reject a tampered/truncated file (§6 "checksum").
    fn compute_checksum(
        feature_names: &[String],
        mean: &[f64],
        std: &[f64],
        components: &[f64],
        eigenvalues: &[f64],
        threshold_t2: f64,
    ) -> u64 {
        use std::hash::{Hash, Hasher};
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        feature_names.hash(&mut hasher);
        for v in mean.iter().chain(std).chain(components).chain(eigenvalues) {
            v.to_bits().hash(&mut hasher);
        }
        threshold_t2.to_bits().hash(&mut hasher);
        hasher.finish()
    }

    /// Builds and checksums a model from its parameters — the only
    /// constructor other than [`BaselineModel::load`], so every in-memory
    /// model always carries a checksum consistent with its contents.
    pub fn new(
        feature_names: Vec<String>,
        mean: Vec<f64>,
        std: Vec<f64>,
        components: Vec<f64>,
        eigenvalues: Vec<f64>,
        threshold_t2: f64,
    ) -> Result<Self, BaselineError> {
        let checksum = Self::compute_checksum(
            &feature_names,
            &mean,
            &std,
            &components,
            &eigenvalues,
            threshold_t2,
        );
        let model = Self {
            schema_version: SCHEMA_VERSION,
            feature_names,
            mean,
            std,
            components,
            eigenvalues,
            threshold_t2,
            checksum,
        };
        model.validate()?;
        Ok(model)
    }

    /// Loads and validates an artifact from disk (§6, §4.B "rejected at load time").
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, BaselineError> {
        let text = std::fs::read_to_string(path)?;
        let model: Self = serde_json::from_str(&text)?;
        model.validate()?;
        Ok(model)
    }

    /// Shape, checksum, and positivity validation (§3 BaselineModel invariants,
    /// §4.B "if any std_i = 0, the model is invalid and must be rejected").
    pub fn validate(&self) -> Result<(), BaselineError> {
        let f = self.feature_names.len();
        let p = self.eigenvalues.len();

        if self.mean.len() != f || self.std.len() != f {
            return Err(BaselineError::ShapeMismatch {
                expected_f: f,
                expected_p: p,
                got_f: self.mean.len().min(self.std.len()),
                got_p: p,
            });
        }
        if self.components.len() != p * f {
            return Err(BaselineError::ShapeMismatch {
                expected_f: f,
                expected_p: p,
                got_f: f,
                got_p: if f == 0 { 0 } else { self.components.len() / f },
            });
        }
        for (i, &s) in self.std.iter().enumerate() {
            if !(s > 0.0) {
                return Err(BaselineError::NonPositiveStd(
                    self.feature_names
                        .get(i)
                        .cloned()
                        .unwrap_or_else(|| i.to_string()),
                ));
            }
        }
        for &ev in &self.eigenvalues {
            if !(ev > 0.0) {
                return Err(BaselineError::Malformed(
                    "eigenvalues must all be positive".into(),
                ));
            }
        }
        if !(self.threshold_t2 > 0.0) {
            return Err(BaselineError::Malformed(
                "threshold_t2 must be positive".into(),
            ));
        }

        let expected_checksum = Self::compute_checksum(
            &self.feature_names,
            &self.mean,
            &self.std,
            &self.components,
            &self.eigenvalues,
            self.threshold_t2,
        );
        if expected_checksum != self.checksum {
            return Err(BaselineError::ChecksumMismatch);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_model(p: usize, f: usize) -> BaselineModel {
        BaselineModel::new(
            (0..f).map(|i| format!("f{i}")).collect(),
            vec![0.0; f],
            vec![1.0; f],
            vec![0.1; p * f],
            vec![1.0; p],
            11.3,
        )
        .unwrap()
    }

    #[test]
    fn well_formed_model_validates() {
        let m = valid_model(4, 52);
        assert!(m.validate().is_ok());
    }

    #[test]
    fn zero_std_is_rejected() {
        let mut m = valid_model(4, 52);
        m.std[0] = 0.0;
        assert!(matches!(
            m.validate(),
            Err(BaselineError::NonPositiveStd(_))
        ));
    }

    #[test]
    fn mismatched_components_shape_rejected() {
        let mut m = valid_model(4, 52);
        m.components.pop();
        assert!(matches!(
            m.validate(),
            Err(BaselineError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn tampered_checksum_rejected() {
        let mut m = valid_model(4, 52);
        m.mean[0] = 999.0;
        assert!(matches!(m.validate(), Err(BaselineError::ChecksumMismatch)));
    }

    #[test]
    fn roundtrips_through_json() {
        let m = valid_model(3, 10);
        let text = serde_json::to_string(&m).unwrap();
        let back: BaselineModel = serde_json::from_str(&text).unwrap();
        assert_eq!(m, back);
        assert!(back.validate().is_ok());
    }
}
