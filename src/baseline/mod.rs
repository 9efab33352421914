//! Baseline Model lifecycle: validated load plus atomic hot-swap (§3, §4.B,
//! §6 `/baseline/reload`).
//!
//! Grounded on the teacher's `ThresholdManager`-style schema-versioned
//! artifact and its `ArcSwap`-backed atomic reload: a staged
//! validate-then-swap so a malformed candidate never interrupts the model
//! currently serving traffic (§4.B "On reload failure... previous model
//! continues serving").

mod model;

pub use model::{BaselineModel, SCHEMA_VERSION};

use crate::errors::BaselineError;
use arc_swap::ArcSwap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Holds the currently-active [`BaselineModel`] behind an `ArcSwap` so
/// readers (the Detector, API snapshots) never block on a reload.
pub struct BaselineStore {
    current: ArcSwap<BaselineModel>,
    source_path: PathBuf,
}

impl BaselineStore {
    /// Loads the initial model from `path`; fails loudly, there is no
    /// "previous model" to fall back to before the store exists.
    pub fn load_initial<P: AsRef<Path>>(path: P) -> Result<Self, BaselineError> {
        let model = BaselineModel::load(&path)?;
        Ok(Self {
            current: ArcSwap::from_pointee(model),
            source_path: path.as_ref().to_path_buf(),
        })
    }

    /// Current model, cheaply cloned (an `Arc` bump).
    pub fn current(&self) -> Arc<BaselineModel> {
        self.current.load_full()
    }

    /// Validates a candidate artifact and swaps it in only if it passes
    /// (§4.B reload semantics). Returns the new feature count so the caller
    /// can decide whether the Frame Buffer needs flushing.
    pub fn reload(&self) -> Result<Arc<BaselineModel>, BaselineError> {
        let candidate = BaselineModel::load(&self.source_path)?;
        let candidate = Arc::new(candidate);
        self.current.store(candidate.clone());
        Ok(candidate)
    }

    /// Swaps in an already-validated model (used by tests and by callers
    /// that source the artifact from somewhere other than `source_path`).
    pub fn swap(&self, model: BaselineModel) {
        self.current.store(Arc::new(model));
    }

    pub fn source_path(&self) -> &Path {
        &self.source_path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn sample_model(f: usize) -> BaselineModel {
        BaselineModel::new(
            (0..f).map(|i| format!("f{i}")).collect(),
            vec![0.0; f],
            vec![1.0; f],
            vec![0.05; 3 * f],
            vec![2.0, 1.5, 1.0],
            10.0,
        )
        .unwrap()
    }

    fn write_artifact(dir: &tempfile::TempDir, model: &BaselineModel) -> PathBuf {
        let path = dir.path().join("baseline.json");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(serde_json::to_string(model).unwrap().as_bytes())
            .unwrap();
        path
    }

    #[test]
    fn loads_valid_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let model = sample_model(52);
        let path = write_artifact(&dir, &model);
        let store = BaselineStore::load_initial(&path).unwrap();
        assert_eq!(store.current().feature_count(), 52);
    }

    #[test]
    fn reload_swaps_to_new_model() {
        let dir = tempfile::tempdir().unwrap();
        let model = sample_model(10);
        let path = write_artifact(&dir, &model);
        let store = BaselineStore::load_initial(&path).unwrap();

        let new_model = sample_model(20);
        write_artifact(&dir, &new_model);
        // overwrite at the same path
        std::fs::write(&path, serde_json::to_string(&new_model).unwrap()).unwrap();

        let swapped = store.reload().unwrap();
        assert_eq!(swapped.feature_count(), 20);
        assert_eq!(store.current().feature_count(), 20);
    }

    #[test]
    fn reload_rejects_malformed_candidate_and_keeps_previous() {
        let dir = tempfile::tempdir().unwrap();
        let model = sample_model(10);
        let path = write_artifact(&dir, &model);
        let store = BaselineStore::load_initial(&path).unwrap();

        std::fs::write(&path, "not valid json").unwrap();
        let result = store.reload();
        assert!(result.is_err());
        assert_eq!(store.current().feature_count(), 10);
    }
}
