//! Control Plane (§4.D): operator-facing mutation of [`ControlState`] plus
//! atomic read-out into the next simulator [`StepInput`].
//!
//! Grounded on the teacher's config hot-reload pattern (`ArcSwap` behind a
//! small façade) applied here to operator intents instead of static
//! configuration: writers (the API handlers) mutate through a `Mutex` to
//! serialize edits, readers (the Driver, at each step boundary) get a
//! cheap atomic snapshot via `ArcSwap` that never blocks on an in-flight edit.

use crate::config::defaults::{N_IDV, N_XMV};
use crate::errors::ControlError;
use crate::simulator::StepInput;
use crate::types::{ControlState, SpeedPreset};
use arc_swap::ArcSwap;
use std::sync::{Arc, Mutex};

/// Shared, thread-safe home for the current [`ControlState`] (§4.D).
pub struct ControlPlane {
    published: ArcSwap<ControlState>,
    staging: Mutex<ControlState>,
}

impl Default for ControlPlane {
    fn default() -> Self {
        Self::new()
    }
}

impl ControlPlane {
    pub fn new() -> Self {
        Self {
            published: ArcSwap::from_pointee(ControlState::default()),
            staging: Mutex::new(ControlState::default()),
        }
    }

    /// A cheap, independent snapshot of the currently published state.
    pub fn snapshot(&self) -> Arc<ControlState> {
        self.published.load_full()
    }

    /// Assembles the next-step [`StepInput`] from the published state
    /// (§4.D step 3: "Read ControlState atomically to assemble the
    /// next-step input").
    pub fn step_input(&self) -> StepInput {
        let state = self.snapshot();
        let mut disturbances = [0.0; N_IDV];
        disturbances.copy_from_slice(&state.idv_magnitudes);
        let mut xmv_overrides = [None; N_XMV];
        xmv_overrides.copy_from_slice(&state.xmv_overrides);
        StepInput {
            disturbances,
            xmv_overrides,
        }
    }

    /// Serializes an edit through `staging` and then publishes the result,
    /// so concurrent operator calls never interleave their mutations.
    fn edit<F>(&self, f: F) -> Result<(), ControlError>
    where
        F: FnOnce(&mut ControlState) -> Result<(), ControlError>,
    {
        #[allow(clippy::unwrap_used)]
        let mut guard = self.staging.lock().unwrap();
        f(&mut guard)?;
        self.published.store(Arc::new(guard.clone()));
        Ok(())
    }

    pub fn set_xmv(&self, index: usize, value: Option<f64>) -> Result<(), ControlError> {
        self.edit(|s| s.set_xmv(index, value))
    }

    pub fn set_idv(&self, index: usize, magnitude: f64) -> Result<(), ControlError> {
        self.edit(|s| s.set_idv(index, magnitude))
    }

    pub fn stop_all_faults(&self) {
        #[allow(clippy::unwrap_used)]
        let mut guard = self.staging.lock().unwrap();
        guard.stop_all_faults();
        self.published.store(Arc::new(guard.clone()));
    }

    pub fn set_speed_preset(&self, preset: SpeedPreset) {
        #[allow(clippy::unwrap_used)]
        let mut guard = self.staging.lock().unwrap();
        guard.set_speed_preset(preset);
        self.published.store(Arc::new(guard.clone()));
    }

    pub fn speed_preset(&self) -> SpeedPreset {
        self.snapshot().speed_preset
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_input_reflects_published_idv() {
        let plane = ControlPlane::new();
        plane.set_idv(2, 0.7).unwrap();
        let input = plane.step_input();
        assert_eq!(input.disturbances[2], 0.7);
    }

    #[test]
    fn step_input_reflects_xmv_override() {
        let plane = ControlPlane::new();
        plane.set_xmv(0, Some(60.0)).unwrap();
        let input = plane.step_input();
        assert_eq!(input.xmv_overrides[0], Some(60.0));
    }

    #[test]
    fn stop_all_faults_clears_step_input() {
        let plane = ControlPlane::new();
        plane.set_idv(0, 1.0).unwrap();
        plane.set_xmv(0, Some(10.0)).unwrap();
        plane.stop_all_faults();
        let input = plane.step_input();
        assert_eq!(input.disturbances, [0.0; N_IDV]);
        assert_eq!(input.xmv_overrides, [None; N_XMV]);
    }

    #[test]
    fn rejects_invalid_edit_without_publishing_partial_state() {
        let plane = ControlPlane::new();
        assert!(plane.set_idv(999, 1.0).is_err());
        assert_eq!(plane.step_input().disturbances, [0.0; N_IDV]);
    }

    #[test]
    fn speed_preset_roundtrips() {
        let plane = ControlPlane::new();
        plane.set_speed_preset(SpeedPreset::Demo);
        assert_eq!(plane.speed_preset(), SpeedPreset::Demo);
    }
}
