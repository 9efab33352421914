//! `ControlState` — current operator intents (§3, §4.D).

use crate::config::defaults::{N_IDV, N_XMV};
use crate::errors::ControlError;
use serde::{Deserialize, Serialize};

/// Real-time cadence preset (§3). Maps to a fixed real-time interval
/// between simulator steps via [`crate::config::AppConfig::interval_secs`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpeedPreset {
    Real,
    Fast,
    Demo,
}

impl std::fmt::Display for SpeedPreset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SpeedPreset::Real => write!(f, "real"),
            SpeedPreset::Fast => write!(f, "fast"),
            SpeedPreset::Demo => write!(f, "demo"),
        }
    }
}

impl Default for SpeedPreset {
    fn default() -> Self {
        SpeedPreset::Fast
    }
}

/// Maximum magnitude an IDV slot can be set to (§3 `idv_magnitudes`).
pub const MAX_IDV_MAGNITUDE: f64 = 1.0;

/// Operator intents accumulated since the last step boundary promotion (§4.D).
///
/// `xmv_overrides[i] == None` means "let the simulator's own controller
/// drive this manipulated variable"; `Some(v)` pins it to `v`.
/// `idv_magnitudes[i] > 0.0` means that disturbance channel is active.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlState {
    pub xmv_overrides: [Option<f64>; N_XMV],
    pub idv_magnitudes: [f64; N_IDV],
    pub speed_preset: SpeedPreset,
}

impl Default for ControlState {
    fn default() -> Self {
        Self {
            xmv_overrides: [None; N_XMV],
            idv_magnitudes: [0.0; N_IDV],
            speed_preset: SpeedPreset::default(),
        }
    }
}

impl ControlState {
    /// Set an XMV override, clamped to `[0, 100]`. Rejects `NaN` (§4.D).
    pub fn set_xmv(&mut self, index: usize, value: Option<f64>) -> Result<(), ControlError> {
        if index >= N_XMV {
            return Err(ControlError::UnknownIndex(format!("xmv[{index}]")));
        }
        match value {
            None => self.xmv_overrides[index] = None,
            Some(v) => {
                if v.is_nan() {
                    return Err(ControlError::NotANumber(format!("xmv[{index}]")));
                }
                self.xmv_overrides[index] = Some(v.clamp(0.0, 100.0));
            }
        }
        Ok(())
    }

    /// Set an IDV magnitude, clamped to `[0, max]` (§4.D). NaN is rejected.
    pub fn set_idv(&mut self, index: usize, magnitude: f64) -> Result<(), ControlError> {
        if index >= N_IDV {
            return Err(ControlError::UnknownIndex(format!("idv[{index}]")));
        }
        if magnitude.is_nan() {
            return Err(ControlError::NotANumber(format!("idv[{index}]")));
        }
        self.idv_magnitudes[index] = magnitude.clamp(0.0, MAX_IDV_MAGNITUDE);
        Ok(())
    }

    /// Whether the IDV flag for a slot is active (magnitude > 0), per §4.D.
    pub fn idv_active(&self, index: usize) -> bool {
        self.idv_magnitudes.get(index).is_some_and(|&m| m > 0.0)
    }

    /// "Stop all faults": clears IDV magnitudes to zero and XMV overrides
    /// to unset (§4.D, Open Question #3 resolved in DESIGN.md).
    pub fn stop_all_faults(&mut self) {
        self.idv_magnitudes = [0.0; N_IDV];
        self.xmv_overrides = [None; N_XMV];
    }

    pub fn set_speed_preset(&mut self, preset: SpeedPreset) {
        self.speed_preset = preset;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn xmv_clamped_to_range() {
        let mut cs = ControlState::default();
        cs.set_xmv(0, Some(150.0)).unwrap();
        assert_eq!(cs.xmv_overrides[0], Some(100.0));
        cs.set_xmv(0, Some(-10.0)).unwrap();
        assert_eq!(cs.xmv_overrides[0], Some(0.0));
    }

    #[test]
    fn xmv_rejects_nan() {
        let mut cs = ControlState::default();
        assert!(cs.set_xmv(0, Some(f64::NAN)).is_err());
    }

    #[test]
    fn idv_roundtrips_and_activates() {
        let mut cs = ControlState::default();
        cs.set_idv(1, 0.5).unwrap();
        assert_eq!(cs.idv_magnitudes[1], 0.5);
        assert!(cs.idv_active(1));
        assert!(!cs.idv_active(2));
    }

    #[test]
    fn idv_clamped_to_max() {
        let mut cs = ControlState::default();
        cs.set_idv(0, 5.0).unwrap();
        assert_eq!(cs.idv_magnitudes[0], MAX_IDV_MAGNITUDE);
    }

    #[test]
    fn unknown_index_rejected() {
        let mut cs = ControlState::default();
        assert!(matches!(
            cs.set_idv(999, 1.0),
            Err(ControlError::UnknownIndex(_))
        ));
    }

    #[test]
    fn stop_all_faults_clears_both() {
        let mut cs = ControlState::default();
        cs.set_idv(0, 1.0).unwrap();
        cs.set_xmv(0, Some(50.0)).unwrap();
        cs.stop_all_faults();
        assert_eq!(cs.idv_magnitudes, [0.0; N_IDV]);
        assert_eq!(cs.xmv_overrides, [None; N_XMV]);
    }
}
