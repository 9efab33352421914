//! Shared data types (§3 DATA MODEL).

mod analysis;
mod anomaly;
mod control;
mod frame;

pub use analysis::{AnalysisRecord, PerformanceSummary, ProviderResult, ProviderStatus};
pub use anomaly::{AnomalyEvent, DispatchState};
pub use control::{ControlState, SpeedPreset};
pub use frame::{Derived, FeatureContribution, SensorFrame};

use crate::config::defaults::{N_IDV, N_XMEAS, N_XMV};

/// Asserted at several call sites as a documented invariant, not re-derived each time.
pub const fn fixed_vector_lengths() -> (usize, usize, usize) {
    (N_XMEAS, N_XMV, N_IDV)
}
