//! Deterministic-seed synthetic stand-in for the real TEP simulator.
//!
//! Produces a plausible 41-measurement / 11-manipulated-variable frame each
//! tick: each XMEAS has a nominal operating point, first-order noise, and a
//! disturbance-channel sensitivity so injecting an IDV visibly moves a
//! handful of measurements (mirrors how the real TEP disturbance channels
//! each bias a specific subset of XMEAS/XMV). This is explicitly a stand-in
//! for the black-box simulator (§6), not a claim of TEP-accurate numerics.

use super::{RawStepOutput, Simulator, StepInput};
use crate::config::defaults::{N_XMEAS, N_XMV};
use crate::errors::SimulatorError;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};

/// Per-disturbance sensitivity: which XMEAS index it biases, and by how much
/// per unit magnitude. Loosely modeled after the real TEP's IDV->XMEAS map
/// (e.g. IDV(1) is an A/C feed ratio step that shows up in reactor feed
/// measurements) without claiming numeric fidelity.
fn disturbance_sensitivity(idv_index: usize) -> (usize, f64) {
    // Spread disturbances deterministically across measurement indices so
    // every IDV slot visibly perturbs a distinct XMEAS.
    let xmeas_index = idv_index % N_XMEAS;
    (xmeas_index, 8.0)
}

/// Synthetic stand-in for the Tennessee Eastman Process simulator.
pub struct SyntheticTep {
    rng: StdRng,
    nominal_measurements: [f64; N_XMEAS],
    nominal_manipulated: [f64; N_XMV],
    sim_time_seconds: f64,
    tick_seconds: f64,
}

impl SyntheticTep {
    /// `tick_seconds` is the simulated time advanced per `step()` call
    /// (independent of the wall-clock cadence the Driver sleeps for).
    pub fn new(seed: u64, tick_seconds: f64) -> Self {
        let mut nominal_measurements = [0.0; N_XMEAS];
        for (i, m) in nominal_measurements.iter_mut().enumerate() {
            // Spread nominal operating points so features are distinguishable.
            *m = 20.0 + (i as f64) * 3.3;
        }
        let mut nominal_manipulated = [50.0; N_XMV];
        for (i, m) in nominal_manipulated.iter_mut().enumerate() {
            *m = 40.0 + (i as f64) * 2.0;
        }

        Self {
            rng: StdRng::seed_from_u64(seed),
            nominal_measurements,
            nominal_manipulated,
            sim_time_seconds: 0.0,
            tick_seconds,
        }
    }
}

impl Simulator for SyntheticTep {
    fn step(&mut self, input: &StepInput) -> Result<RawStepOutput, SimulatorError> {
        let noise = Normal::new(0.0, 1.0)
            .map_err(|e| SimulatorError::Fatal(format!("invalid noise distribution: {e}")))?;

        let mut measurements = self.nominal_measurements;
        for m in measurements.iter_mut() {
            *m += noise.sample(&mut self.rng) * 0.5;
        }

        for (idv_index, &magnitude) in input.disturbances.iter().enumerate() {
            if magnitude > 0.0 {
                let (xmeas_index, sensitivity) = disturbance_sensitivity(idv_index);
                measurements[xmeas_index] += magnitude * sensitivity;
            }
        }

        let mut manipulated = self.nominal_manipulated;
        for i in 0..N_XMV {
            if let Some(v) = input.xmv_overrides[i] {
                manipulated[i] = v;
            } else {
                manipulated[i] += noise.sample(&mut self.rng) * 0.1;
            }
        }

        self.sim_time_seconds += self.tick_seconds;

        Ok(RawStepOutput {
            measurements,
            manipulated,
            sim_time_seconds: self.sim_time_seconds,
        })
    }
}
