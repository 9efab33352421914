//! Simulation Driver state machine (§4.C "States: Idle -> Running <-> Paused -> Idle (terminal on Stop)").

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DriverState {
    Idle,
    Running,
    Paused,
    /// Terminal after two consecutive simulator step failures (§4.C).
    Faulted,
}
