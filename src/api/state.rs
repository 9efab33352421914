//! Shared application state injected into every Axum handler.

use crate::baseline::BaselineStore;
use crate::broadcast::Broadcaster;
use crate::control::ControlPlane;
use crate::driver::{Driver, DriverState};
use crate::frame_buffer::Window;
use crate::llm::Dispatcher;
use crate::storage::AnalysisStore;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub window: Arc<Window>,
    pub control: Arc<ControlPlane>,
    pub baseline: Arc<BaselineStore>,
    pub broadcaster: Arc<Broadcaster>,
    pub dispatcher: Arc<Dispatcher>,
    pub store: Arc<AnalysisStore>,
    pub driver: Arc<Driver>,
}

impl AppState {
    pub fn driver_state(&self) -> DriverState {
        self.driver.state()
    }
}
