//! SSE event payloads (§4.E, §6 "SSE event types").

use crate::types::{ControlState, SpeedPreset, SensorFrame};
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// `status` event payload: a consistent snapshot of driver/detector/
/// dispatcher state (§4.H "Status endpoint returns a consistent snapshot").
#[derive(Debug, Clone, Serialize)]
pub struct StatusSnapshot {
    pub driver_state: String,
    pub speed_preset: SpeedPreset,
    pub last_step: Option<u64>,
    pub subscriber_count: usize,
    pub last_t2: Option<f64>,
    pub last_anomaly_transition: Option<DateTime<Utc>>,
    pub dispatch_queue_depth: usize,
    pub last_analysis_at: Option<DateTime<Utc>>,
    /// Current operator intents, so `idv_magnitudes`/`xmv_overrides` set via
    /// the control API round-trip through `/status` (§8).
    pub control: ControlState,
}

/// `analysis_ready` event payload (§6).
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReadySummary {
    pub event_id: Uuid,
    pub record_id: Uuid,
    pub providers_summary: Vec<String>,
}

/// The three SSE event kinds this crate emits (§6 "SSE event types").
#[derive(Debug, Clone)]
pub enum BroadcastEvent {
    Frame(Box<SensorFrame>),
    Status(Box<StatusSnapshot>),
    AnalysisReady(Box<AnalysisReadySummary>),
}

impl BroadcastEvent {
    /// SSE `event:` field name.
    pub fn event_name(&self) -> &'static str {
        match self {
            BroadcastEvent::Frame(_) => "frame",
            BroadcastEvent::Status(_) => "status",
            BroadcastEvent::AnalysisReady(_) => "analysis_ready",
        }
    }

    /// JSON-serialized `data:` field payload.
    pub fn data_json(&self) -> serde_json::Result<String> {
        match self {
            BroadcastEvent::Frame(f) => serde_json::to_string(f),
            BroadcastEvent::Status(s) => serde_json::to_string(s),
            BroadcastEvent::AnalysisReady(a) => serde_json::to_string(a),
        }
    }
}
