//! Orchestrator API handlers (§4.H, §6).

use super::envelope::{ApiFailure, Envelope};
use super::middleware::CorrelationIdExtension;
use super::state::AppState;
use crate::broadcast::StatusSnapshot;
use crate::errors::ControlError;
use crate::storage::ExportFormat;
use crate::types::SpeedPreset;
use axum::extract::{Extension, Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};

fn correlation_id(ext: &Extension<CorrelationIdExtension>) -> String {
    ext.0 .0.clone()
}

fn control_error_response(err: ControlError, correlation_id: String) -> ApiFailure {
    match err {
        ControlError::OutOfRange(m) => ApiFailure::bad_request("OUT_OF_RANGE", m, correlation_id),
        ControlError::NotANumber(m) => ApiFailure::bad_request("NOT_A_NUMBER", m, correlation_id),
        ControlError::UnknownIndex(m) => ApiFailure::bad_request("UNKNOWN_INDEX", m, correlation_id),
    }
}

#[derive(Serialize)]
pub struct DriverStateBody {
    pub state: String,
}

fn driver_state_body(state: &AppState) -> DriverStateBody {
    DriverStateBody {
        state: format!("{:?}", state.driver_state()).to_lowercase(),
    }
}

pub async fn start(
    State(state): State<AppState>,
    ext: Extension<CorrelationIdExtension>,
) -> impl IntoResponse {
    state.driver.start();
    Envelope::ok(driver_state_body(&state), correlation_id(&ext))
}

pub async fn pause(
    State(state): State<AppState>,
    ext: Extension<CorrelationIdExtension>,
) -> impl IntoResponse {
    state.driver.pause();
    Envelope::ok(driver_state_body(&state), correlation_id(&ext))
}

pub async fn resume(
    State(state): State<AppState>,
    ext: Extension<CorrelationIdExtension>,
) -> impl IntoResponse {
    state.driver.resume();
    Envelope::ok(driver_state_body(&state), correlation_id(&ext))
}

pub async fn stop(
    State(state): State<AppState>,
    ext: Extension<CorrelationIdExtension>,
) -> impl IntoResponse {
    state.driver.stop();
    Envelope::ok(driver_state_body(&state), correlation_id(&ext))
}

#[derive(Deserialize)]
pub struct SpeedBody {
    pub preset: SpeedPreset,
}

pub async fn set_speed(
    State(state): State<AppState>,
    ext: Extension<CorrelationIdExtension>,
    Json(body): Json<SpeedBody>,
) -> impl IntoResponse {
    state.control.set_speed_preset(body.preset);
    Envelope::ok(driver_state_body(&state), correlation_id(&ext))
}

#[derive(Deserialize)]
pub struct IdvBody {
    pub index: usize,
    pub magnitude: f64,
}

pub async fn set_idv(
    State(state): State<AppState>,
    ext: Extension<CorrelationIdExtension>,
    Json(body): Json<IdvBody>,
) -> Result<impl IntoResponse, ApiFailure> {
    let correlation_id = correlation_id(&ext);
    let index = body.index.checked_sub(1).ok_or_else(|| {
        ApiFailure::bad_request("UNKNOWN_INDEX", "idv index is 1-based", correlation_id.clone())
    })?;
    state
        .control
        .set_idv(index, body.magnitude)
        .map_err(|e| control_error_response(e, correlation_id.clone()))?;
    Ok(Envelope::ok((), correlation_id))
}

#[derive(Deserialize)]
pub struct XmvBody {
    pub index: usize,
    pub value: Option<f64>,
}

pub async fn set_xmv(
    State(state): State<AppState>,
    ext: Extension<CorrelationIdExtension>,
    Json(body): Json<XmvBody>,
) -> Result<impl IntoResponse, ApiFailure> {
    let correlation_id = correlation_id(&ext);
    let index = body.index.checked_sub(1).ok_or_else(|| {
        ApiFailure::bad_request("UNKNOWN_INDEX", "xmv index is 1-based", correlation_id.clone())
    })?;
    state
        .control
        .set_xmv(index, body.value)
        .map_err(|e| control_error_response(e, correlation_id.clone()))?;
    Ok(Envelope::ok((), correlation_id))
}

pub async fn stop_all_faults(
    State(state): State<AppState>,
    ext: Extension<CorrelationIdExtension>,
) -> impl IntoResponse {
    state.control.stop_all_faults();
    Envelope::ok((), correlation_id(&ext))
}

pub async fn status(
    State(state): State<AppState>,
    ext: Extension<CorrelationIdExtension>,
) -> impl IntoResponse {
    let metrics = state.driver.metrics();
    let dispatch_metrics = state.dispatcher.metrics();
    let snapshot = StatusSnapshot {
        driver_state: format!("{:?}", state.driver_state()).to_lowercase(),
        speed_preset: state.control.speed_preset(),
        last_step: Some(metrics.last_step.load(std::sync::atomic::Ordering::Relaxed)),
        subscriber_count: state.broadcaster.subscriber_count(),
        last_t2: Some(metrics.last_t2()),
        last_anomaly_transition: metrics.last_anomaly_transition(),
        dispatch_queue_depth: state.dispatcher.queue_depth_in_use(),
        last_analysis_at: dispatch_metrics.last_analysis_at(),
        control: (*state.control.snapshot()).clone(),
    };
    Envelope::ok(snapshot, correlation_id(&ext))
}

/// Prometheus text exposition format (§6 `/metrics`).
pub async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    let m = state.driver.metrics();
    let d = state.dispatcher.metrics();
    let body = format!(
        "# HELP tep_sentinel_last_step Last published simulator step.\n\
         # TYPE tep_sentinel_last_step gauge\n\
         tep_sentinel_last_step {}\n\
         # HELP tep_sentinel_frames_published_total Total frames published to the Window/Broadcaster.\n\
         # TYPE tep_sentinel_frames_published_total counter\n\
         tep_sentinel_frames_published_total {}\n\
         # HELP tep_sentinel_frames_dropped_total SSE frame events evicted under drop-oldest backpressure.\n\
         # TYPE tep_sentinel_frames_dropped_total counter\n\
         tep_sentinel_frames_dropped_total {}\n\
         # HELP tep_sentinel_missed_deadlines_total Missed real-time deadlines.\n\
         # TYPE tep_sentinel_missed_deadlines_total counter\n\
         tep_sentinel_missed_deadlines_total {}\n\
         # HELP tep_sentinel_step_lag_ms Lag of the most recent step past its deadline, in milliseconds.\n\
         # TYPE tep_sentinel_step_lag_ms gauge\n\
         tep_sentinel_step_lag_ms {}\n\
         # HELP tep_sentinel_last_t2 Most recent Hotelling T^2 statistic.\n\
         # TYPE tep_sentinel_last_t2 gauge\n\
         tep_sentinel_last_t2 {}\n\
         # HELP tep_sentinel_sse_subscribers Current SSE subscriber count.\n\
         # TYPE tep_sentinel_sse_subscribers gauge\n\
         tep_sentinel_sse_subscribers {}\n\
         # HELP tep_sentinel_dispatches_total Total LLM dispatch attempts.\n\
         # TYPE tep_sentinel_dispatches_total counter\n\
         tep_sentinel_dispatches_total {}\n\
         # HELP tep_sentinel_dispatch_errors_total Provider calls that ended in error, refusal, or timeout.\n\
         # TYPE tep_sentinel_dispatch_errors_total counter\n\
         tep_sentinel_dispatch_errors_total {}\n",
        m.last_step.load(std::sync::atomic::Ordering::Relaxed),
        m.last_step.load(std::sync::atomic::Ordering::Relaxed),
        state.broadcaster.frames_dropped_total(),
        m.missed_deadlines.load(std::sync::atomic::Ordering::Relaxed),
        m.last_step_lag_ms.load(std::sync::atomic::Ordering::Relaxed),
        m.last_t2(),
        state.broadcaster.subscriber_count(),
        d.dispatches_total.load(std::sync::atomic::Ordering::Relaxed),
        d.dispatch_errors_total.load(std::sync::atomic::Ordering::Relaxed),
    );
    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4")],
        body,
    )
}

pub async fn baseline_reload(
    State(state): State<AppState>,
    ext: Extension<CorrelationIdExtension>,
) -> Result<impl IntoResponse, ApiFailure> {
    let correlation_id = correlation_id(&ext);
    match state.baseline.reload() {
        Ok(model) => {
            // A reloaded model may have a different feature shape than the
            // frames already buffered under the old one; flush rather than
            // risk mixing shapes (§4.A "buffer is flushed").
            state.window.flush();
            Ok(Envelope::ok(
                serde_json::json!({ "feature_count": model.feature_count() }),
                correlation_id,
            ))
        }
        Err(e) => Err(ApiFailure::new(
            StatusCode::UNPROCESSABLE_ENTITY,
            "BASELINE_INVALID",
            e.to_string(),
            correlation_id,
        )),
    }
}

#[derive(Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<usize>,
}

pub async fn analysis_history(
    State(state): State<AppState>,
    ext: Extension<CorrelationIdExtension>,
    Query(query): Query<HistoryQuery>,
) -> Result<impl IntoResponse, ApiFailure> {
    let correlation_id = correlation_id(&ext);
    let limit = query.limit.unwrap_or(50);
    let records = state
        .store
        .list(limit, None)
        .map_err(|e| ApiFailure::new(StatusCode::INTERNAL_SERVER_ERROR, "STORAGE_ERROR", e.to_string(), correlation_id.clone()))?;
    Ok(Envelope::ok(records, correlation_id))
}

pub async fn analysis_history_by_date(
    State(state): State<AppState>,
    ext: Extension<CorrelationIdExtension>,
    Path(date): Path<String>,
) -> Result<impl IntoResponse, ApiFailure> {
    let correlation_id = correlation_id(&ext);
    let date = chrono::NaiveDate::parse_from_str(&date, "%Y-%m-%d").map_err(|_| {
        ApiFailure::bad_request("INVALID_DATE", "expected YYYY-MM-DD", correlation_id.clone())
    })?;
    let records = state
        .store
        .download_date(date)
        .map_err(|e| ApiFailure::new(StatusCode::INTERNAL_SERVER_ERROR, "STORAGE_ERROR", e.to_string(), correlation_id.clone()))?;
    Ok(Envelope::ok(records, correlation_id))
}

pub async fn analysis_history_download(
    State(state): State<AppState>,
    ext: Extension<CorrelationIdExtension>,
    Path(format): Path<String>,
) -> Result<impl IntoResponse, ApiFailure> {
    let correlation_id = correlation_id(&ext);
    let export_format = match format.as_str() {
        "jsonl" => ExportFormat::Jsonl,
        "csv" => ExportFormat::Csv,
        other => {
            return Err(ApiFailure::bad_request(
                "UNKNOWN_FORMAT",
                format!("unknown export format: {other}"),
                correlation_id,
            ))
        }
    };
    let body = state.store.download_all(export_format).map_err(|e| {
        ApiFailure::new(StatusCode::INTERNAL_SERVER_ERROR, "STORAGE_ERROR", e.to_string(), correlation_id.clone())
    })?;
    let content_type = match export_format {
        ExportFormat::Jsonl => "application/x-ndjson",
        ExportFormat::Csv => "text/csv",
    };
    Ok((StatusCode::OK, [("content-type", content_type)], body))
}
