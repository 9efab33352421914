//! Route table for the Orchestrator API (§6).

use super::handlers;
use super::middleware::correlation_id_middleware;
use super::sse;
use super::state::AppState;
use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/simulation/start", post(handlers::start))
        .route("/simulation/pause", post(handlers::pause))
        .route("/simulation/resume", post(handlers::resume))
        .route("/simulation/stop", post(handlers::stop))
        .route("/speed", post(handlers::set_speed))
        .route("/idv", post(handlers::set_idv))
        .route("/xmv", post(handlers::set_xmv))
        .route("/stop-all-faults", post(handlers::stop_all_faults))
        .route("/status", get(handlers::status))
        .route("/metrics", get(handlers::metrics))
        .route("/baseline/reload", post(handlers::baseline_reload))
        .route("/analysis/history", get(handlers::analysis_history))
        .route(
            "/analysis/history/bydate/:date",
            get(handlers::analysis_history_by_date),
        )
        .route(
            "/analysis/history/download/:format",
            get(handlers::analysis_history_download),
        )
        .route("/stream", get(sse::stream))
        .layer(middleware::from_fn(correlation_id_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
