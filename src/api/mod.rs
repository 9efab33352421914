//! Orchestrator API (§4.H): Axum HTTP surface over the Driver, Control
//! Plane, Baseline Store, SSE Broadcaster, and Analysis Store.
//!
//! Grounded on the teacher's `api/mod.rs`/`api/routes.rs`/`api/envelope.rs`
//! layering: a plain `Router` builder function, handlers as free functions
//! taking `State<AppState>`, and the `{data,meta}`/`{error,meta}` envelope
//! shape the teacher uses verbatim (§7).

mod envelope;
mod handlers;
mod middleware;
mod routes;
mod sse;
mod state;

pub use routes::build_router;
pub use state::AppState;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::baseline::BaselineStore;
    use crate::broadcast::Broadcaster;
    use crate::control::ControlPlane;
    use crate::driver::Driver;
    use crate::frame_buffer::Window;
    use crate::llm::Dispatcher;
    use crate::storage::AnalysisStore;
    use crate::types::SensorFrame;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use std::sync::Arc;
    use std::time::Duration;
    use tower::ServiceExt;

    fn test_state() -> AppState {
        let names = SensorFrame::canonical_feature_names();
        let f = names.len();
        let model = crate::baseline::BaselineModel::new(
            names,
            vec![0.0; f],
            vec![1.0; f],
            vec![0.0; f],
            vec![1.0],
            11.3,
        )
        .unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("baseline.json");
        std::fs::write(&path, serde_json::to_string(&model).unwrap()).unwrap();
        std::mem::forget(dir);

        let window = Arc::new(Window::new(20));
        let control = Arc::new(ControlPlane::new());
        let baseline = Arc::new(BaselineStore::load_initial(&path).unwrap());
        let broadcaster = Arc::new(Broadcaster::new(64, 3));
        let store_dir = tempfile::tempdir().unwrap();
        let store = Arc::new(AnalysisStore::new(store_dir.path()));
        std::mem::forget(store_dir);
        let dispatcher = Arc::new(Dispatcher::spawn(
            Vec::new(),
            store.clone(),
            broadcaster.clone(),
            16,
            Duration::from_secs(70),
            Duration::from_secs(30),
            1.0,
        ));
        let driver = Arc::new(Driver::new(
            window.clone(),
            control.clone(),
            baseline.clone(),
            broadcaster.clone(),
            dispatcher.clone(),
        ));

        AppState {
            window,
            control,
            baseline,
            broadcaster,
            dispatcher,
            store,
            driver,
        }
    }

    #[tokio::test]
    async fn status_returns_ok_envelope() {
        let app = build_router(test_state());
        let response = app
            .oneshot(Request::builder().uri("/status").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn start_pause_resume_stop_roundtrip() {
        let app = build_router(test_state());
        for path in ["/simulation/start", "/simulation/pause", "/simulation/resume", "/simulation/stop"] {
            let response = app
                .clone()
                .oneshot(Request::builder().method("POST").uri(path).body(Body::empty()).unwrap())
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK, "{path} failed");
        }
    }

    #[tokio::test]
    async fn invalid_idv_index_returns_bad_request() {
        let app = build_router(test_state());
        let body = serde_json::json!({ "index": 999, "magnitude": 0.5 }).to_string();
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/idv")
                    .header("content-type", "application/json")
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn valid_xmv_override_is_accepted() {
        let app = build_router(test_state());
        let body = serde_json::json!({ "index": 1, "value": 55.0 }).to_string();
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/xmv")
                    .header("content-type", "application/json")
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn metrics_endpoint_returns_prometheus_text() {
        let app = build_router(test_state());
        let response = app
            .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn unknown_download_format_is_rejected() {
        let app = build_router(test_state());
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/analysis/history/download/xml")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
