//! GET /stream: SSE fan-out of frame/status/analysis_ready events (§4.E, §6).

use super::state::AppState;
use crate::broadcast::Broadcaster;
use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::{self, Stream};
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

/// Removes the subscriber from the `Broadcaster` when the SSE connection
/// drops, so a disconnected dashboard doesn't leak a queue forever.
struct SubscriptionGuard {
    broadcaster: Arc<Broadcaster>,
    id: u64,
}

impl Drop for SubscriptionGuard {
    fn drop(&mut self) {
        self.broadcaster.unsubscribe(self.id);
    }
}

pub async fn stream(State(state): State<AppState>) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let (subscriber_id, queue) = state.broadcaster.subscribe();
    let guard = Arc::new(SubscriptionGuard {
        broadcaster: state.broadcaster.clone(),
        id: subscriber_id,
    });

    let events = stream::unfold((queue, guard), |(queue, guard)| async move {
        match queue.recv().await {
            Some(event) => {
                let built = match event.data_json() {
                    Ok(json) => Event::default().event(event.event_name()).data(json),
                    Err(e) => {
                        tracing::error!(error = %e, "failed to serialize SSE event");
                        guard.broadcaster.record_write_error(guard.id);
                        Event::default().event("error").data("serialization_error")
                    }
                };
                Some((Ok(built), (queue, guard)))
            }
            None => None,
        }
    });

    Sse::new(events).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(crate::config::defaults::SSE_HEARTBEAT_SECS))
            .text("heartbeat"),
    )
}

#[cfg(test)]
mod tests {
    use crate::broadcast::{BroadcastEvent, Broadcaster};
    use crate::config::defaults::{N_IDV, N_XMEAS, N_XMV};
    use crate::types::SensorFrame;
    use chrono::Utc;

    #[tokio::test]
    async fn subscribed_queue_receives_published_frame_event() {
        let broadcaster = Broadcaster::new(8, 3);
        let (_id, queue) = broadcaster.subscribe();
        broadcaster.publish_frame(SensorFrame {
            step: 1,
            sim_time_seconds: 1.0,
            wall_time: Utc::now(),
            measurements: vec![0.0; N_XMEAS],
            manipulated: vec![0.0; N_XMV],
            disturbances: vec![0; N_IDV],
            derived: None,
        });
        let event = queue.recv().await.unwrap();
        assert_eq!(event.event_name(), "frame");
        assert!(matches!(event, BroadcastEvent::Frame(_)));
    }
}
