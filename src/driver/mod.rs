//! Simulation Driver (§4.C): the single-writer real-time scheduler that
//! owns the simulator handle and the Frame Buffer, and drives the Detector
//! and LLM Dispatcher off of each new frame.
//!
//! Grounded on the teacher's real-time acquisition loop (deadline-based
//! sleep, no-burst-catchup, single-retry-then-fault failure handling) now
//! generalized over the [`Simulator`] trait instead of the teacher's sensor
//! polling loop.

mod state;

pub use state::DriverState;

use crate::baseline::BaselineStore;
use crate::broadcast::{Broadcaster, StatusSnapshot};
use crate::config::defaults::N_CONSEC;
use crate::control::ControlPlane;
use crate::detector::{self, TriggerOutcome, TriggerPolicy};
use crate::errors::DetectorError;
use crate::frame_buffer::Window;
use crate::llm::{DispatchRequest, Dispatcher, PromptContext};
use crate::simulator::{Simulator, StepInput};
use crate::types::{AnomalyEvent, SensorFrame, SpeedPreset};
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio_util::sync::CancellationToken;

/// Shared counters surfaced on `/status` and `/metrics` (§4.H, §6).
#[derive(Debug, Default)]
pub struct DriverMetrics {
    pub last_step: AtomicU64,
    pub missed_deadlines: AtomicU64,
    pub last_t2_bits: AtomicU64,
    pub last_step_lag_ms: AtomicU64,
    /// Unix millis of the last anomaly open/close transition, `0` meaning
    /// "none yet" (§4.H `last_anomaly_transition`).
    last_anomaly_transition_millis: AtomicI64,
}

impl DriverMetrics {
    pub fn last_t2(&self) -> f64 {
        f64::from_bits(self.last_t2_bits.load(Ordering::Relaxed))
    }

    fn set_last_t2(&self, value: f64) {
        self.last_t2_bits.store(value.to_bits(), Ordering::Relaxed);
    }

    fn record_anomaly_transition(&self, at: chrono::DateTime<chrono::Utc>) {
        self.last_anomaly_transition_millis
            .store(at.timestamp_millis(), Ordering::Relaxed);
    }

    pub fn last_anomaly_transition(&self) -> Option<chrono::DateTime<chrono::Utc>> {
        match self.last_anomaly_transition_millis.load(Ordering::Relaxed) {
            0 => None,
            millis => chrono::DateTime::from_timestamp_millis(millis),
        }
    }
}

/// Orchestrates the full real-time loop described in §4.C.
pub struct Driver {
    window: Arc<Window>,
    control: Arc<ControlPlane>,
    baseline: Arc<BaselineStore>,
    broadcaster: Arc<Broadcaster>,
    dispatcher: Arc<Dispatcher>,
    metrics: Arc<DriverMetrics>,
    state_tx: watch::Sender<DriverState>,
}

impl Driver {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        window: Arc<Window>,
        control: Arc<ControlPlane>,
        baseline: Arc<BaselineStore>,
        broadcaster: Arc<Broadcaster>,
        dispatcher: Arc<Dispatcher>,
    ) -> Self {
        let (state_tx, _rx) = watch::channel(DriverState::Idle);
        Self {
            window,
            control,
            baseline,
            broadcaster,
            dispatcher,
            metrics: Arc::new(DriverMetrics::default()),
            state_tx,
        }
    }

    pub fn state(&self) -> DriverState {
        *self.state_tx.borrow()
    }

    pub fn metrics(&self) -> Arc<DriverMetrics> {
        self.metrics.clone()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<DriverState> {
        self.state_tx.subscribe()
    }

    /// Requests a transition to Running; the caller's spawned task performs
    /// `run_loop` until Pause/Stop is observed.
    pub fn start(&self) {
        self.state_tx.send_if_modified(|s| {
            if *s == DriverState::Idle {
                *s = DriverState::Running;
                true
            } else {
                false
            }
        });
    }

    pub fn pause(&self) {
        self.state_tx.send_if_modified(|s| {
            if *s == DriverState::Running {
                *s = DriverState::Paused;
                true
            } else {
                false
            }
        });
    }

    pub fn resume(&self) {
        self.state_tx.send_if_modified(|s| {
            if *s == DriverState::Paused {
                *s = DriverState::Running;
                true
            } else {
                false
            }
        });
    }

    /// Stop is terminal (§4.C "Idle (terminal on Stop)"): returns to Idle
    /// but cancels any dispatches still pending (§4.F "Cancellation").
    pub fn stop(&self) {
        self.state_tx.send_if_modified(|s| {
            if *s != DriverState::Idle && *s != DriverState::Faulted {
                *s = DriverState::Idle;
                true
            } else {
                false
            }
        });
        self.dispatcher.cancel_all();
    }

    /// Runs the real-time loop (§4.C steps 1-9) until the state becomes
    /// Idle/Faulted or `shutdown` fires. Intended to be spawned as one
    /// long-lived task; `simulator` is owned exclusively by this loop,
    /// matching the "never called concurrently on the same handle" rule.
    pub async fn run_loop(
        &self,
        mut simulator: Box<dyn Simulator>,
        interval_for: impl Fn(SpeedPreset) -> Duration,
        shutdown: CancellationToken,
    ) {
        let mut state_rx = self.state_tx.subscribe();
        let mut trigger = TriggerPolicy::new(N_CONSEC);
        let mut open_event: Option<AnomalyEvent> = None;
        let mut deadline = tokio::time::Instant::now();

        loop {
            if shutdown.is_cancelled() {
                return;
            }

            let current_state = *state_rx.borrow();
            match current_state {
                DriverState::Idle | DriverState::Faulted => {
                    tokio::select! {
                        changed = state_rx.changed() => {
                            if changed.is_err() { return; }
                        }
                        _ = shutdown.cancelled() => { return; }
                    }
                    deadline = tokio::time::Instant::now();
                    continue;
                }
                DriverState::Paused => {
                    tokio::select! {
                        changed = state_rx.changed() => {
                            if changed.is_err() { return; }
                        }
                        _ = shutdown.cancelled() => { return; }
                    }
                    continue;
                }
                DriverState::Running => {}
            }

            // Step 1-2: deadline-based sleep, cancellable by a state change
            // (Pause/Stop) or a speed preset change (§4.C "current in-flight
            // sleep is cancelled and recomputed").
            let interval = interval_for(self.control.speed_preset());
            tokio::select! {
                _ = tokio::time::sleep_until(deadline) => {}
                _ = state_rx.changed() => { continue; }
                _ = shutdown.cancelled() => { return; }
            }

            // Step 3: read ControlState atomically.
            let input = self.control.step_input();

            // Step 4: invoke simulator, single retry with identity inputs
            // on transient failure, Faulted after two failures (§4.C).
            let raw = match simulator.step(&input) {
                Ok(raw) => raw,
                Err(first_err) => {
                    tracing::warn!(error = %first_err, "simulator step failed, retrying with identity inputs");
                    match simulator.step(&StepInput::identity()) {
                        Ok(raw) => raw,
                        Err(second_err) => {
                            tracing::error!(error = %second_err, "simulator step failed twice, driver is faulted");
                            self.state_tx.send_if_modified(|s| {
                                *s = DriverState::Faulted;
                                true
                            });
                            self.broadcaster.publish_status(self.status_snapshot());
                            continue;
                        }
                    }
                }
            };

            // Step 5: assemble the frame.
            let previous_step = self.window.latest().map(|f| f.step).unwrap_or(0);
            let mut frame = SensorFrame {
                step: previous_step + 1,
                sim_time_seconds: raw.sim_time_seconds,
                wall_time: chrono::Utc::now(),
                measurements: raw.measurements.to_vec(),
                manipulated: raw.manipulated.to_vec(),
                disturbances: input
                    .disturbances
                    .iter()
                    .map(|&d| if d > 0.0 { 1 } else { 0 })
                    .collect(),
                derived: None,
            };

            // Step 7: evaluate the detector before publishing so the
            // published frame always carries its `derived` block, once the
            // window has accumulated enough history (§8 "buffer underflow").
            let model = self.baseline.current();
            match detector::derive(&model, &frame, self.window.len(), self.window.capacity()) {
                Err(DetectorError::WindowNotReady { have, need }) => {
                    tracing::debug!(have, need, "window not yet full, skipping detection for this frame");
                }
                Ok(derived) => {
                    self.metrics.set_last_t2(derived.t2_stat);
                    let anomaly = derived.anomaly;
                    let contributions = derived.contributing_features.clone();
                    frame.derived = Some(derived);

                    match trigger.observe(anomaly) {
                        TriggerOutcome::Opened => {
                            let event = AnomalyEvent::open(frame.step, self.metrics.last_t2(), &contributions);
                            self.metrics.record_anomaly_transition(frame.wall_time);
                            self.maybe_dispatch(&event, &frame);
                            open_event = Some(event);
                        }
                        TriggerOutcome::StillOpen => {
                            if let Some(event) = open_event.as_mut() {
                                event.observe_peak(frame.step, self.metrics.last_t2());
                                event.accumulate(&contributions);
                                let snapshot = event.clone();
                                self.maybe_dispatch(&snapshot, &frame);
                            }
                        }
                        TriggerOutcome::Closed => {
                            if let Some(mut event) = open_event.take() {
                                event.close(frame.step);
                                self.metrics.record_anomaly_transition(frame.wall_time);
                            }
                        }
                        TriggerOutcome::Idle => {}
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, "detector error, publishing frame without derived block");
                }
            }

            // Step 6: append to Window, publish to SSE Broadcaster.
            self.window.append(frame.clone());
            self.metrics.last_step.store(frame.step, Ordering::Relaxed);
            self.broadcaster.publish_frame(frame);

            // Step 9 / time discipline: no burst-catchup on overrun.
            let now = tokio::time::Instant::now();
            let next_deadline = deadline + interval;
            if next_deadline <= now {
                self.metrics.missed_deadlines.fetch_add(1, Ordering::Relaxed);
                self.metrics
                    .last_step_lag_ms
                    .store((now - next_deadline).as_millis() as u64, Ordering::Relaxed);
                deadline = now + interval;
            } else {
                self.metrics.last_step_lag_ms.store(0, Ordering::Relaxed);
                deadline = next_deadline;
            }
        }
    }

    /// Step 8: enqueue a dispatch request if the event just opened or
    /// changed enough (the Dispatcher itself owns the interval/Jaccard
    /// admission decision, §4.F); best-effort, a full queue is logged and
    /// dropped rather than blocking the driver loop.
    fn maybe_dispatch(&self, event: &AnomalyEvent, frame: &SensorFrame) {
        let model = self.baseline.current();
        let recent = self.window.snapshot();
        let context = PromptContext::build(event, frame, self.control.speed_preset(), &model, &recent);
        if let Err(e) = self.dispatcher.enqueue(DispatchRequest { context }) {
            tracing::warn!(error = %e, "dispatch queue full, dropping this trigger");
        }
    }

    fn status_snapshot(&self) -> StatusSnapshot {
        StatusSnapshot {
            driver_state: format!("{:?}", self.state()),
            speed_preset: self.control.speed_preset(),
            last_step: Some(self.metrics.last_step.load(Ordering::Relaxed)),
            subscriber_count: self.broadcaster.subscriber_count(),
            last_t2: Some(self.metrics.last_t2()),
            last_anomaly_transition: self.metrics.last_anomaly_transition(),
            dispatch_queue_depth: self.dispatcher.queue_depth_in_use(),
            last_analysis_at: self.dispatcher.metrics().last_analysis_at(),
            control: (*self.control.snapshot()).clone(),
        }
    }
}

/// Read-write guard used by the API layer to hold the active Driver/handle
/// pair behind a single lock for start/stop orchestration.
pub type DriverHandle = Arc<Mutex<Option<tokio::task::JoinHandle<()>>>>;
