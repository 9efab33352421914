//! LLM Dispatcher (§4.F): single-worker, debounced, coalescing dispatch of
//! anomaly contexts to every configured provider in parallel.
//!
//! Grounded on the teacher's `llm/scheduler.rs` single-worker bounded-queue
//! design: dispatches are serialized so consecutive analyses stay
//! comparable, while the fan-out to providers within one dispatch runs
//! concurrently (teacher's `tokio::join!`-style per-provider parallelism).

use super::jaccard;
use super::prompt::PromptContext;
use super::provider::Provider;
use crate::broadcast::{AnalysisReadySummary, Broadcaster};
use crate::errors::DispatchError;
use crate::storage::AnalysisStore;
use crate::types::{
    AnalysisRecord, PerformanceSummary, ProviderResult, ProviderStatus,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;

/// Dispatch counters exposed via the `/metrics` route.
#[derive(Debug, Default)]
pub struct DispatchMetrics {
    pub dispatches_total: AtomicU64,
    pub dispatch_errors_total: AtomicU64,
    /// Unix millis of the last completed (non-suppressed) analysis, `0`
    /// meaning "none yet" (§4.H `last_analysis_at`).
    last_analysis_at_millis: AtomicI64,
}

impl DispatchMetrics {
    fn record_analysis_completed(&self) {
        self.last_analysis_at_millis
            .store(chrono::Utc::now().timestamp_millis(), Ordering::Relaxed);
    }

    pub fn last_analysis_at(&self) -> Option<chrono::DateTime<chrono::Utc>> {
        match self.last_analysis_at_millis.load(Ordering::Relaxed) {
            0 => None,
            millis => chrono::DateTime::from_timestamp_millis(millis),
        }
    }
}

/// One unit of dispatch work: a prompt context for a specific anomaly event.
#[derive(Debug, Clone)]
pub struct DispatchRequest {
    pub context: PromptContext,
}

/// Debounce/coalescing bookkeeping, kept per-dispatcher (§4.F "Rate
/// limiting and debouncing").
struct DebounceState {
    last_dispatch_at: Option<tokio::time::Instant>,
    last_dispatched_features: Vec<String>,
    pending: Option<DispatchRequest>,
}

impl DebounceState {
    fn new() -> Self {
        Self {
            last_dispatch_at: None,
            last_dispatched_features: Vec::new(),
            pending: None,
        }
    }

    /// Whether `request` should fire now, be coalesced into the pending
    /// slot, or be dropped because nothing has changed (§4.F).
    fn admit(&mut self, request: DispatchRequest, min_interval: Duration, jaccard_threshold: f64) -> bool {
        let now = tokio::time::Instant::now();
        let within_interval = self
            .last_dispatch_at
            .is_some_and(|last| now.duration_since(last) < min_interval);

        if within_interval {
            self.pending = Some(request);
            return false;
        }

        let current_features: Vec<String> = request
            .context
            .top_features
            .iter()
            .map(|f| f.name.clone())
            .collect();

        if self.last_dispatch_at.is_some()
            && !jaccard::has_changed_enough(
                &self.last_dispatched_features,
                &current_features,
                jaccard_threshold,
            )
        {
            // interval elapsed but feature set hasn't changed enough; no
            // re-dispatch, nothing pending either (§4.F condition (b)).
            return false;
        }

        self.last_dispatch_at = Some(now);
        self.last_dispatched_features = current_features;
        self.pending = None;
        true
    }

    /// Flushes the coalesced `pending` request once `min_interval` has
    /// elapsed since the last dispatch, using its buffered (latest) context
    /// rather than waiting for another trigger to arrive (§4.F "newer
    /// triggers ... are coalesced into one pending dispatch that fires at
    /// interval end using the latest context").
    fn flush_due(&mut self, min_interval: Duration) -> Option<DispatchRequest> {
        let now = tokio::time::Instant::now();
        let due = self
            .last_dispatch_at
            .is_some_and(|last| now.duration_since(last) >= min_interval);
        if !due {
            return None;
        }
        let request = self.pending.take()?;
        self.last_dispatch_at = Some(now);
        self.last_dispatched_features = request
            .context
            .top_features
            .iter()
            .map(|f| f.name.clone())
            .collect();
        Some(request)
    }

    /// The instant `pending`, if any, should autonomously fire.
    fn pending_deadline(&self, min_interval: Duration) -> Option<tokio::time::Instant> {
        self.pending.is_some().then(|| self.last_dispatch_at.map(|t| t + min_interval)).flatten()
    }
}

/// Owns the bounded work queue and the single worker task that drains it.
pub struct Dispatcher {
    sender: mpsc::Sender<DispatchRequest>,
    queue_depth: usize,
    cancel: CancellationToken,
    metrics: Arc<DispatchMetrics>,
}

impl Dispatcher {
    /// Spawns the single worker task and returns a handle. `min_interval`
    /// and `jaccard_threshold` are the two runtime-configurable debounce
    /// parameters (§4.F, §9 Open Question #4).
    pub fn spawn(
        providers: Vec<Arc<dyn Provider>>,
        store: Arc<AnalysisStore>,
        broadcaster: Arc<Broadcaster>,
        queue_depth: usize,
        min_interval: Duration,
        provider_timeout: Duration,
        jaccard_threshold: f64,
    ) -> Self {
        let (tx, rx) = mpsc::channel(queue_depth);
        let cancel = CancellationToken::new();
        let metrics = Arc::new(DispatchMetrics::default());

        tokio::spawn(worker_loop(
            rx,
            providers,
            store,
            broadcaster,
            min_interval,
            provider_timeout,
            jaccard_threshold,
            cancel.clone(),
            metrics.clone(),
        ));

        Self { sender: tx, queue_depth, cancel, metrics }
    }

    /// Snapshot of dispatch counters for the `/metrics` route.
    pub fn metrics(&self) -> &DispatchMetrics {
        &self.metrics
    }

    /// Number of requests currently sitting in the work queue (§4.H
    /// `dispatch_queue_depth`).
    pub fn queue_depth_in_use(&self) -> usize {
        self.queue_depth.saturating_sub(self.sender.capacity())
    }

    /// Enqueues a dispatch request; returns `Err` if the queue is full
    /// (§4.F "single work queue (bounded, default 16)").
    pub fn enqueue(&self, request: DispatchRequest) -> Result<(), DispatchError> {
        self.sender
            .try_send(request)
            .map_err(|_| DispatchError::QueueFull)
    }

    /// Cancels pending and in-flight dispatches (§4.F "Cancellation:
    /// pending dispatches are cancelled on Simulation Driver Stop").
    pub fn cancel_all(&self) {
        self.cancel.cancel();
    }
}

#[allow(clippy::too_many_arguments)]
async fn worker_loop(
    mut rx: mpsc::Receiver<DispatchRequest>,
    providers: Vec<Arc<dyn Provider>>,
    store: Arc<AnalysisStore>,
    broadcaster: Arc<Broadcaster>,
    min_interval: Duration,
    provider_timeout: Duration,
    jaccard_threshold: f64,
    cancel: CancellationToken,
    metrics: Arc<DispatchMetrics>,
) {
    let debounce = Mutex::new(DebounceState::new());

    loop {
        let pending_deadline = { debounce.lock().await.pending_deadline(min_interval) };

        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("llm dispatcher cancelled, writing suppressed record for any pending request");
                let mut state = debounce.lock().await;
                if let Some(request) = state.pending.take() {
                    write_suppressed(&store, &request).await;
                }
                return;
            }
            maybe_request = rx.recv() => {
                let Some(request) = maybe_request else { return };
                let admitted = {
                    let mut state = debounce.lock().await;
                    state.admit(request.clone(), min_interval, jaccard_threshold)
                };
                if !admitted {
                    continue;
                }
                run_dispatch(&providers, &store, &broadcaster, &request, provider_timeout, &cancel, &metrics).await;
            }
            () = sleep_until_opt(pending_deadline) => {
                let flushed = { debounce.lock().await.flush_due(min_interval) };
                if let Some(request) = flushed {
                    run_dispatch(&providers, &store, &broadcaster, &request, provider_timeout, &cancel, &metrics).await;
                }
            }
        }
    }
}

/// Sleeps until `deadline`, or forever if there is nothing pending to wake
/// for — lets the `tokio::select!` above carry a timer branch without a
/// pending request ever firing spuriously.
async fn sleep_until_opt(deadline: Option<tokio::time::Instant>) {
    match deadline {
        Some(d) => tokio::time::sleep_until(d).await,
        None => std::future::pending::<()>().await,
    }
}

async fn run_dispatch(
    providers: &[Arc<dyn Provider>],
    store: &Arc<AnalysisStore>,
    broadcaster: &Arc<Broadcaster>,
    request: &DispatchRequest,
    provider_timeout: Duration,
    cancel: &CancellationToken,
    metrics: &DispatchMetrics,
) {
    metrics.dispatches_total.fetch_add(1, Ordering::Relaxed);
    let prompt = request.context.render();

    let calls = providers.iter().map(|provider| {
        let provider = provider.clone();
        let prompt = prompt.clone();
        async move { (provider.name().to_string(), call_provider(provider, &prompt, provider_timeout).await) }
    });

    let results: Vec<(String, ProviderResult)> = tokio::select! {
        _ = cancel.cancelled() => {
            write_suppressed(store, request).await;
            return;
        }
        results = futures::future::join_all(calls) => results,
    };

    let per_provider: HashMap<String, ProviderResult> = results.into_iter().collect();
    let error_count = per_provider
        .values()
        .filter(|r| r.status != ProviderStatus::Ok)
        .count();
    if error_count > 0 {
        metrics
            .dispatch_errors_total
            .fetch_add(error_count as u64, Ordering::Relaxed);
    }
    let performance_summary = PerformanceSummary::from_results(&per_provider);

    let record = AnalysisRecord {
        record_id: uuid::Uuid::now_v7(),
        created_at: chrono::Utc::now(),
        event_id: request.context.event_id,
        prompt_summary: request.context.summary(),
        per_provider,
        performance_summary,
    };

    if let Err(e) = store.append(&record) {
        tracing::error!(error = %e, "failed to persist analysis record");
    } else {
        metrics.record_analysis_completed();
    }

    broadcaster.publish_analysis_ready(AnalysisReadySummary {
        event_id: record.event_id,
        record_id: record.record_id,
        providers_summary: providers.iter().map(|p| p.name().to_string()).collect(),
    });
}

async fn call_provider(
    provider: Arc<dyn Provider>,
    prompt: &str,
    timeout: Duration,
) -> ProviderResult {
    let start = tokio::time::Instant::now();
    let outcome = tokio::time::timeout(timeout, provider.complete(prompt)).await;
    let elapsed_ms = start.elapsed().as_millis() as u64;

    match outcome {
        Ok(Ok(completion)) => ProviderResult {
            status: ProviderStatus::Ok,
            response_time_ms: elapsed_ms,
            word_count: completion.text.split_whitespace().count(),
            text: completion.text,
            error_message: None,
        },
        Ok(Err(DispatchError::Refused { message, .. })) => ProviderResult {
            status: ProviderStatus::Refused,
            response_time_ms: elapsed_ms,
            text: String::new(),
            word_count: 0,
            error_message: Some(message),
        },
        Ok(Err(other)) => ProviderResult {
            status: ProviderStatus::Error,
            response_time_ms: elapsed_ms,
            text: String::new(),
            word_count: 0,
            error_message: Some(other.to_string()),
        },
        Err(_) => ProviderResult {
            status: ProviderStatus::Timeout,
            response_time_ms: elapsed_ms,
            text: String::new(),
            word_count: 0,
            error_message: Some(format!("timed out after {}ms", timeout.as_millis())),
        },
    }
}

async fn write_suppressed(store: &Arc<AnalysisStore>, request: &DispatchRequest) {
    let record = AnalysisRecord {
        record_id: uuid::Uuid::now_v7(),
        created_at: chrono::Utc::now(),
        event_id: request.context.event_id,
        prompt_summary: request.context.summary(),
        per_provider: HashMap::new(),
        performance_summary: PerformanceSummary::default(),
    };
    if let Err(e) = store.append(&record) {
        tracing::error!(error = %e, "failed to persist suppressed analysis record");
    }
}
